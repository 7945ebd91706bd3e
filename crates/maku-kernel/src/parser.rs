//! Rule file parsing.
//!
//! Consumes the reader's cleaned lines and produces a flat [`RuleSet`]:
//! `.PHONY:` lines extend the phony list, `name: deps` lines begin a rule,
//! and tab-led lines attach commands to the rule most recently begun. Name
//! uniqueness is not checked here — that happens at graph construction,
//! where the name→id index is built anyway.

use maku_types::{MakuError, MakuResult, Rule, RuleSet};

const PHONY_PREFIX: &str = ".PHONY:";

/// Parse cleaned rule-file lines into a rule set.
pub fn parse(lines: &[String]) -> MakuResult<RuleSet> {
    let mut result = RuleSet::default();
    let mut current: Option<Rule> = None;

    for line in lines {
        // .PHONY does not terminate the rule being collected
        if let Some(rest) = line.strip_prefix(PHONY_PREFIX) {
            result.phony.extend(rest.split_whitespace().map(str::to_string));
            continue;
        }

        if let Some(command) = line.strip_prefix('\t') {
            let rule = current
                .as_mut()
                .ok_or_else(|| MakuError::Parse("command without target".to_string()))?;
            if !command.is_empty() {
                rule.commands.push(command.to_string());
            }
            continue;
        }

        if let Some(rule) = current.take() {
            result.rules.push(rule);
        }

        let Some((name, deps)) = line.split_once(':') else {
            return Err(MakuError::Parse(format!("invalid rule (missing ':'): {line}")));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(MakuError::Parse(format!("rule with empty name: {line}")));
        }

        current = Some(Rule {
            name: name.to_string(),
            deps: deps.split_whitespace().map(str::to_string).collect(),
            commands: Vec::new(),
        });
    }

    if let Some(rule) = current.take() {
        result.rules.push(rule);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rule_with_deps_and_commands() {
        let parsed = parse(&lines(&["app: app.o lib.o", "\tcc -o app app.o lib.o"])).unwrap();
        assert_eq!(parsed.rules.len(), 1);
        assert_eq!(parsed.rules[0].name, "app");
        assert_eq!(parsed.rules[0].deps, vec!["app.o", "lib.o"]);
        assert_eq!(parsed.rules[0].commands, vec!["cc -o app app.o lib.o"]);
    }

    #[test]
    fn command_before_any_rule_is_fatal() {
        let err = parse(&lines(&["\techo hi"])).unwrap_err();
        assert!(matches!(err, MakuError::Parse(_)));
    }

    #[test]
    fn line_without_colon_is_fatal() {
        let err = parse(&lines(&["just some words"])).unwrap_err();
        assert!(matches!(err, MakuError::Parse(_)));
    }

    #[test]
    fn phony_does_not_terminate_current_rule() {
        let parsed = parse(&lines(&[
            "all: app",
            ".PHONY: all",
            "\techo still mine",
        ]))
        .unwrap();
        assert_eq!(parsed.phony, vec!["all"]);
        assert_eq!(parsed.rules[0].commands, vec!["echo still mine"]);
    }

    #[test]
    fn empty_command_after_tab_is_skipped() {
        let parsed = parse(&lines(&["a:", "\t"])).unwrap();
        assert!(parsed.rules[0].commands.is_empty());
    }
}
