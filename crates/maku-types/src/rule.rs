//! Parsed rule file contents.

/// A single rule: a target name, its dependencies, and the commands that
/// produce it.
///
/// Dep order and command order are both meaningful and preserved: deps
/// define the order edges were declared, commands the order a worker runs
/// them. Either list may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    /// Target name, unique across the rule set.
    pub name: String,
    /// Names of the rules this target depends on, in source order.
    pub deps: Vec<String>,
    /// Shell commands that produce the target, in source order.
    pub commands: Vec<String>,
}

/// A parsed rule file: rules in file order plus the `.PHONY` name list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    /// Rules in the order they appear in the file.
    pub rules: Vec<Rule>,
    /// Names declared phony; resolved to ids at graph construction.
    pub phony: Vec<String>,
}
