//! Line-oriented rule file reading.
//!
//! Lines are trimmed of surrounding spaces — but not tabs, because a
//! leading tab is what marks a command line — and stripped of `#` comments:
//! a leading `#` drops the whole line, an interior `#` truncates from that
//! position. Blank lines vanish. The parser sees only meaningful lines.

use std::fs;
use std::path::Path;

use maku_types::MakuResult;

/// Read `path` and return its meaningful lines.
pub fn read_lines(path: &Path) -> MakuResult<Vec<String>> {
    let text = fs::read_to_string(path)?;
    Ok(clean_lines(&text))
}

/// Trim, strip comments, and drop blanks.
pub fn clean_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();

    for raw in text.lines() {
        let line = raw.trim_matches(|c| c == ' ' || c == '\r');
        if line.is_empty() {
            continue;
        }

        let line = match line.find('#') {
            Some(0) => continue,
            Some(pos) => &line[..pos],
            None => line,
        };

        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }

    lines
}
