use std::fmt::Write as _;

use similar::{ChangeTag, TextDiff};

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy)]
pub struct DiffDisplayConfig {
    pub context: usize,
    pub colorize: bool,
}

pub fn render_diff(old: &str, new: &str, config: &DiffDisplayConfig) -> String {
    let diff = TextDiff::configure()
        .algorithm(similar::Algorithm::Myers)
        .diff_lines(old, new);

    let mut out = String::new();
    for (idx, group) in diff.grouped_ops(config.context).iter().enumerate() {
        if idx > 0 {
            out.push_str("...\n");
        }
        for op in group {
            for change in diff.iter_changes(op) {
                let (sign, color) = match change.tag() {
                    ChangeTag::Delete => ("- ", RED),
                    ChangeTag::Insert => ("+ ", GREEN),
                    ChangeTag::Equal => ("  ", ""),
                };
                let line = change.to_string_lossy();
                let line = line.trim_end_matches(['\n', '\r']);
                if config.colorize && !color.is_empty() {
                    let _ = writeln!(out, "{color}{sign}{line}{RESET}");
                } else {
                    let _ = writeln!(out, "{sign}{line}");
                }
            }
        }
    }
    out
}

/// "+N -M" line counts between two texts.
pub fn summarize_lines(old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut added = 0;
    let mut removed = 0;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => {}
        }
    }
    format!("+{added} -{removed}")
}
