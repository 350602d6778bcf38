// Command-line classification

use regex::Regex;

/// How acceptable it is to kill a process, as judged by its command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Neutral,
    /// Matches the never-kill pattern. A strong deterrent, not a veto.
    Excluded,
    /// Matches the prefer-kill pattern
    Preferred,
}

/// Classify a process label against the configured patterns.
///
/// `label` is the command line, or the short name when the kernel reports
/// no arguments. Excluded wins when both patterns match.
pub fn classify(label: &str, avoid: &Regex, prefer: Option<&Regex>) -> Classification {
    if avoid.is_match(label) {
        return Classification::Excluded;
    }
    if prefer.is_some_and(|p| p.is_match(label)) {
        return Classification::Preferred;
    }
    Classification::Neutral
}
