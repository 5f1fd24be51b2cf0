//! Text normalization applied before pattern matching.

use lazy_static::lazy_static;
use regex::Regex;

/// Abbreviations expanded during normalization. Expansion is idempotent:
/// no expansion contains another abbreviation at a word boundary.
const ABBREVIATIONS: [(&str, &str); 8] = [
    ("doc", "document"),
    ("pic", "picture"),
    ("calc", "calculator"),
    ("app", "application"),
    ("info", "information"),
    ("stats", "statistics"),
    ("ui", "user interface"),
    ("db", "database"),
];

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("static regex");
    static ref ABBREVIATION_PATTERNS: Vec<(Regex, &'static str)> = ABBREVIATIONS
        .iter()
        .map(|(abbr, expansion)| {
            let pattern = Regex::new(&format!(r"\b{}\b", abbr)).expect("static regex");
            (pattern, *expansion)
        })
        .collect();
}

/// Lowercase, collapse whitespace, and expand the fixed abbreviation table.
pub fn normalize_text(text: &str) -> String {
    let mut normalized = text.to_lowercase();
    normalized = WHITESPACE.replace_all(&normalized, " ").trim().to_string();

    for (pattern, expansion) in ABBREVIATION_PATTERNS.iter() {
        normalized = pattern.replace_all(&normalized, *expansion).to_string();
    }

    normalized
}
