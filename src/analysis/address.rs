//! Address normalization for repeat grouping

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PUNCTUATION: Regex = Regex::new(r"[,.;]").expect("valid punctuation pattern");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid whitespace pattern");
}

/// Grouping key for a premises address: lower-cased, commas/periods/semicolons
/// removed, whitespace runs collapsed, trimmed. `None` for blank input.
pub fn normalize_address(address: &str) -> Option<String> {
    let lowered = address.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, " ");
    let collapsed = WHITESPACE.replace_all(stripped.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.into_owned())
    }
}
