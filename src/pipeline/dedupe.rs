//! Post-processing of extracted term strings.

use std::collections::HashSet;

/// Separator used between terms in every term string.
pub const TERM_SEPARATOR: char = ',';

/// Case-insensitive deduplication of a comma-separated term string.
///
/// Terms are trimmed and empty terms dropped. The first occurrence of each lowercase key
/// wins and keeps its original casing; output order is first-seen order.
pub fn dedupe(raw: &str) -> String {
    let mut seen = HashSet::new();
    let mut kept: Vec<&str> = Vec::new();
    for term in raw.split(TERM_SEPARATOR).map(str::trim) {
        if term.is_empty() {
            continue;
        }
        if seen.insert(term.to_lowercase()) {
            kept.push(term);
        }
    }
    kept.join(",")
}

/// Number of terms in an already clean term string.
pub fn term_count(clean: &str) -> usize {
    if clean.is_empty() {
        0
    } else {
        clean.split(TERM_SEPARATOR).count()
    }
}
