//! Turns free-form keyword input into the ordered list of search terms.

use std::collections::HashSet;

/// Splits multi-line text into trimmed, non-empty, de-duplicated keywords.
/// The first occurrence of each keyword keeps its position.
pub fn normalize_keywords(raw: &str) -> Vec<String> {
    normalize_terms(raw.lines())
}

/// Same rules as [`normalize_keywords`] for input that is already split,
/// such as positional CLI arguments or a JSON array.
pub fn normalize_terms<I, S>(terms: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut keywords = Vec::new();
    for term in terms {
        let trimmed = term.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_owned()) {
            keywords.push(trimmed.to_owned());
        }
    }
    keywords
}
