//! Resource pattern matching shared by the RBAC evaluator's permission
//! grants and the Compliance Orchestrator's policy rules.
//!
//! A pattern is one of: exact (`"expenses:view"`), prefix
//! (`"expenses/*"`), or wildcard (`"*"`). Matching is eager: among several
//! matching patterns, the longest (most specific) wins.

/// Does `pattern` match `candidate`?
pub fn matches(pattern: &str, candidate: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix("*") {
        return candidate.starts_with(prefix);
    }
    pattern == candidate
}

/// Is `left` at least as specific as `right`, for tie-breaking. Exact
/// patterns outrank prefixes, which outrank the bare wildcard.
pub fn specificity(pattern: &str) -> usize {
    if pattern == "*" {
        0
    } else if pattern.ends_with('*') {
        pattern.len()
    } else {
        pattern.len() + 1_000_000
    }
}

/// The most specific pattern in `patterns` that matches `candidate`, if any.
pub fn best_match<'a>(patterns: impl IntoIterator<Item = &'a str>, candidate: &str) -> Option<&'a str> {
    patterns
        .into_iter()
        .filter(|p| matches(p, candidate))
        .max_by_key(|p| specificity(p))
}
