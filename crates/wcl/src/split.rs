/*
 * split.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Splitting of multi-valued strings.
//!
//! Multi-valued WCL values are written as delimited lists, optionally
//! wrapped in parentheses, where an item of the form `a:b` (two
//! non-negative integers) stands for the inclusive range `a..=b`:
//!
//! ```text
//! (g, r, i)   ->  ["g", "r", "i"]
//! 1:3,10      ->  ["1", "2", "3", "10"]
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

static RANGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+):(\d+)").unwrap());

/// Split `text` on `delim`, trimming items and expanding integer ranges.
///
/// Parentheses anywhere in the input are dropped first. An empty input
/// yields a single empty item.
pub fn split_values(text: &str, delim: char) -> Vec<String> {
    let cleaned: String = text.chars().filter(|c| *c != '(' && *c != ')').collect();
    let mut items = Vec::new();
    for item in cleaned.split(delim).map(str::trim) {
        match expand_range(item) {
            Some(range) => items.extend(range),
            None => items.push(item.to_string()),
        }
    }
    items
}

fn expand_range(item: &str) -> Option<Vec<String>> {
    let caps = RANGE_RE.captures(item)?;
    let start: u64 = caps[1].parse().ok()?;
    let end: u64 = caps[2].parse().ok()?;
    Some((start..=end).map(|n| n.to_string()).collect())
}

/// Whether a resolved value should be treated as a list of values.
pub fn is_multi_valued(value: &str) -> bool {
    value.starts_with('(') || value.contains(',')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_trims_and_drops_parens() {
        assert_eq!(split_values("(g, r ,i)", ','), vec!["g", "r", "i"]);
    }

    #[test]
    fn test_split_expands_ranges() {
        assert_eq!(
            split_values("1:3,10", ','),
            vec!["1", "2", "3", "10"]
        );
    }

    #[test]
    fn test_split_empty_range() {
        assert!(split_values("5:3", ',').is_empty());
    }

    #[test]
    fn test_split_other_delimiter() {
        assert_eq!(split_values("a b", ' '), vec!["a", "b"]);
    }

    #[test]
    fn test_split_empty_input() {
        assert_eq!(split_values("", ','), vec![""]);
    }

    #[test]
    fn test_multi_valued() {
        assert!(is_multi_valued("a,b"));
        assert!(is_multi_valued("(a)"));
        assert!(!is_multi_valued("1:62"));
        assert!(!is_multi_valued("plain"));
    }
}
