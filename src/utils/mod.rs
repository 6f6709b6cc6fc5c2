//! Utility functions and helpers.

pub mod http;

use unicode_segmentation::UnicodeSegmentation;

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Length in Unicode scalar values.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Longest prefix of `s` with at most `max_chars` characters that does not
/// split a grapheme cluster.
pub fn truncate_graphemes(s: &str, max_chars: usize) -> &str {
    let mut used = 0;
    let mut end = 0;
    for (idx, grapheme) in s.grapheme_indices(true) {
        let len = grapheme.chars().count();
        if used + len > max_chars {
            break;
        }
        used += len;
        end = idx + grapheme.len();
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\t b  c "), "a b c");
        assert_eq!(normalize_whitespace(""), "");
    }

    #[test]
    fn test_truncate_graphemes() {
        assert_eq!(truncate_graphemes("hello", 10), "hello");
        assert_eq!(truncate_graphemes("hello", 3), "hel");
        assert_eq!(truncate_graphemes("hello", 0), "");
    }

    #[test]
    fn test_truncate_keeps_clusters_whole() {
        // "e" followed by a combining acute accent is one grapheme of two chars
        let s = "cafe\u{301} au lait";
        assert_eq!(truncate_graphemes(s, 4), "caf");
        assert_eq!(truncate_graphemes(s, 5), "cafe\u{301}");
    }
}
