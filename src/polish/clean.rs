//! Pre-clean pass for recognition spacing artifacts.
//!
//! Some engines emit spurious spaces between logographic characters
//! ("台 積 電" instead of "台積電"). This normalization is lossy by design and
//! runs before text is sent to the rewriting model. Text without such
//! artifacts passes through unchanged.

use regex::Regex;
use std::sync::OnceLock;

fn spacing_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\p{Han})[ \t]+(\p{Han})").expect("valid logographic spacing pattern")
    })
}

/// Collapse whitespace runs between adjacent logographic characters.
///
/// Applied to a fixed point: "甲 乙 丙" collapses fully even though the regex
/// consumes its right-hand character per match.
pub fn collapse_logographic_spacing(text: &str) -> String {
    let pattern = spacing_pattern();
    let mut current = text.to_string();
    loop {
        let next = pattern.replace_all(&current, "${1}${2}").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_spaced_han_runs() {
        assert_eq!(collapse_logographic_spacing("台 積 電"), "台積電");
        assert_eq!(collapse_logographic_spacing("今天 去 台積電"), "今天去台積電");
    }

    #[test]
    fn test_latin_text_unchanged() {
        assert_eq!(collapse_logographic_spacing("hello world"), "hello world");
    }

    #[test]
    fn test_mixed_text_keeps_latin_boundaries() {
        // Spaces around latin words survive; only Han-Han gaps collapse.
        assert_eq!(
            collapse_logographic_spacing("去 了 OpenAI 開 會"),
            "去了 OpenAI 開會"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(collapse_logographic_spacing(""), "");
    }
}
