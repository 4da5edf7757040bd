//! Plain-text excerpts for feed descriptions.

use regex::Regex;
use std::sync::LazyLock;

/// Default maximum excerpt length, in characters.
pub const DEFAULT_MAX_LEN: usize = 300;

const ELLIPSIS: char = '…';

// One line only, a bare `#` included.
static RE_HEADER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#+(?:[ \t\r].*)?$").unwrap());
static RE_BLANK_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());
static RE_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n").unwrap());
static RE_LEADING_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#+\s*").unwrap());
static RE_BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static RE_ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.*?)\*").unwrap());
static RE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());

/// Build a single-paragraph summary of a markdown body.
///
/// Header lines are dropped, the first paragraph is kept, newlines are
/// folded into spaces and inline markup (bold, italic, links) is reduced to
/// its text. Results longer than `max_len` characters are cut back to a word
/// boundary and end with `…`, so the output never exceeds `max_len + 1`.
pub fn excerpt(body: &str, max_len: usize) -> String {
    let without_headers = RE_HEADER_LINE.replace_all(body, "");
    let first_block = RE_BLANK_LINE
        .split(without_headers.trim())
        .next()
        .unwrap_or_default();
    let paragraph = RE_NEWLINE.replace_all(first_block, " ");

    let text = strip_inline_markup(paragraph.trim());
    truncate_at_word(text.trim(), max_len)
}

/// Reduce inline markdown to plain text.
fn strip_inline_markup(text: &str) -> String {
    let text = RE_LEADING_HEADER.replace(text, "");
    let text = RE_BOLD.replace_all(&text, "$1");
    let text = RE_ITALIC.replace_all(&text, "$1");
    RE_LINK.replace_all(&text, "$1").into_owned()
}

/// Truncate to `max_len` characters on a whitespace boundary, adding `…`.
fn truncate_at_word(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_owned();
    }

    let cut = text
        .char_indices()
        .nth(max_len)
        .map_or(text.len(), |(idx, _)| idx);
    let head = &text[..cut];

    // A single overlong word has no boundary to fall back to.
    let head = match head.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => &head[..idx],
        _ => head,
    };

    let mut out = head.trim_end().to_owned();
    out.push(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_paragraph_unchanged() {
        assert_eq!(excerpt("Some text.", DEFAULT_MAX_LEN), "Some text.");
    }

    #[test]
    fn test_first_paragraph_only() {
        let body = "First line\ncontinues here.\n\nSecond paragraph.";
        assert_eq!(excerpt(body, DEFAULT_MAX_LEN), "First line continues here.");
    }

    #[test]
    fn test_header_lines_skipped() {
        let body = "# Title\n\n## Subtitle\nIntro paragraph.\n\nMore.";
        assert_eq!(excerpt(body, DEFAULT_MAX_LEN), "Intro paragraph.");
    }

    #[test]
    fn test_leading_hash_marker_stripped() {
        // Not a header line (no space), but the marker is still removed
        assert_eq!(excerpt("#hashtag post", DEFAULT_MAX_LEN), "hashtag post");
    }

    #[test]
    fn test_inline_markup_stripped() {
        let body = "This is **bold**, *italic* and a [link](https://example.com).";
        assert_eq!(
            excerpt(body, DEFAULT_MAX_LEN),
            "This is bold, italic and a link."
        );
    }

    #[test]
    fn test_crlf_body() {
        let body = "# Title\r\n\r\nLine one\r\nline two\r\n\r\nNext.";
        assert_eq!(excerpt(body, DEFAULT_MAX_LEN), "Line one line two");
    }

    #[test]
    fn test_truncate_on_word_boundary() {
        let body = "alpha beta gamma delta";
        // 12 chars: "alpha beta g" → back to "alpha beta"
        assert_eq!(excerpt(body, 12), "alpha beta…");
    }

    #[test]
    fn test_truncate_exact_length_untouched() {
        assert_eq!(excerpt("alpha beta", 10), "alpha beta");
    }

    #[test]
    fn test_truncate_single_long_word() {
        assert_eq!(excerpt("abcdefghijkl", 5), "abcde…");
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        let body = "日本語 の テキスト です";
        let out = excerpt(body, 6);
        assert_eq!(out, "日本語 の…");
        assert!(out.chars().count() <= 7);
    }

    #[test]
    fn test_length_bound_holds() {
        let long = "word ".repeat(200);
        for max_len in [0, 1, 4, 5, 6, 50, 299, 300] {
            let out = excerpt(&long, max_len);
            assert!(out.chars().count() <= max_len + 1, "{max_len}: {out:?}");
        }
    }

    #[test]
    fn test_no_markup_left() {
        let body = "## Heading\n\nA **strong** claim with *emphasis*, [one](a) and [two](b).";
        let out = excerpt(body, DEFAULT_MAX_LEN);

        assert!(!out.contains("**"));
        assert!(!out.contains('*'));
        assert!(!out.contains("]("));
        assert!(!out.contains('#'));
        assert_eq!(out, "A strong claim with emphasis, one and two.");
    }

    #[test]
    fn test_bare_header_marker_keeps_next_line() {
        assert_eq!(excerpt("#\nFirst para.", DEFAULT_MAX_LEN), "First para.");
        assert_eq!(excerpt("##  \nFirst para.\n\nSecond.", DEFAULT_MAX_LEN), "First para.");
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(excerpt("", DEFAULT_MAX_LEN), "");
        assert_eq!(excerpt("# Only a title\n", DEFAULT_MAX_LEN), "");
    }
}
