//! Lightweight front matter parsing for markdown posts.
//!
//! Recognizes a leading block of `key: value` lines between two `---` lines:
//!
//! ```text
//! ---
//! title: "Hello \"world\""
//! date: 2024-01-01
//! tags: ['rust', 'blog']
//! ---
//! Body text starts here.
//! ```
//!
//! Parsing never fails. A missing block yields an empty map and the whole
//! text as body; a value that looks structured but isn't valid JSON is kept
//! verbatim as [`FieldValue::Unparsed`].

use regex::Regex;
use serde_json::Value;
use std::{borrow::Cow, collections::BTreeMap, sync::LazyLock};

/// Opening delimiter, optional block, closing delimiter.
/// Carriage returns before line ends are tolerated on the delimiter lines.
static RE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A---\r*\n(?:(.*?)\r*\n)?---\r*(?:\n|\z)").unwrap()
});

/// A single coerced front matter value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Plain or double-quoted scalar.
    Text(String),
    /// `[..]` or `{..}` value that parsed as JSON.
    Structured(Value),
    /// `[..]` or `{..}` value that failed to parse; kept as written.
    Unparsed(String),
}

impl FieldValue {
    /// Coerce a trimmed raw value.
    fn coerce(raw: &str) -> Self {
        if raw.starts_with(['[', '{']) {
            let normalized = raw.replace('\'', "\"");
            return match serde_json::from_str(&normalized) {
                Ok(value) => Self::Structured(value),
                Err(_) => Self::Unparsed(raw.to_owned()),
            };
        }

        if let Some(inner) = raw
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
        {
            return Self::Text(inner.replace("\\\"", "\""));
        }

        Self::Text(raw.to_owned())
    }

    /// Text form of the value, as used in the feed.
    ///
    /// JSON strings render without quotes; other JSON values render compactly.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) | Self::Unparsed(s) => Cow::Borrowed(s),
            Self::Structured(Value::String(s)) => Cow::Borrowed(s),
            Self::Structured(value) => Cow::Owned(value.to_string()),
        }
    }

    /// Whether structured parsing failed and the raw text was kept.
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Unparsed(_))
    }
}

/// Parsed front matter: key → coerced value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    fields: BTreeMap<String, FieldValue>,
}

impl FrontMatter {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Text of a key, treating empty strings as absent.
    pub fn text(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(key)
            .map(FieldValue::to_text)
            .filter(|text| !text.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Result of splitting a document into front matter and body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document<'a> {
    pub front_matter: FrontMatter,
    /// Text after the closing delimiter, or the whole input without a block.
    pub body: &'a str,
    /// Whether a delimited block was found at all.
    pub has_block: bool,
}

/// Split `text` into front matter and body.
pub fn parse(text: &str) -> Document<'_> {
    let Some(caps) = RE_BLOCK.captures(text) else {
        return Document {
            front_matter: FrontMatter::default(),
            body: text,
            has_block: false,
        };
    };

    let block = caps.get(1).map_or("", |m| m.as_str());
    let body_start = caps.get(0).map_or(0, |m| m.end());

    Document {
        front_matter: parse_block(block),
        body: &text[body_start..],
        has_block: true,
    }
}

/// Parse the lines between the delimiters.
fn parse_block(block: &str) -> FrontMatter {
    let fields = block
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_owned(), FieldValue::coerce(value.trim())))
        })
        .collect();

    FrontMatter { fields }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_well_formed() {
        let text = "---\ntitle: Hello\ndate: 2024-01-01\nauthor: A\n---\nSome text.";
        let doc = parse(text);

        assert!(doc.has_block);
        assert_eq!(doc.front_matter.keys().count(), 3);
        assert_eq!(doc.front_matter.text("title").as_deref(), Some("Hello"));
        assert_eq!(doc.front_matter.text("date").as_deref(), Some("2024-01-01"));
        assert_eq!(doc.front_matter.text("author").as_deref(), Some("A"));
        assert_eq!(doc.body, "Some text.");
    }

    #[test]
    fn test_parse_without_block_is_identity() {
        for text in [
            "",
            "Just a body.",
            "title: not front matter\n---\n",
            "--- \ntitle: x\n---\nbody",
            "---\ntitle: unterminated\nbody",
            "\n---\ntitle: late\n---\n",
        ] {
            let doc = parse(text);
            assert!(!doc.has_block, "{text:?}");
            assert!(doc.front_matter.is_empty(), "{text:?}");
            assert_eq!(doc.body, text);
        }
    }

    #[test]
    fn test_parse_crlf_delimiters() {
        let text = "---\r\ntitle: Windows\r\n---\r\nBody\r\n";
        let doc = parse(text);

        assert!(doc.has_block);
        assert_eq!(doc.front_matter.text("title").as_deref(), Some("Windows"));
        assert_eq!(doc.body, "Body\r\n");
    }

    #[test]
    fn test_parse_empty_block() {
        let doc = parse("---\n---\nbody");
        assert!(doc.has_block);
        assert!(doc.front_matter.is_empty());
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn test_body_is_unchanged_after_block() {
        let doc = parse("---\ntitle: x\n---\n\n# Heading\n\n---\nmore: stuff\n");
        assert_eq!(doc.body, "\n# Heading\n\n---\nmore: stuff\n");
        assert_eq!(doc.front_matter.keys().collect::<Vec<_>>(), vec!["title"]);
    }

    #[test]
    fn test_split_on_first_colon_only() {
        let doc = parse("---\ndate: 2024-01-01T10:30:00Z\nlink: https://a.b/c\n---\n");
        assert_eq!(
            doc.front_matter.text("date").as_deref(),
            Some("2024-01-01T10:30:00Z")
        );
        assert_eq!(doc.front_matter.text("link").as_deref(), Some("https://a.b/c"));
    }

    #[test]
    fn test_lines_without_colon_are_skipped() {
        let doc = parse("---\njust words\n: no key\ntitle: kept\n---\n");
        assert_eq!(doc.front_matter.keys().collect::<Vec<_>>(), vec!["title"]);
    }

    #[test]
    fn test_quoted_value_unescaped() {
        let doc = parse("---\ntitle: \"Say \\\"hi\\\": now\"\n---\n");
        assert_eq!(
            doc.front_matter.get("title"),
            Some(&FieldValue::Text("Say \"hi\": now".into()))
        );
    }

    #[test]
    fn test_single_quote_is_not_stripped() {
        let doc = parse("---\ntitle: 'quoted'\n---\n");
        assert_eq!(
            doc.front_matter.get("title"),
            Some(&FieldValue::Text("'quoted'".into()))
        );
    }

    #[test]
    fn test_structured_values() {
        let doc = parse("---\ntags: ['rust', 'blog']\nextra: {'draft': true, 'n': 2}\n---\n");

        assert_eq!(
            doc.front_matter.get("tags"),
            Some(&FieldValue::Structured(json!(["rust", "blog"])))
        );
        assert_eq!(
            doc.front_matter.get("extra"),
            Some(&FieldValue::Structured(json!({"draft": true, "n": 2})))
        );
    }

    #[test]
    fn test_malformed_structured_value_falls_back() {
        let doc = parse("---\ntags: [rust, blog\n---\n");
        let value = doc.front_matter.get("tags").unwrap();

        assert!(value.is_fallback());
        assert_eq!(value.to_text(), "[rust, blog");
    }

    #[test]
    fn test_to_text_renders_structured() {
        assert_eq!(FieldValue::Structured(json!("plain")).to_text(), "plain");
        assert_eq!(FieldValue::Structured(json!([1, 2])).to_text(), "[1,2]");
    }

    #[test]
    fn test_repeated_key_keeps_last() {
        let doc = parse("---\ntitle: first\ntitle: second\n---\n");
        assert_eq!(doc.front_matter.text("title").as_deref(), Some("second"));
    }

    #[test]
    fn test_empty_value_reads_as_absent() {
        let doc = parse("---\ntitle:\nauthor: \"\"\n---\n");
        assert_eq!(doc.front_matter.keys().count(), 2);
        assert!(doc.front_matter.text("title").is_none());
        assert!(doc.front_matter.text("author").is_none());
    }
}
