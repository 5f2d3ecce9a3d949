//! Split and join text transforms
//!
//! Pure functions between a single text blob and an ordered list of items,
//! with a fixed vocabulary of formats. Identical input always yields
//! identical output.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::domain::template::escape_braces;

fn list_item_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[-*]\s").expect("list pattern is valid"))
}

fn paragraph_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n\s*\n").expect("paragraph pattern is valid"))
}

fn code_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"```[\s\S]*?```").expect("code pattern is valid"))
}

/// How a split node derives items from its input text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitFormat {
    /// Bullet or dash list items
    List,
    /// One item per line
    Newline,
    /// Items separated by a blank line
    DoubleNewline,
    /// Paragraphs (blank line, tolerating whitespace)
    Paragraph,
    /// Comma-separated items
    Comma,
    /// Fenced code blocks, kept exactly as matched
    CodeBlock,
}

impl SplitFormat {
    /// Resolve a wire format tag
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "list" => Some(SplitFormat::List),
            "\n" => Some(SplitFormat::Newline),
            "\n\n" => Some(SplitFormat::DoubleNewline),
            "paragraph" => Some(SplitFormat::Paragraph),
            "," => Some(SplitFormat::Comma),
            "code" => Some(SplitFormat::CodeBlock),
            _ => None,
        }
    }
}

/// Split a text into an ordered list of items
///
/// Items are trimmed and empty items dropped, except for code blocks which
/// are kept exactly as matched.
pub fn split_text(text: &str, format: SplitFormat) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    match format {
        SplitFormat::List => trim_filter(list_item_pattern().split(text)),
        SplitFormat::Newline => trim_filter(text.split('\n')),
        SplitFormat::DoubleNewline => trim_filter(text.split("\n\n")),
        SplitFormat::Paragraph => trim_filter(paragraph_pattern().split(text)),
        SplitFormat::Comma => trim_filter(text.split(',')),
        SplitFormat::CodeBlock => code_block_pattern()
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect(),
    }
}

fn trim_filter<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<String> {
    parts
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// How a join node combines its input items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinFormat {
    /// Concatenate with a single newline
    NewLine,
    /// Concatenate with a blank line
    DoubleNewLine,
    /// Dash-prefixed list
    DashedList,
    /// 1-based numbered list
    NumList,
    /// JSON array serialization
    PyArr,
}

impl JoinFormat {
    /// Resolve a wire format tag
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "\n" => Some(JoinFormat::NewLine),
            "\n\n" => Some(JoinFormat::DoubleNewLine),
            "- " => Some(JoinFormat::DashedList),
            "1. " => Some(JoinFormat::NumList),
            "[]" => Some(JoinFormat::PyArr),
            _ => None,
        }
    }

    /// Canonical wire tag for this format
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinFormat::NewLine => "\n",
            JoinFormat::DoubleNewLine => "\n\n",
            JoinFormat::DashedList => "- ",
            JoinFormat::NumList => "1. ",
            JoinFormat::PyArr => "[]",
        }
    }
}

/// Join a list of items into one text
///
/// Each item is brace-escaped first so the output cannot be re-parsed as
/// template placeholders. When `format` is `None` (an unrecognized or unset
/// format) only the first item is returned; this loses data for lists longer
/// than one item, so a warning is logged.
pub fn join_texts(texts: &[String], format: Option<JoinFormat>) -> String {
    let escaped: Vec<String> = texts.iter().map(|t| escape_braces(t)).collect();

    match format {
        Some(JoinFormat::NewLine) => escaped.join("\n"),
        Some(JoinFormat::DoubleNewLine) => escaped.join("\n\n"),
        Some(JoinFormat::DashedList) => escaped
            .iter()
            .map(|t| format!("- {}", t))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(JoinFormat::NumList) => escaped
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{}. {}", i + 1, t))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(JoinFormat::PyArr) => serde_json::Value::Array(
            escaped.into_iter().map(serde_json::Value::String).collect(),
        )
        .to_string(),
        None => {
            if escaped.len() > 1 {
                warn!(
                    dropped = escaped.len() - 1,
                    "no usable join format, returning first item only"
                );
            }
            escaped.into_iter().next().unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_text("- a\n- b", SplitFormat::List),
            vec!["a", "b"]
        );
        assert_eq!(
            split_text("* first\n* second", SplitFormat::List),
            vec!["first", "second"]
        );
    }

    #[test]
    fn test_split_newline_drops_empties() {
        assert_eq!(
            split_text("a\n\nb\n", SplitFormat::Newline),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_split_double_newline() {
        assert_eq!(
            split_text("a\n\nb", SplitFormat::DoubleNewline),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_split_paragraph_tolerates_whitespace() {
        assert_eq!(
            split_text("one\n  \ntwo", SplitFormat::Paragraph),
            vec!["one", "two"]
        );
    }

    #[test]
    fn test_split_comma() {
        assert_eq!(
            split_text("a, b ,c", SplitFormat::Comma),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_split_code_blocks_kept_as_matched() {
        let text = "intro\n```rust\nfn main() {}\n```\nmiddle\n```\nplain\n```";
        let blocks = split_text(text, SplitFormat::CodeBlock);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].starts_with("```rust"));
        assert!(blocks[0].ends_with("```"));
    }

    #[test]
    fn test_split_empty_input() {
        assert!(split_text("", SplitFormat::Newline).is_empty());
    }

    #[test]
    fn test_split_format_parse() {
        assert_eq!(SplitFormat::parse("list"), Some(SplitFormat::List));
        assert_eq!(SplitFormat::parse("\n"), Some(SplitFormat::Newline));
        assert_eq!(SplitFormat::parse("code"), Some(SplitFormat::CodeBlock));
        assert_eq!(SplitFormat::parse("csv"), None);
    }

    #[test]
    fn test_join_newline_variants() {
        assert_eq!(
            join_texts(&items(&["a", "b"]), Some(JoinFormat::NewLine)),
            "a\nb"
        );
        assert_eq!(
            join_texts(&items(&["a", "b"]), Some(JoinFormat::DoubleNewLine)),
            "a\n\nb"
        );
    }

    #[test]
    fn test_join_dashed_list() {
        assert_eq!(
            join_texts(&items(&["a", "b"]), Some(JoinFormat::DashedList)),
            "- a\n- b"
        );
    }

    #[test]
    fn test_join_numbered_list() {
        assert_eq!(
            join_texts(&items(&["a", "b"]), Some(JoinFormat::NumList)),
            "1. a\n2. b"
        );
    }

    #[test]
    fn test_join_json_array() {
        assert_eq!(
            join_texts(&items(&["a", "b"]), Some(JoinFormat::PyArr)),
            "[\"a\",\"b\"]"
        );
    }

    #[test]
    fn test_join_unset_format_falls_back_to_first_item() {
        assert_eq!(join_texts(&items(&["only"]), None), "only");
        assert_eq!(join_texts(&items(&["first", "second"]), None), "first");
        assert_eq!(join_texts(&[], None), "");
    }

    #[test]
    fn test_join_escapes_braces() {
        assert_eq!(
            join_texts(&items(&["{a}"]), Some(JoinFormat::NewLine)),
            "\\{a\\}"
        );
    }

    #[test]
    fn test_join_format_parse() {
        assert_eq!(JoinFormat::parse("\n\n"), Some(JoinFormat::DoubleNewLine));
        assert_eq!(JoinFormat::parse("1. "), Some(JoinFormat::NumList));
        assert_eq!(JoinFormat::parse("[]"), Some(JoinFormat::PyArr));
        assert_eq!(JoinFormat::parse("nope"), None);
    }

    #[test]
    fn test_transforms_are_deterministic() {
        let text = "- x\n- y\n- z";
        assert_eq!(
            split_text(text, SplitFormat::List),
            split_text(text, SplitFormat::List)
        );

        let list = items(&["x", "y"]);
        assert_eq!(
            join_texts(&list, Some(JoinFormat::NumList)),
            join_texts(&list, Some(JoinFormat::NumList))
        );
    }
}
