//! Document parsing
//!
//! Turns raw files into the heading/section/code-block tree the chunker
//! consumes. Markdown is parsed structurally; plain text becomes a single
//! untitled section.

mod markdown;

pub use markdown::*;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Content types we can parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    PlainText,
    Unknown,
}

impl ContentType {
    /// Detect content type from file extension
    pub fn from_extension(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("md") | Some("markdown") | Some("mdx") => ContentType::Markdown,
            Some("txt") | Some("text") | Some("rst") => ContentType::PlainText,
            _ => ContentType::Unknown,
        }
    }
}

/// Parsed document with its section tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// Title from front matter or the first level-1 heading; empty if neither exists
    pub title: String,

    /// Headings in document order
    pub headings: Vec<Heading>,

    /// One section per heading, plus a leading untitled section for prose before the first heading
    pub sections: Vec<Section>,

    /// Code blocks with language info
    pub code_blocks: Vec<CodeBlock>,

    /// `key: value` pairs from a leading `---` block
    pub front_matter: BTreeMap<String, String>,

    /// Document body with front matter removed
    pub raw_content: String,
}

/// A heading in the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// Heading level (1-6)
    pub level: u8,

    /// Heading text
    pub text: String,
}

/// Text under one heading, up to the next heading of any level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: Option<Heading>,

    /// Paragraphs separated by blank lines, code fences inline
    pub content: String,
}

/// A code block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    /// Language identifier (if specified)
    pub language: Option<String>,

    /// Code content
    pub content: String,
}

impl ParsedDocument {
    /// A document with no structure: one untitled section holding all of `text`
    pub fn plain(title: impl Into<String>, text: &str) -> Self {
        let trimmed = text.trim();
        let sections = if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![Section {
                heading: None,
                content: trimmed.to_string(),
            }]
        };

        Self {
            title: title.into(),
            sections,
            raw_content: text.to_string(),
            ..Default::default()
        }
    }

    /// Use `fallback` as the title when none was found
    pub fn with_fallback_title(mut self, fallback: &str) -> Self {
        if self.title.trim().is_empty() {
            self.title = fallback.to_string();
        }
        self
    }
}

/// Parse file content based on its extension
pub fn parse_content(content: &str, path: &Path) -> Result<ParsedDocument> {
    match ContentType::from_extension(path) {
        ContentType::Markdown | ContentType::Unknown => parse_markdown(content),
        ContentType::PlainText => Ok(ParsedDocument::plain(String::new(), content)),
    }
}

/// Split a leading `---` delimited block off `content`
pub fn split_front_matter(content: &str) -> (BTreeMap<String, String>, &str) {
    let mut fields = BTreeMap::new();

    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (fields, content);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        offset += line.len();
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed == "---" {
            return (fields, &rest[offset..]);
        }
        if let Some((key, value)) = trimmed.split_once(':') {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            fields.insert(key.trim().to_string(), value.to_string());
        }
    }

    // Unterminated block: treat the whole thing as body
    (BTreeMap::new(), content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_front_matter_split() {
        let content = "---\ntitle: \"Effective Go\"\nweight: 3\n---\n# Body\n";
        let (fields, body) = split_front_matter(content);

        assert_eq!(fields.get("title").map(String::as_str), Some("Effective Go"));
        assert_eq!(fields.get("weight").map(String::as_str), Some("3"));
        assert_eq!(body, "# Body\n");
    }

    #[test]
    fn test_unterminated_front_matter_is_body() {
        let content = "---\ntitle: nope\n# Heading";
        let (fields, body) = split_front_matter(content);

        assert!(fields.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_plain_document() {
        let doc = ParsedDocument::plain("notes", "  some text  \n");
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].content, "some text");
        assert!(doc.sections[0].heading.is_none());

        let empty = ParsedDocument::plain("empty", "   ");
        assert!(empty.sections.is_empty());
    }

    #[test]
    fn test_fallback_title() {
        let doc = ParsedDocument::plain("", "x").with_fallback_title("style");
        assert_eq!(doc.title, "style");

        let kept = ParsedDocument::plain("Real", "x").with_fallback_title("style");
        assert_eq!(kept.title, "Real");
    }

    #[test]
    fn test_content_type_detection() {
        assert_eq!(
            ContentType::from_extension(Path::new("doc/intro.md")),
            ContentType::Markdown
        );
        assert_eq!(
            ContentType::from_extension(Path::new("README.txt")),
            ContentType::PlainText
        );
    }
}
