//! Hierarchical document chunking
//!
//! Splits a parsed document into a summary chunk, one chunk per section, and
//! paragraph chunks for sections that exceed the token budget:
//! - the summary is the root; every section points at it
//! - an oversized section becomes a header chunk whose paragraphs point at it
//! - an oversized paragraph is packed sentence by sentence
//!
//! Parent links are indices into the emitted sequence, so a chunk's parent
//! always precedes it.

mod split;

pub use split::*;

use crate::config::ChunkConfig;
use crate::error::{Error, Result};
use crate::parse::ParsedDocument;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Granularity of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkLevel {
    Summary,
    Section,
    Paragraph,
}

impl ChunkLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkLevel::Summary => "summary",
            ChunkLevel::Section => "section",
            ChunkLevel::Paragraph => "paragraph",
        }
    }

    /// Level a parent of this level must have, if any
    pub fn parent_level(&self) -> Option<ChunkLevel> {
        match self {
            ChunkLevel::Summary => None,
            ChunkLevel::Section => Some(ChunkLevel::Summary),
            ChunkLevel::Paragraph => Some(ChunkLevel::Section),
        }
    }
}

impl std::fmt::Display for ChunkLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(ChunkLevel::Summary),
            "section" => Ok(ChunkLevel::Section),
            "paragraph" => Ok(ChunkLevel::Paragraph),
            _ => Err(Error::InvalidInput(format!("Unknown chunk level: {}", s))),
        }
    }
}

impl TryFrom<String> for ChunkLevel {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// A chunk produced by the chunker, not yet persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub level: ChunkLevel,

    pub title: String,

    pub content: String,

    /// Estimated tokens in `content`
    pub token_count: usize,

    /// Index of the parent within the same chunk sequence; `None` only for the summary
    pub parent_index: Option<usize>,

    /// Document title followed by enclosing headings
    pub breadcrumbs: Vec<String>,
}

/// Ancestor heading titles for the section being chunked
#[derive(Debug)]
struct HeadingStack {
    crumbs: Vec<String>,
}

impl HeadingStack {
    fn new(title: &str) -> Self {
        Self {
            crumbs: vec![title.to_string()],
        }
    }

    /// Drop headings at `level` or deeper, then push this one
    fn enter(&mut self, level: u8, text: &str) {
        self.crumbs.truncate(usize::from(level.max(1)));
        self.crumbs.push(text.to_string());
    }

    fn path(&self) -> Vec<String> {
        let mut path = self.crumbs.clone();
        // a top heading that repeats the document title is not a new level
        path.dedup();
        path
    }
}

/// Splits parsed documents into hierarchical chunks
#[derive(Debug, Clone)]
pub struct Chunker {
    max_tokens: usize,
    chars_per_token: usize,
    summary_intro_max_chars: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::from_config(&ChunkConfig::default())
    }
}

impl Chunker {
    /// Chunker with the given token budget and default ratios
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            ..Self::default()
        }
    }

    pub fn from_config(config: &ChunkConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            chars_per_token: config.chars_per_token,
            summary_intro_max_chars: config.summary_intro_max_chars,
        }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        estimate_tokens(text, self.chars_per_token)
    }

    fn fits(&self, text: &str) -> bool {
        self.count_tokens(text) <= self.max_tokens
    }

    fn record(
        &self,
        level: ChunkLevel,
        title: &str,
        content: &str,
        parent_index: Option<usize>,
        breadcrumbs: Vec<String>,
    ) -> ChunkRecord {
        ChunkRecord {
            level,
            title: title.to_string(),
            content: content.to_string(),
            token_count: self.count_tokens(content),
            parent_index,
            breadcrumbs,
        }
    }

    /// Chunk a document. Never fails; the summary chunk is always first.
    pub fn chunk(&self, doc: &ParsedDocument) -> Vec<ChunkRecord> {
        let title = doc.title.trim();
        let mut stack = HeadingStack::new(title);
        let mut chunks = Vec::new();

        let summary_index = chunks.len();
        chunks.push(self.record(
            ChunkLevel::Summary,
            title,
            &self.summary_content(doc),
            None,
            stack.path(),
        ));

        if doc.sections.is_empty() {
            let raw = doc.raw_content.trim();
            if !raw.is_empty() {
                chunks.push(self.record(
                    ChunkLevel::Section,
                    title,
                    raw,
                    Some(summary_index),
                    stack.path(),
                ));
            }
            return chunks;
        }

        for section in &doc.sections {
            let section_title = match &section.heading {
                Some(heading) => {
                    stack.enter(heading.level, &heading.text);
                    heading.text.as_str()
                }
                None => title,
            };
            let content = section.content.trim();

            if section.heading.is_none() && content.is_empty() {
                continue;
            }

            if self.fits(content) {
                chunks.push(self.record(
                    ChunkLevel::Section,
                    section_title,
                    content,
                    Some(summary_index),
                    stack.path(),
                ));
                continue;
            }

            let section_index = chunks.len();
            chunks.push(self.record(
                ChunkLevel::Section,
                section_title,
                section_title,
                Some(summary_index),
                stack.path(),
            ));

            for paragraph in split_paragraphs(content) {
                let pieces = if self.fits(&paragraph) {
                    vec![paragraph]
                } else {
                    self.pack_sentences(&paragraph)
                };
                for piece in pieces {
                    chunks.push(self.record(
                        ChunkLevel::Paragraph,
                        section_title,
                        &piece,
                        Some(section_index),
                        stack.path(),
                    ));
                }
            }
        }

        chunks
    }

    fn summary_content(&self, doc: &ParsedDocument) -> String {
        let mut summary = doc.title.trim().to_string();

        if let Some(first) = doc.sections.first() {
            let intro = first.content.trim();
            if !intro.is_empty() && intro.chars().count() < self.summary_intro_max_chars {
                if !summary.is_empty() {
                    summary.push_str("\n\n");
                }
                summary.push_str(intro);
            }
        }

        summary
    }

    /// Greedily join sentences while the running text stays within budget
    fn pack_sentences(&self, paragraph: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut current = String::new();

        for sentence in split_sentences(paragraph) {
            if current.is_empty() {
                current = sentence;
                continue;
            }

            let candidate = format!("{} {}", current, sentence);
            if self.fits(&candidate) {
                current = candidate;
            } else {
                pieces.push(std::mem::replace(&mut current, sentence));
            }
        }

        if !current.is_empty() {
            pieces.push(current);
        }
        pieces
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse_markdown, Heading, Section};

    fn section(level: u8, heading: &str, content: &str) -> Section {
        Section {
            heading: Some(Heading {
                level,
                text: heading.to_string(),
            }),
            content: content.to_string(),
        }
    }

    fn doc(title: &str, sections: Vec<Section>) -> ParsedDocument {
        ParsedDocument {
            title: title.to_string(),
            sections,
            ..Default::default()
        }
    }

    fn assert_hierarchy(chunks: &[ChunkRecord]) {
        assert_eq!(chunks[0].level, ChunkLevel::Summary);
        assert!(chunks[0].parent_index.is_none());
        for (i, chunk) in chunks.iter().enumerate().skip(1) {
            let parent = chunk.parent_index.expect("non-summary chunk has a parent");
            assert!(parent < i, "parent {} must precede chunk {}", parent, i);
            assert_eq!(chunk.level.parent_level(), Some(chunks[parent].level));
        }
    }

    #[test]
    fn test_small_document() {
        let chunker = Chunker::new(512);
        let d = doc(
            "Effective Go",
            vec![
                section(1, "Effective Go", "Go is a new language."),
                section(2, "Formatting", "Use gofmt."),
            ],
        );

        let chunks = chunker.chunk(&d);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content, "Effective Go\n\nGo is a new language.");
        assert_eq!(chunks[1].level, ChunkLevel::Section);
        assert_eq!(chunks[1].breadcrumbs, vec!["Effective Go"]);
        assert_eq!(chunks[2].title, "Formatting");
        assert_eq!(chunks[2].breadcrumbs, vec!["Effective Go", "Formatting"]);
        assert_eq!(chunks[2].token_count, chunker.count_tokens("Use gofmt."));
        assert_hierarchy(&chunks);
    }

    #[test]
    fn test_long_intro_not_in_summary() {
        let chunker = Chunker::new(512);
        let intro = "x".repeat(600);
        let chunks = chunker.chunk(&doc("T", vec![section(1, "T", &intro)]));

        assert_eq!(chunks[0].content, "T");
    }

    #[test]
    fn test_oversized_section_splits_into_paragraphs() {
        let chunker = Chunker::new(10);
        let body = "First paragraph is here.\n\nSecond paragraph follows.\n\nThird.";
        let chunks = chunker.chunk(&doc("Guide", vec![section(2, "Usage", body)]));

        // summary, header, three paragraphs
        assert_eq!(chunks.len(), 5);
        let header = &chunks[1];
        assert_eq!(header.level, ChunkLevel::Section);
        assert_eq!(header.content, "Usage");
        assert!(chunks[2..]
            .iter()
            .all(|c| c.level == ChunkLevel::Paragraph && c.parent_index == Some(1)));
        assert_eq!(chunks[4].content, "Third.");
        assert_hierarchy(&chunks);
    }

    #[test]
    fn test_oversized_paragraph_packs_sentences() {
        let chunker = Chunker::new(8);
        let body = "Alpha beta gamma. Delta epsilon. Zeta eta theta iota. Kappa.";
        let chunks = chunker.chunk(&doc("T", vec![section(1, "S", body)]));

        let paragraphs: Vec<&ChunkRecord> = chunks
            .iter()
            .filter(|c| c.level == ChunkLevel::Paragraph)
            .collect();
        assert!(paragraphs.len() > 1);

        let longest_sentence = split_sentences(body)
            .iter()
            .map(|s| chunker.count_tokens(s))
            .max()
            .unwrap();
        for p in &paragraphs {
            assert!(p.token_count <= chunker.max_tokens() + longest_sentence);
        }

        let rejoined: Vec<String> = paragraphs.iter().map(|c| c.content.clone()).collect();
        assert_eq!(rejoined.join(" "), body);
    }

    #[test]
    fn test_single_long_sentence_kept_whole() {
        let chunker = Chunker::new(2);
        let body = "This sentence is much longer than the budget allows";
        let chunks = chunker.chunk(&doc("T", vec![section(1, "S", body)]));

        assert_eq!(chunks.last().unwrap().content, body);
    }

    #[test]
    fn test_breadcrumb_stack() {
        let chunker = Chunker::new(512);
        let d = doc(
            "Book",
            vec![
                section(1, "Part", "a"),
                section(2, "Chapter", "b"),
                section(3, "Topic", "c"),
                section(2, "Next Chapter", "d"),
                section(1, "Part Two", "e"),
            ],
        );

        let crumbs: Vec<Vec<String>> = chunker
            .chunk(&d)
            .into_iter()
            .map(|c| c.breadcrumbs)
            .collect();

        assert_eq!(crumbs[0], vec!["Book"]);
        assert_eq!(crumbs[3], vec!["Book", "Part", "Chapter", "Topic"]);
        assert_eq!(crumbs[4], vec!["Book", "Part", "Next Chapter"]);
        assert_eq!(crumbs[5], vec!["Book", "Part Two"]);
    }

    #[test]
    fn test_no_sections_uses_raw_content() {
        let chunker = Chunker::new(512);
        let d = ParsedDocument {
            title: "Raw".to_string(),
            raw_content: "  loose text  ".to_string(),
            ..Default::default()
        };

        let chunks = chunker.chunk(&d);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].level, ChunkLevel::Section);
        assert_eq!(chunks[1].content, "loose text");
        assert_eq!(chunks[1].parent_index, Some(0));
    }

    #[test]
    fn test_empty_document_still_has_summary() {
        let chunks = Chunker::default().chunk(&doc("Only Title", Vec::new()));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Only Title");
    }

    #[test]
    fn test_untitled_section_uses_document_title() {
        let chunker = Chunker::new(512);
        let parsed = parse_markdown("Lead text.\n\n## Setup\n\nSteps.").unwrap();
        let parsed = parsed.with_fallback_title("setup-guide");

        let chunks = chunker.chunk(&parsed);

        assert_eq!(chunks[1].title, "setup-guide");
        assert_eq!(chunks[1].breadcrumbs, vec!["setup-guide"]);
        assert_eq!(chunks[2].breadcrumbs, vec!["setup-guide", "Setup"]);
    }

    #[test]
    fn test_deterministic() {
        let chunker = Chunker::new(16);
        let parsed = parse_markdown(
            "# Doc\n\nIntro.\n\n## A\n\nOne two three four five six. Seven eight nine ten.\n\nMore here.",
        )
        .unwrap();

        assert_eq!(chunker.chunk(&parsed), chunker.chunk(&parsed));
        assert_hierarchy(&chunker.chunk(&parsed));
    }

    #[test]
    fn test_level_round_trip_strings() {
        assert_eq!("Section".parse::<ChunkLevel>().unwrap(), ChunkLevel::Section);
        assert!("chapter".parse::<ChunkLevel>().is_err());
        assert_eq!(ChunkLevel::Paragraph.to_string(), "paragraph");
    }
}
