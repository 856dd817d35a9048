//! Markdown parsing into sections

use super::{split_front_matter, CodeBlock, Heading, ParsedDocument, Section};
use crate::error::Result;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Parser, Tag, TagEnd};

/// Accumulates block text into the section currently being built
#[derive(Default)]
struct SectionBuilder {
    sections: Vec<Section>,
    current: Section,
    block: String,
    list_depth: usize,
}

impl SectionBuilder {
    fn flush_block(&mut self) {
        let text = self.block.trim_end();
        if !text.trim().is_empty() && text.trim() != "-" {
            self.current.content.push_str(text);
            self.current
                .content
                .push_str(if self.list_depth > 0 { "\n" } else { "\n\n" });
        }
        self.block.clear();
    }

    fn start_section(&mut self, heading: Heading) {
        self.flush_block();
        let previous = std::mem::replace(
            &mut self.current,
            Section {
                heading: Some(heading),
                content: String::new(),
            },
        );
        self.push(previous);
    }

    fn push(&mut self, mut section: Section) {
        section.content = section.content.trim_end().to_string();
        if section.heading.is_some() || !section.content.is_empty() {
            self.sections.push(section);
        }
    }

    fn finish(mut self) -> Vec<Section> {
        self.flush_block();
        let last = std::mem::take(&mut self.current);
        self.push(last);
        self.sections
    }
}

/// Parse Markdown content into title, headings, sections and code blocks
pub fn parse_markdown(content: &str) -> Result<ParsedDocument> {
    let (front_matter, body) = split_front_matter(content);

    let mut doc = ParsedDocument {
        title: front_matter.get("title").cloned().unwrap_or_default(),
        front_matter,
        raw_content: body.to_string(),
        ..Default::default()
    };

    let mut builder = SectionBuilder::default();
    let mut current_heading: Option<(u8, String)> = None;
    let mut current_code: Option<(Option<String>, String)> = None;

    for event in Parser::new(body) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                builder.flush_block();
                current_heading = Some((heading_level_to_u8(level), String::new()));
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, text)) = current_heading.take() {
                    let text = text.trim().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    if doc.title.is_empty() && level == 1 {
                        doc.title = text.clone();
                    }
                    let heading = Heading { level, text };
                    doc.headings.push(heading.clone());
                    builder.start_section(heading);
                }
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                builder.flush_block();
                let language = match kind {
                    CodeBlockKind::Fenced(lang) => {
                        let lang = lang.split_whitespace().next().unwrap_or("").to_string();
                        if lang.is_empty() {
                            None
                        } else {
                            Some(lang)
                        }
                    }
                    CodeBlockKind::Indented => None,
                };
                current_code = Some((language, String::new()));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((language, code)) = current_code.take() {
                    let fence = language.as_deref().unwrap_or("");
                    builder.block.push_str(&format!(
                        "```{}\n{}\n```",
                        fence,
                        code.trim_end_matches('\n')
                    ));
                    builder.flush_block();
                    doc.code_blocks.push(CodeBlock {
                        language,
                        content: code,
                    });
                }
            }
            Event::Text(text) => {
                if let Some((_, heading)) = current_heading.as_mut() {
                    heading.push_str(&text);
                } else if let Some((_, code)) = current_code.as_mut() {
                    code.push_str(&text);
                } else {
                    builder.block.push_str(&text);
                }
            }
            Event::Code(code) => {
                if let Some((_, heading)) = current_heading.as_mut() {
                    heading.push_str(&code);
                } else {
                    builder.block.push('`');
                    builder.block.push_str(&code);
                    builder.block.push('`');
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some((_, heading)) = current_heading.as_mut() {
                    heading.push(' ');
                } else {
                    builder.block.push(' ');
                }
            }
            Event::End(TagEnd::Paragraph) => builder.flush_block(),
            Event::Start(Tag::List(_)) => {
                builder.flush_block();
                builder.list_depth += 1;
            }
            Event::End(TagEnd::List(_)) => {
                builder.flush_block();
                builder.list_depth = builder.list_depth.saturating_sub(1);
                if builder.list_depth == 0 {
                    builder.current.content.push('\n');
                }
            }
            Event::Start(Tag::Item) => {
                builder.flush_block();
                let indent = "  ".repeat(builder.list_depth.saturating_sub(1));
                builder.block.push_str(&indent);
                builder.block.push_str("- ");
            }
            Event::End(TagEnd::Item) => builder.flush_block(),
            _ => {}
        }
    }

    doc.sections = builder.finish();
    Ok(doc)
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
