//! Markdown tokenizer adapter.
//!
//! Flattens the pulldown-cmark event stream into the small node sequence the
//! endpoint parser walks: headings with their source text, code blocks with
//! their fence tag, and a placeholder for every other top-level block.

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use std::ops::Range;

/// One block-level node of a Markdown document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// ATX or setext heading. The text is the heading's source with the `#`
    /// markers or the underline removed; emphasis and escapes are kept as
    /// written so regex URLs survive.
    Heading { level: u8, text: String },
    /// Fenced or indented code block; `syntax` is the fence info string
    CodeBlock { syntax: String, code: String },
    /// Paragraph, list, quote, table, rule or raw HTML
    Other,
}

/// Tokenize a document into block nodes, in document order.
pub fn tokenize(source: &str) -> Vec<Node> {
    let mut tokenizer = Tokenizer {
        source,
        ..Tokenizer::default()
    };
    for (event, range) in Parser::new(source).into_offset_iter() {
        tokenizer.process_event(event, range);
    }
    tokenizer.nodes
}

#[derive(Default)]
struct Tokenizer<'a> {
    source: &'a str,
    nodes: Vec<Node>,
    /// Source text of the heading being read, if inside one
    heading: Option<String>,
    /// Fence tag and code of the code block being read, if inside one
    code: Option<(String, String)>,
    /// Nesting of lists and block quotes
    containers: usize,
}

impl Tokenizer<'_> {
    fn process_event(&mut self, event: Event, range: Range<usize>) {
        match event {
            Event::Start(Tag::Heading { .. }) => {
                let raw = self.source.get(range).unwrap_or("");
                self.heading = Some(heading_text(raw));
            }
            Event::End(TagEnd::Heading(level)) => {
                if let Some(text) = self.heading.take() {
                    self.nodes.push(Node::Heading {
                        level: level as u8,
                        text,
                    });
                }
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let syntax = match kind {
                    CodeBlockKind::Fenced(info) => info.trim().to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some((syntax, String::new()));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((syntax, mut code)) = self.code.take() {
                    // The closing line break belongs to the fence, not the content
                    if code.ends_with('\n') {
                        code.pop();
                    }
                    self.nodes.push(Node::CodeBlock { syntax, code });
                }
            }
            Event::Start(Tag::List(_)) | Event::Start(Tag::BlockQuote(_)) => {
                self.containers += 1;
            }
            Event::End(TagEnd::List(_)) | Event::End(TagEnd::BlockQuote(_)) => {
                self.containers = self.containers.saturating_sub(1);
                self.push_other();
            }
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Table)
            | Event::End(TagEnd::HtmlBlock)
            | Event::Rule => {
                self.push_other();
            }
            Event::Text(text) => {
                if let Some((_, code)) = self.code.as_mut() {
                    code.push_str(&text);
                }
            }
            _ => {}
        }
    }

    /// Record a non-heading, non-code block once it closes at top level.
    fn push_other(&mut self) {
        if self.containers == 0 && self.heading.is_none() {
            self.nodes.push(Node::Other);
        }
    }
}

/// Heading text from its source: ATX `#` markers (opening and closing
/// sequence) or the setext underline are dropped, lines are joined.
fn heading_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix('#') {
        let content = rest.trim_start_matches('#');
        let without_closing = content.trim_end_matches('#');
        // A closing sequence only counts when preceded by a space
        let content = if without_closing.len() < content.len()
            && (without_closing.is_empty() || without_closing.ends_with([' ', '\t']))
        {
            without_closing
        } else {
            content
        };
        return content.trim().to_string();
    }

    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.len() > 1 {
        lines.pop();
    }
    lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
