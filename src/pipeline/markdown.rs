//! Native Markdown handling with pulldown-cmark.

use crate::pipeline::blocks::{plain_text, Block, Run};
use pulldown_cmark::{html, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// Value of the `generator` meta tag in standalone HTML output.
pub const GENERATOR: &str = "docshift";

fn parser_options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap an HTML fragment in a complete document.
pub fn standalone_html(title: &str, body: &str, stylesheet: Option<&str>) -> String {
    let mut out = String::with_capacity(body.len() + 256);
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<meta name=\"generator\" content=\"{GENERATOR}\">\n"));
    out.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    if let Some(css) = stylesheet {
        out.push_str(&format!(
            "<link rel=\"stylesheet\" href=\"{}\">\n",
            escape_html(css)
        ));
    }
    out.push_str("</head>\n<body>\n");
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("</body>\n</html>\n");
    out
}

/// Markdown → HTML fragment.
pub fn to_html_fragment(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, parser_options());
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Text of the first heading, used as the document title.
pub fn first_heading(blocks: &[Block]) -> Option<String> {
    blocks.iter().find_map(|b| match b {
        Block::Heading { runs, .. } => Some(plain_text(runs)),
        _ => None,
    })
}

fn level_number(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    runs: Vec<Run>,
    bold: usize,
    italic: usize,
    lists: Vec<bool>,
    in_item: bool,
    quote: usize,
    code: Option<String>,
    table: Option<Vec<Vec<String>>>,
    row: Vec<String>,
    cell: Option<String>,
}

impl BlockBuilder {
    fn push_text(&mut self, text: &str, code: bool) {
        if let Some(ref mut buf) = self.code {
            buf.push_str(text);
        } else if let Some(ref mut cell) = self.cell {
            cell.push_str(text);
        } else {
            self.runs.push(Run {
                text: text.to_string(),
                bold: self.bold > 0,
                italic: self.italic > 0,
                code,
            });
        }
    }

    fn flush_item(&mut self) {
        if self.runs.is_empty() {
            return;
        }
        let runs = std::mem::take(&mut self.runs);
        let depth = self.lists.len().saturating_sub(1) as u8;
        let ordered = self.lists.last().copied().unwrap_or(false);
        self.blocks.push(Block::ListItem {
            ordered,
            depth,
            runs,
        });
    }

    fn flush_paragraph(&mut self) {
        if self.in_item {
            self.flush_item();
            return;
        }
        let runs = std::mem::take(&mut self.runs);
        if runs.is_empty() {
            return;
        }
        self.blocks.push(if self.quote > 0 {
            Block::Quote(runs)
        } else {
            Block::Paragraph(runs)
        });
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Heading { .. }) | Event::Start(Tag::Paragraph) => {
                if !self.in_item {
                    self.runs.clear();
                }
            }
            Event::End(TagEnd::Heading(level)) => {
                let runs = std::mem::take(&mut self.runs);
                self.blocks.push(Block::Heading {
                    level: level_number(level),
                    runs,
                });
            }
            Event::End(TagEnd::Paragraph) => self.flush_paragraph(),
            Event::Start(Tag::List(start)) => {
                self.flush_item();
                self.lists.push(start.is_some());
            }
            Event::End(TagEnd::List(_)) => {
                self.flush_item();
                self.lists.pop();
                self.in_item = !self.lists.is_empty();
            }
            Event::Start(Tag::Item) => {
                self.flush_item();
                self.in_item = true;
            }
            Event::End(TagEnd::Item) => self.flush_item(),
            Event::Start(Tag::BlockQuote(_)) => self.quote += 1,
            Event::End(TagEnd::BlockQuote(_)) => self.quote = self.quote.saturating_sub(1),
            Event::Start(Tag::CodeBlock(_)) => self.code = Some(String::new()),
            Event::End(TagEnd::CodeBlock) => {
                if let Some(code) = self.code.take() {
                    self.blocks.push(Block::CodeBlock(code));
                }
            }
            Event::Start(Tag::Table(_)) => self.table = Some(Vec::new()),
            Event::End(TagEnd::Table) => {
                if let Some(rows) = self.table.take() {
                    self.blocks.push(Block::Table(rows));
                }
            }
            Event::Start(Tag::TableHead) | Event::Start(Tag::TableRow) => self.row.clear(),
            Event::End(TagEnd::TableHead) | Event::End(TagEnd::TableRow) => {
                let row = std::mem::take(&mut self.row);
                if let Some(ref mut rows) = self.table {
                    rows.push(row);
                }
            }
            Event::Start(Tag::TableCell) => self.cell = Some(String::new()),
            Event::End(TagEnd::TableCell) => {
                if let Some(cell) = self.cell.take() {
                    self.row.push(cell.trim().to_string());
                }
            }
            Event::Start(Tag::Strong) => self.bold += 1,
            Event::End(TagEnd::Strong) => self.bold = self.bold.saturating_sub(1),
            Event::Start(Tag::Emphasis) => self.italic += 1,
            Event::End(TagEnd::Emphasis) => self.italic = self.italic.saturating_sub(1),
            Event::Text(t) => self.push_text(&t, false),
            Event::Code(t) => self.push_text(&t, true),
            Event::SoftBreak => self.push_text(" ", false),
            Event::HardBreak => self.push_text("\n", false),
            Event::Rule => self.blocks.push(Block::Rule),
            _ => {}
        }
    }
}

/// Markdown → block model.
pub fn parse_blocks(markdown: &str) -> Vec<Block> {
    let mut builder = BlockBuilder::default();
    for event in Parser::new_ext(markdown, parser_options()) {
        builder.event(event);
    }
    builder.flush_paragraph();
    builder.blocks
}
