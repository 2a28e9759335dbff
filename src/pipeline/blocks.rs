//! A small block model shared by the native document handlers.
//!
//! Markdown, DOCX and PDF text all pass through [`Block`] on their way to
//! another format, so each reader and writer only has to know one shape.

/// A span of text with uniform character formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, runs: Vec<Run> },
    Paragraph(Vec<Run>),
    ListItem { ordered: bool, depth: u8, runs: Vec<Run> },
    Quote(Vec<Run>),
    CodeBlock(String),
    Table(Vec<Vec<String>>),
    Rule,
}

/// Concatenated text of `runs` without formatting.
pub fn plain_text(runs: &[Run]) -> String {
    runs.iter().map(|r| r.text.as_str()).collect()
}

fn escape_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '`' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape characters that would start block syntax at the beginning of a line.
pub fn escape_line_start(line: &str) -> String {
    let trimmed = line.trim_start();
    let indent = &line[..line.len() - trimmed.len()];
    let needs = trimmed.starts_with('#')
        || trimmed.starts_with('>')
        || trimmed.starts_with("- ")
        || trimmed.starts_with("+ ")
        || trimmed.starts_with("* ")
        || trimmed.starts_with("```")
        || is_ordered_marker(trimmed);
    if needs {
        format!("{indent}\\{trimmed}")
    } else {
        line.to_string()
    }
}

fn is_ordered_marker(s: &str) -> bool {
    let digits = s.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && s[digits..].starts_with(". ")
}

fn runs_to_markdown(runs: &[Run]) -> String {
    let mut out = String::new();
    for run in runs {
        if run.text.is_empty() {
            continue;
        }
        if run.code {
            out.push('`');
            out.push_str(&run.text);
            out.push('`');
            continue;
        }
        // Markers must hug the text, so surrounding blanks stay outside.
        let core = run.text.trim();
        if core.is_empty() || !(run.bold || run.italic) {
            out.push_str(&escape_inline(&run.text));
            continue;
        }
        let lead = &run.text[..run.text.len() - run.text.trim_start().len()];
        let trail = &run.text[run.text.trim_end().len()..];
        let marker = match (run.bold, run.italic) {
            (true, true) => "***",
            (true, false) => "**",
            _ => "*",
        };
        out.push_str(lead);
        out.push_str(marker);
        out.push_str(&escape_inline(core));
        out.push_str(marker);
        out.push_str(trail);
    }
    out
}

fn table_to_markdown(rows: &[Vec<String>]) -> String {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }
    let cell = |s: &str| s.replace('|', "\\|").replace('\n', " ");
    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (i, row) in rows.iter().enumerate() {
        let cells: Vec<String> = (0..width)
            .map(|c| cell(row.get(c).map(String::as_str).unwrap_or("")))
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
        if i == 0 {
            lines.push(format!("|{}", " --- |".repeat(width)));
        }
    }
    lines.join("\n")
}

/// Render blocks as CommonMark.
pub fn to_markdown(blocks: &[Block]) -> String {
    let mut out = String::new();
    let mut prev_list = false;
    for block in blocks {
        let is_list = matches!(block, Block::ListItem { .. });
        if !out.is_empty() {
            out.push_str(if is_list && prev_list { "\n" } else { "\n\n" });
        }
        match block {
            Block::Heading { level, runs } => {
                out.push_str(&"#".repeat((*level).clamp(1, 6) as usize));
                out.push(' ');
                out.push_str(&runs_to_markdown(runs));
            }
            Block::Paragraph(runs) => {
                let text = runs_to_markdown(runs);
                let lines: Vec<String> = text.lines().map(escape_line_start).collect();
                out.push_str(&lines.join("  \n"));
            }
            Block::ListItem {
                ordered,
                depth,
                runs,
            } => {
                out.push_str(&"  ".repeat(*depth as usize));
                out.push_str(if *ordered { "1. " } else { "- " });
                out.push_str(&runs_to_markdown(runs).replace('\n', " "));
            }
            Block::Quote(runs) => {
                let text = runs_to_markdown(runs);
                let lines: Vec<String> = text.lines().map(|l| format!("> {l}")).collect();
                out.push_str(&lines.join("\n"));
            }
            Block::CodeBlock(code) => {
                out.push_str("```\n");
                out.push_str(code.trim_end_matches('\n'));
                out.push_str("\n```");
            }
            Block::Table(rows) => out.push_str(&table_to_markdown(rows)),
            Block::Rule => out.push_str("---"),
        }
        prev_list = is_list;
    }
    out.push('\n');
    out
}

/// Render blocks as plain text: no markup, one blank line between blocks.
pub fn to_text(blocks: &[Block]) -> String {
    let mut out = String::new();
    let mut prev_list = false;
    for block in blocks {
        let is_list = matches!(block, Block::ListItem { .. });
        if !out.is_empty() {
            out.push_str(if is_list && prev_list { "\n" } else { "\n\n" });
        }
        match block {
            Block::Heading { runs, .. } | Block::Paragraph(runs) | Block::Quote(runs) => {
                out.push_str(&plain_text(runs))
            }
            Block::ListItem { depth, runs, .. } => {
                out.push_str(&"  ".repeat(*depth as usize));
                out.push_str("• ");
                out.push_str(&plain_text(runs));
            }
            Block::CodeBlock(code) => out.push_str(code.trim_end_matches('\n')),
            Block::Table(rows) => {
                let lines: Vec<String> = rows.iter().map(|r| r.join("\t")).collect();
                out.push_str(&lines.join("\n"));
            }
            Block::Rule => out.push_str("----"),
        }
        prev_list = is_list;
    }
    out.push('\n');
    out
}

/// Split plain text into paragraphs on blank lines.
pub fn from_text(text: &str) -> Vec<Block> {
    let normalised = text.replace("\r\n", "\n");
    normalised
        .split("\n\n")
        .map(|p| p.trim_matches('\n'))
        .filter(|p| !p.trim().is_empty())
        .map(|p| Block::Paragraph(vec![Run::plain(p)]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bold(t: &str) -> Run {
        Run {
            text: t.into(),
            bold: true,
            ..Run::default()
        }
    }

    #[test]
    fn markdown_rendering() {
        let blocks = vec![
            Block::Heading {
                level: 2,
                runs: vec![Run::plain("Intro")],
            },
            Block::Paragraph(vec![Run::plain("Hello "), bold("world"), Run::plain("!")]),
            Block::ListItem {
                ordered: false,
                depth: 0,
                runs: vec![Run::plain("one")],
            },
            Block::ListItem {
                ordered: false,
                depth: 1,
                runs: vec![Run::plain("two")],
            },
            Block::CodeBlock("let x = 1;\n".into()),
        ];
        assert_eq!(
            to_markdown(&blocks),
            "## Intro\n\nHello **world**!\n\n- one\n  - two\n\n```\nlet x = 1;\n```\n"
        );
    }

    #[test]
    fn bold_markers_hug_text() {
        let md = runs_to_markdown(&[Run::plain("a"), bold(" b "), Run::plain("c")]);
        assert_eq!(md, "a **b** c");
    }

    #[test]
    fn literal_syntax_is_escaped() {
        assert_eq!(escape_line_start("# not a heading"), "\\# not a heading");
        assert_eq!(escape_line_start("3. not a list"), "\\3. not a list");
        assert_eq!(escape_line_start("plain"), "plain");
        assert_eq!(runs_to_markdown(&[Run::plain("a*b")]), "a\\*b");
    }

    #[test]
    fn table_rendering() {
        let t = Block::Table(vec![
            vec!["a".into(), "b".into()],
            vec!["1".into(), "x|y".into()],
        ]);
        assert_eq!(
            to_markdown(&[t]),
            "| a | b |\n| --- | --- |\n| 1 | x\\|y |\n"
        );
    }

    #[test]
    fn text_paragraphs() {
        let blocks = from_text("first line\nsecond line\n\n\nnext para\n");
        assert_eq!(blocks.len(), 2);
        assert_eq!(to_text(&blocks), "first line\nsecond line\n\nnext para\n");
    }
}
