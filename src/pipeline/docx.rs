//! Native DOCX reading and writing over the block model.
//!
//! The writer emits the smallest package Word and LibreOffice accept:
//! content types, relationships, `document.xml`, `styles.xml` and, when the
//! document has lists, `numbering.xml`. The reader understands paragraphs,
//! heading and quote styles, list numbering, bold/italic runs and tables.

use crate::pipeline::blocks::{Block, Run};
use crate::pipeline::package::{read_part, write_package, xml_escape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering" Target="numbering.xml"/></Relationships>"#;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Built-in styles used when no template is given.
pub fn default_styles() -> String {
    let mut s = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="{W_NS}"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:cs="Calibri"/><w:sz w:val="22"/></w:rPr></w:rPrDefault><w:pPrDefault><w:pPr><w:spacing w:after="160" w:line="259" w:lineRule="auto"/></w:pPr></w:pPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>"#
    );
    let sizes = [32, 28, 26, 24, 22, 22];
    for (i, size) in sizes.iter().enumerate() {
        let level = i + 1;
        s.push_str(&format!(
            r#"<w:style w:type="paragraph" w:styleId="Heading{level}"><w:name w:val="heading {level}"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="80"/><w:outlineLvl w:val="{}"/></w:pPr><w:rPr><w:b/><w:sz w:val="{size}"/></w:rPr></w:style>"#,
            level - 1
        ));
    }
    s.push_str(r#"<w:style w:type="paragraph" w:styleId="Quote"><w:name w:val="Quote"/><w:basedOn w:val="Normal"/><w:qFormat/><w:pPr><w:ind w:left="720"/></w:pPr><w:rPr><w:i/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="SourceCode"><w:name w:val="Source Code"/><w:basedOn w:val="Normal"/><w:pPr><w:spacing w:after="0"/></w:pPr><w:rPr><w:rFonts w:ascii="Courier New" w:hAnsi="Courier New" w:cs="Courier New"/><w:sz w:val="20"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="ListParagraph"><w:name w:val="List Paragraph"/><w:basedOn w:val="Normal"/><w:qFormat/><w:pPr><w:ind w:left="720"/></w:pPr></w:style><w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/><w:tblPr><w:tblBorders><w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/></w:tblBorders></w:tblPr></w:style></w:styles>"#);
    s
}

fn numbering() -> String {
    let mut s = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="{W_NS}">"#
    );
    for (id, fmt) in [(0, "bullet"), (1, "decimal")] {
        s.push_str(&format!(r#"<w:abstractNum w:abstractNumId="{id}">"#));
        for lvl in 0..9 {
            let text = if fmt == "bullet" {
                "•".to_string()
            } else {
                format!("%{}.", lvl + 1)
            };
            s.push_str(&format!(
                r#"<w:lvl w:ilvl="{lvl}"><w:start w:val="1"/><w:numFmt w:val="{fmt}"/><w:lvlText w:val="{text}"/><w:lvlJc w:val="left"/><w:pPr><w:ind w:left="{}" w:hanging="360"/></w:pPr></w:lvl>"#,
                720 * (lvl + 1)
            ));
        }
        s.push_str("</w:abstractNum>");
    }
    s.push_str(r#"<w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num><w:num w:numId="2"><w:abstractNumId w:val="1"/></w:num></w:numbering>"#);
    s
}

fn run_xml(run: &Run, styled: bool) -> String {
    let mut rpr = String::new();
    if styled {
        if run.bold {
            rpr.push_str("<w:b/>");
        }
        if run.italic {
            rpr.push_str("<w:i/>");
        }
        if run.code {
            rpr.push_str(r#"<w:rFonts w:ascii="Courier New" w:hAnsi="Courier New" w:cs="Courier New"/>"#);
        }
    }
    let mut out = String::from("<w:r>");
    if !rpr.is_empty() {
        out.push_str("<w:rPr>");
        out.push_str(&rpr);
        out.push_str("</w:rPr>");
    }
    for (i, line) in run.text.split('\n').enumerate() {
        if i > 0 {
            out.push_str("<w:br/>");
        }
        if !line.is_empty() {
            out.push_str(r#"<w:t xml:space="preserve">"#);
            out.push_str(&xml_escape(line));
            out.push_str("</w:t>");
        }
    }
    out.push_str("</w:r>");
    out
}

fn paragraph_xml(ppr: &str, runs: &[Run], styled: bool) -> String {
    let mut out = String::from("<w:p>");
    if !ppr.is_empty() {
        out.push_str("<w:pPr>");
        out.push_str(ppr);
        out.push_str("</w:pPr>");
    }
    for run in runs {
        out.push_str(&run_xml(run, styled));
    }
    out.push_str("</w:p>");
    out
}

fn block_xml(block: &Block, styled: bool) -> String {
    match block {
        Block::Heading { level, runs } if styled => paragraph_xml(
            &format!(r#"<w:pStyle w:val="Heading{}"/>"#, (*level).clamp(1, 6)),
            runs,
            true,
        ),
        Block::Heading { runs, .. } | Block::Paragraph(runs) => paragraph_xml("", runs, styled),
        Block::Quote(runs) if styled => paragraph_xml(r#"<w:pStyle w:val="Quote"/>"#, runs, true),
        Block::Quote(runs) => paragraph_xml("", runs, false),
        Block::ListItem {
            ordered,
            depth,
            runs,
        } if styled => paragraph_xml(
            &format!(
                r#"<w:pStyle w:val="ListParagraph"/><w:numPr><w:ilvl w:val="{}"/><w:numId w:val="{}"/></w:numPr>"#,
                (*depth).min(8),
                if *ordered { 2 } else { 1 }
            ),
            runs,
            true,
        ),
        Block::ListItem { runs, .. } => {
            let mut all = vec![Run::plain("• ")];
            all.extend(runs.iter().cloned());
            paragraph_xml("", &all, false)
        }
        Block::CodeBlock(code) => code
            .trim_end_matches('\n')
            .split('\n')
            .map(|line| {
                paragraph_xml(
                    if styled { r#"<w:pStyle w:val="SourceCode"/>"# } else { "" },
                    &[Run::plain(line)],
                    false,
                )
            })
            .collect(),
        Block::Table(rows) => {
            let mut out = String::from(
                r#"<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/><w:tblW w:w="0" w:type="auto"/></w:tblPr>"#,
            );
            for (r, row) in rows.iter().enumerate() {
                out.push_str("<w:tr>");
                for cell in row {
                    let run = Run {
                        text: cell.clone(),
                        bold: r == 0 && styled,
                        ..Run::default()
                    };
                    out.push_str("<w:tc>");
                    out.push_str(&paragraph_xml("", &[run], styled));
                    out.push_str("</w:tc>");
                }
                out.push_str("</w:tr>");
            }
            out.push_str("</w:tbl>");
            out
        }
        Block::Rule => paragraph_xml(
            r#"<w:pBdr><w:bottom w:val="single" w:sz="6" w:space="1" w:color="auto"/></w:pBdr>"#,
            &[],
            false,
        ),
    }
}

/// Build `word/document.xml` for `blocks`.
pub fn document_xml(blocks: &[Block], styled: bool) -> String {
    let mut body = String::new();
    for block in blocks {
        body.push_str(&block_xml(block, styled));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}"><w:body>{body}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#
    )
}

/// Write `blocks` as a DOCX package. `styles` replaces the built-in
/// `styles.xml` when given.
pub fn write(target: &Path, blocks: &[Block], styled: bool, styles: Option<String>) -> std::io::Result<()> {
    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", PACKAGE_RELS.to_string()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS.to_string()),
        ("word/document.xml", document_xml(blocks, styled)),
        ("word/styles.xml", styles.unwrap_or_else(default_styles)),
        ("word/numbering.xml", numbering()),
    ];
    write_package(target, &parts)
}

/// `word/styles.xml` of a template document.
pub fn template_styles(template: &Path) -> std::io::Result<Option<String>> {
    read_part(template, "word/styles.xml")
}

// ── Reading ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct Para {
    style: Option<String>,
    list_depth: Option<u8>,
    runs: Vec<Run>,
}

#[derive(Default)]
struct DocReader {
    blocks: Vec<Block>,
    para: Option<Para>,
    run: Option<Run>,
    in_rpr: bool,
    in_text: bool,
    table: Option<Vec<Vec<String>>>,
    row: Vec<String>,
    cell: Option<String>,
}

fn attr_val(e: &BytesStart<'_>) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        (a.key.local_name().as_ref() == b"val")
            .then(|| a.unescape_value().ok().map(|v| v.into_owned()))
            .flatten()
    })
}

fn toggled_on(e: &BytesStart<'_>) -> bool {
    !matches!(attr_val(e).as_deref(), Some("0") | Some("false") | Some("off"))
}

fn heading_level(style: &str) -> Option<u8> {
    let lower = style.to_ascii_lowercase();
    if lower == "title" {
        return Some(1);
    }
    lower
        .strip_prefix("heading")
        .map(str::trim)
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|n| (1..=6).contains(n))
}

impl DocReader {
    fn open(&mut self, e: &BytesStart<'_>, empty: bool) {
        match e.local_name().as_ref() {
            b"p" => self.para = Some(Para::default()),
            b"pStyle" => {
                if let Some(p) = self.para.as_mut() {
                    p.style = attr_val(e);
                }
            }
            b"numPr" => {
                if let Some(p) = self.para.as_mut() {
                    p.list_depth.get_or_insert(0);
                }
            }
            b"ilvl" => {
                if let Some(p) = self.para.as_mut() {
                    p.list_depth = Some(attr_val(e).and_then(|v| v.parse().ok()).unwrap_or(0));
                }
            }
            b"r" => self.run = Some(Run::default()),
            b"rPr" => self.in_rpr = !empty,
            b"b" if self.in_rpr => {
                if let Some(r) = self.run.as_mut() {
                    r.bold = toggled_on(e);
                }
            }
            b"i" if self.in_rpr => {
                if let Some(r) = self.run.as_mut() {
                    r.italic = toggled_on(e);
                }
            }
            b"t" => self.in_text = !empty,
            b"tab" => self.push_text("\t"),
            b"br" | b"cr" => self.push_text("\n"),
            b"tbl" => self.table = Some(Vec::new()),
            b"tr" => self.row.clear(),
            b"tc" => self.cell = Some(String::new()),
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"t" => self.in_text = false,
            b"rPr" => self.in_rpr = false,
            b"r" => {
                if let (Some(run), Some(p)) = (self.run.take(), self.para.as_mut()) {
                    if !run.text.is_empty() {
                        match p.runs.last_mut() {
                            Some(last)
                                if last.bold == run.bold
                                    && last.italic == run.italic
                                    && last.code == run.code =>
                            {
                                last.text.push_str(&run.text)
                            }
                            _ => p.runs.push(run),
                        }
                    }
                }
            }
            b"p" => {
                if let Some(p) = self.para.take() {
                    self.finish_paragraph(p);
                }
            }
            b"tc" => {
                if let Some(cell) = self.cell.take() {
                    self.row.push(cell.trim().to_string());
                }
            }
            b"tr" => {
                let row = std::mem::take(&mut self.row);
                if let Some(t) = self.table.as_mut() {
                    t.push(row);
                }
            }
            b"tbl" => {
                if let Some(rows) = self.table.take() {
                    self.blocks.push(Block::Table(rows));
                }
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(r) = self.run.as_mut() {
            r.text.push_str(text);
        }
    }

    fn finish_paragraph(&mut self, p: Para) {
        let text: String = p.runs.iter().map(|r| r.text.as_str()).collect();
        if let Some(cell) = self.cell.as_mut() {
            if !cell.is_empty() && !text.is_empty() {
                cell.push(' ');
            }
            cell.push_str(&text);
            return;
        }
        let style = p.style.as_deref().unwrap_or("");
        if let Some(level) = heading_level(style) {
            if !text.trim().is_empty() {
                self.blocks.push(Block::Heading { level, runs: p.runs });
            }
            return;
        }
        let lower = style.to_ascii_lowercase();
        if lower.contains("code") || lower == "sourcecode" {
            match self.blocks.last_mut() {
                Some(Block::CodeBlock(code)) => {
                    code.push_str(&text);
                    code.push('\n');
                }
                _ => self.blocks.push(Block::CodeBlock(format!("{text}\n"))),
            }
            return;
        }
        if text.trim().is_empty() {
            return;
        }
        if let Some(depth) = p.list_depth {
            self.blocks.push(Block::ListItem {
                ordered: false,
                depth,
                runs: p.runs,
            });
        } else if lower.contains("quote") {
            self.blocks.push(Block::Quote(p.runs));
        } else {
            self.blocks.push(Block::Paragraph(p.runs));
        }
    }
}

/// Parse `word/document.xml` content into blocks.
pub fn parse_document_xml(xml: &str) -> Result<Vec<Block>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut state = DocReader::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => state.open(&e, false),
            Event::Empty(e) => {
                state.open(&e, true);
                let name = e.local_name();
                if matches!(name.as_ref(), b"p" | b"r") {
                    state.close(name.as_ref());
                }
            }
            Event::End(e) => state.close(e.local_name().as_ref()),
            Event::Text(t) if state.in_text => {
                let text = t.unescape()?;
                state.push_text(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(state.blocks)
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error(transparent)]
    Io(std::io::Error),

    #[error("{0}")]
    NotDocx(String),
}

/// Read the body of a DOCX file as blocks.
pub fn read(source: &Path) -> Result<Vec<Block>, ReadError> {
    let xml = read_part(source, "word/document.xml")
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => ReadError::Io(e),
            _ => ReadError::NotDocx(format!("not a zip package: {e}")),
        })?
        .ok_or_else(|| ReadError::NotDocx("package has no word/document.xml".into()))?;
    parse_document_xml(&xml).map_err(|e| ReadError::NotDocx(format!("bad document.xml: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::blocks;
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<Block> {
        vec![
            Block::Heading {
                level: 1,
                runs: vec![Run::plain("Report")],
            },
            Block::Paragraph(vec![
                Run::plain("Plain "),
                Run {
                    text: "bold".into(),
                    bold: true,
                    ..Run::default()
                },
                Run::plain(" & more"),
            ]),
            Block::ListItem {
                ordered: false,
                depth: 0,
                runs: vec![Run::plain("first")],
            },
            Block::Table(vec![
                vec!["a".into(), "b".into()],
                vec!["1".into(), "2".into()],
            ]),
        ]
    }

    #[test]
    fn document_xml_round_trips_through_reader() {
        let xml = document_xml(&sample(), true);
        let parsed = parse_document_xml(&xml).unwrap();
        assert_eq!(
            blocks::to_markdown(&parsed),
            "# Report\n\nPlain **bold** & more\n\n- first\n\n| a | b |\n| --- | --- |\n| 1 | 2 |\n"
        );
    }

    #[test]
    fn unstyled_output_has_no_heading_style() {
        let xml = document_xml(&sample(), false);
        assert!(!xml.contains("Heading1"));
        assert!(!xml.contains("<w:b/>"));
    }

    #[test]
    fn write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.docx");
        write(&path, &sample(), true, None).unwrap();
        let blocks = read(&path).unwrap();
        assert_eq!(blocks.len(), 4);
        assert_eq!(template_styles(&path).unwrap(), Some(default_styles()));
    }

    #[test]
    fn non_zip_is_reported_as_not_docx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.docx");
        std::fs::write(&path, "just text").unwrap();
        assert!(matches!(read(&path), Err(ReadError::NotDocx(_))));
    }

    #[test]
    fn heading_styles() {
        assert_eq!(heading_level("Heading2"), Some(2));
        assert_eq!(heading_level("heading 3"), Some(3));
        assert_eq!(heading_level("Title"), Some(1));
        assert_eq!(heading_level("Normal"), None);
    }

    #[test]
    fn explicit_bold_off_is_respected() {
        let xml = format!(
            r#"<w:document xmlns:w="{W_NS}"><w:body><w:p><w:r><w:rPr><w:b w:val="0"/></w:rPr><w:t>x</w:t></w:r></w:p></w:body></w:document>"#
        );
        let blocks = parse_document_xml(&xml).unwrap();
        assert_eq!(blocks, vec![Block::Paragraph(vec![Run::plain("x")])]);
    }

    #[test]
    fn control_characters_do_not_reach_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctl.docx");
        let blocks = vec![Block::Paragraph(vec![Run::plain("page\u{b}break\u{7}")])];
        write(&path, &blocks, true, None).unwrap();

        let xml = read_part(&path, "word/document.xml").unwrap().unwrap();
        assert!(!xml.contains('\u{b}'));
        assert!(!xml.contains('\u{7}'));
        assert_eq!(read(&path).unwrap(), vec![Block::Paragraph(vec![Run::plain("pagebreak")])]);
    }
}
