//! Reading HTML: Markdown via html2md, plain text via scraper.

use crate::pipeline::blocks::{self, Block};
use crate::pipeline::markdown::{escape_html, standalone_html};
use crate::pipeline::postprocess;
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html};

/// How far into the file a `<meta>` charset declaration is looked for.
const META_SNIFF_LEN: usize = 1024;

static RE_META_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]*?charset\s*=\s*["']?\s*([a-z0-9_.:-]+)"#).expect("valid regex")
});

const SKIPPED: &[&str] = &["script", "style", "head", "template", "noscript"];
const BLOCK_LEVEL: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "main", "nav", "aside", "h1", "h2",
    "h3", "h4", "h5", "h6", "ul", "ol", "li", "table", "tr", "blockquote", "pre", "hr", "br",
    "figure", "figcaption", "dl", "dt", "dd",
];

/// Decode an HTML file's bytes: byte-order mark first, then a `<meta>`
/// charset declaration, then a statistical guess. Undecodable sequences
/// become U+FFFD.
pub fn decode(bytes: &[u8]) -> String {
    let encoding = Encoding::for_bom(bytes)
        .map(|(encoding, _)| encoding)
        .or_else(|| declared_charset(bytes))
        .unwrap_or_else(|| {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            detector.guess(None, true)
        });
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn declared_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(META_SNIFF_LEN)];
    let label = RE_META_CHARSET.captures(head)?.get(1)?;
    // A document that could declare itself was not UTF-16.
    Encoding::for_label(label.as_bytes()).map(|e| e.output_encoding())
}

pub fn to_markdown(html: &str) -> String {
    postprocess::clean_markdown(&html2md::parse_html(html), false)
}

pub fn to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    visit(document.root_element(), &mut out);
    postprocess::clean_text(&out, false)
}

fn visit(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name().to_ascii_lowercase();
    if SKIPPED.contains(&name.as_str()) {
        return;
    }
    let block = BLOCK_LEVEL.contains(&name.as_str());
    if block {
        ensure_break(out);
    }
    if name == "li" {
        out.push_str("• ");
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let collapsed = collapse_whitespace(text);
                if collapsed.trim().is_empty() {
                    if !out.is_empty() && !out.ends_with([' ', '\n']) {
                        out.push(' ');
                    }
                    continue;
                }
                if out.ends_with('\n') {
                    out.push_str(collapsed.trim_start());
                } else {
                    out.push_str(&collapsed);
                }
            }
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    visit(el, out);
                }
            }
            _ => {}
        }
    }
    if block {
        ensure_break(out);
        if matches!(name.as_str(), "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "table" | "pre" | "blockquote") {
            out.push('\n');
        }
    }
}

fn ensure_break(out: &mut String) {
    let trimmed = out.trim_end_matches(' ').len();
    out.truncate(trimmed);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out
}

/// Plain text → HTML, one `<p>` per paragraph.
pub fn from_text(text: &str, title: &str, standalone: bool) -> String {
    let mut body = String::new();
    for block in blocks::from_text(text) {
        if let Block::Paragraph(runs) = block {
            let escaped: Vec<String> = blocks::plain_text(&runs)
                .lines()
                .map(escape_html)
                .collect();
            body.push_str("<p>");
            body.push_str(&escaped.join("<br>\n"));
            body.push_str("</p>\n");
        }
    }
    if standalone {
        standalone_html(title, &body, None)
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn text_skips_scripts_and_separates_blocks() {
        let html = "<html><head><title>x</title><style>p{}</style></head><body>\
            <h1>Title</h1><p>Hello <b>bold</b>   world</p>\
            <script>var a = 1;</script><ul><li>one</li><li>two</li></ul></body></html>";
        assert_eq!(to_text(html), "Title\n\nHello bold world\n\n• one\n• two\n");
    }

    #[test]
    fn markdown_from_html() {
        let md = to_markdown("<h1>Title</h1><p>Some <strong>bold</strong> text</p>");
        assert!(md.contains("Title"), "got: {md}");
        assert!(md.contains("**bold**"), "got: {md}");
        assert!(md.ends_with('\n'));
    }

    #[test]
    fn declared_legacy_charset_is_honoured() {
        let bytes = b"<html><head><meta charset=\"windows-1252\"></head><body><p>caf\xe9 \x93quoted\x94</p></body></html>";
        let html = decode(bytes);
        assert!(html.contains("caf\u{e9} \u{201c}quoted\u{201d}"), "got: {html}");
        assert_eq!(to_text(&html).trim(), "caf\u{e9} \u{201c}quoted\u{201d}");
    }

    #[test]
    fn http_equiv_charset_is_honoured() {
        let bytes = b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=ISO-8859-1\"><p>na\xefve</p>";
        assert!(decode(bytes).contains("na\u{ef}ve"));
    }

    #[test]
    fn byte_order_mark_beats_declaration() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("<meta charset=\"windows-1252\"><p>é</p>".as_bytes());
        assert!(decode(&bytes).contains("<p>é</p>"));
    }

    #[test]
    fn undeclared_utf8_is_detected() {
        let html = decode("<p>Grüße aus Köln</p>".as_bytes());
        assert_eq!(html, "<p>Grüße aus Köln</p>");
    }

    #[test]
    fn text_to_html_escapes() {
        let html = from_text("a < b\nc\n\nnext", "t", false);
        assert_eq!(html, "<p>a &lt; b<br>\nc</p>\n<p>next</p>\n");
    }
}
