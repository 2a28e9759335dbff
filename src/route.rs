//! Route resolution: how a `(from, to)` pair is satisfied.
//!
//! Resolution follows a strict priority and stops at the first usable
//! option:
//!
//! 1. a **direct** handler for the exact pair,
//! 2. a two-hop **chain** through an intermediate format,
//! 3. the domain's **generic** tool (pandoc for documents and slides, the
//!    office suite for spreadsheets),
//! 4. otherwise [`ConvertError::CapabilityUnavailable`] naming every tool
//!    that would have opened a path.
//!
//! An option is usable only when every tool it needs is present. For chains
//! both hops are checked before the first one runs, so a chain never fails
//! halfway because its second tool is missing.

use crate::error::ConvertError;
use crate::format::{Domain, Format};
use crate::tools::{Tool, ToolAvailability, ToolLocation};
use serde::Serialize;
use std::fmt;

/// The closed set of conversion steps docshift knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Handler {
    /// Same format in and out: copy the bytes.
    Passthrough,
    MarkdownToHtml,
    MarkdownToDocx,
    MarkdownToText,
    DocxToMarkdown,
    DocxToText,
    HtmlToMarkdown,
    HtmlToText,
    TextToMarkdown,
    TextToHtml,
    /// Extract the text layer of a PDF (to txt, md or docx).
    PdfText,
    /// `soffice --headless --convert-to`.
    OfficeExport,
    /// pdf2htmlEX.
    PdfToHtml,
    /// Render every PDF page to an image.
    Rasterize,
    /// Read into the native table model and write any tabular format.
    Tabular,
}

impl Handler {
    pub fn name(self) -> &'static str {
        match self {
            Handler::Passthrough => "passthrough",
            Handler::MarkdownToHtml => "markdown_to_html",
            Handler::MarkdownToDocx => "markdown_to_docx",
            Handler::MarkdownToText => "markdown_to_text",
            Handler::DocxToMarkdown => "docx_to_markdown",
            Handler::DocxToText => "docx_to_text",
            Handler::HtmlToMarkdown => "html_to_markdown",
            Handler::HtmlToText => "html_to_text",
            Handler::TextToMarkdown => "text_to_markdown",
            Handler::TextToHtml => "text_to_html",
            Handler::PdfText => "pdf_text",
            Handler::OfficeExport => "office_export",
            Handler::PdfToHtml => "pdf_to_html",
            Handler::Rasterize => "rasterize",
            Handler::Tabular => "tabular",
        }
    }

    pub fn required_tools(self) -> &'static [Tool] {
        match self {
            Handler::PdfText | Handler::Rasterize => &[Tool::Pdfium],
            Handler::OfficeExport => &[Tool::OfficeSuite],
            Handler::PdfToHtml => &[Tool::PdfToHtml],
            _ => &[],
        }
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved plan for one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Direct(Handler),
    Chain {
        first: Handler,
        intermediate: Format,
        second: Handler,
    },
    Generic(Tool),
}

/// Which priority level produced a [`Route`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    Direct,
    Chain,
    Generic,
}

impl Route {
    pub fn kind(&self) -> RouteKind {
        match self {
            Route::Direct(_) => RouteKind::Direct,
            Route::Chain { .. } => RouteKind::Chain,
            Route::Generic(_) => RouteKind::Generic,
        }
    }

    /// Every tool the whole route needs, both hops included.
    pub fn required_tools(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = match self {
            Route::Direct(h) => h.required_tools().to_vec(),
            Route::Chain { first, second, .. } => first
                .required_tools()
                .iter()
                .chain(second.required_tools())
                .copied()
                .collect(),
            Route::Generic(t) => vec![*t],
        };
        tools.sort();
        tools.dedup();
        tools
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Direct(h) => write!(f, "direct({h})"),
            Route::Chain {
                first,
                intermediate,
                second,
            } => write!(f, "chain({first} → {intermediate} → {second})"),
            Route::Generic(t) => write!(f, "generic({t})"),
        }
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RouteKind::Direct => "direct",
            RouteKind::Chain => "chain",
            RouteKind::Generic => "generic",
        })
    }
}

// ── Routing tables ───────────────────────────────────────────────────────

/// The direct handler registered for an exact pair.
pub fn direct(domain: Domain, from: Format, to: Format) -> Option<Handler> {
    use Format::*;
    match domain {
        Domain::Document => match (from, to) {
            (a, b) if a == b => Some(Handler::Passthrough),
            (Markdown, Html) => Some(Handler::MarkdownToHtml),
            (Markdown, Docx) => Some(Handler::MarkdownToDocx),
            (Markdown, Txt) => Some(Handler::MarkdownToText),
            (Docx, Markdown) => Some(Handler::DocxToMarkdown),
            (Docx, Txt) => Some(Handler::DocxToText),
            (Html, Markdown) => Some(Handler::HtmlToMarkdown),
            (Html, Txt) => Some(Handler::HtmlToText),
            (Txt, Markdown) => Some(Handler::TextToMarkdown),
            (Txt, Html) => Some(Handler::TextToHtml),
            (Pdf, Txt | Markdown | Docx) => Some(Handler::PdfText),
            (Doc | Docx | Odt | Rtf, Pdf) => Some(Handler::OfficeExport),
            (Doc, Docx | Odt | Rtf | Html | Txt) => Some(Handler::OfficeExport),
            _ => None,
        },
        Domain::Presentation => match (from, to) {
            (a, b) if a == b => Some(Handler::Passthrough),
            (Ppt | Pptx, Pdf | Html) => Some(Handler::OfficeExport),
            (Ppt, Pptx) | (Pptx, Ppt) => Some(Handler::OfficeExport),
            (Pdf, Png | Jpeg) => Some(Handler::Rasterize),
            (Pdf, Html) => Some(Handler::PdfToHtml),
            _ => None,
        },
        Domain::Spreadsheet => match (from, to) {
            // Delimited text is re-read so delimiter and encoding options apply.
            (a, b) if a == b && matches!(a, Xlsx | Xls | Ods) => Some(Handler::Passthrough),
            (_, Csv | Tsv | Json | Xlsx | Html | Markdown) => Some(Handler::Tabular),
            _ => None,
        },
    }
}

/// The registered two-hop chain for a pair: `(first, intermediate, second)`.
pub fn chain(domain: Domain, from: Format, to: Format) -> Option<(Handler, Format, Handler)> {
    use Format::*;
    match domain {
        Domain::Document => match (from, to) {
            (Doc, Markdown) => Some((Handler::OfficeExport, Docx, Handler::DocxToMarkdown)),
            (Markdown, Pdf) => Some((Handler::MarkdownToDocx, Docx, Handler::OfficeExport)),
            (Txt, Docx) => Some((Handler::TextToMarkdown, Markdown, Handler::MarkdownToDocx)),
            (Pdf, Html) => Some((Handler::PdfText, Markdown, Handler::MarkdownToHtml)),
            _ => None,
        },
        Domain::Presentation => match (from, to) {
            (Ppt | Pptx, Png | Jpeg) => Some((Handler::OfficeExport, Pdf, Handler::Rasterize)),
            _ => None,
        },
        Domain::Spreadsheet => match to {
            Xls | Ods => Some((Handler::Tabular, Xlsx, Handler::OfficeExport)),
            _ => None,
        },
    }
}

const PANDOC_DOCUMENT_READERS: &[Format] = &[
    Format::Markdown,
    Format::Docx,
    Format::Html,
    Format::Odt,
    Format::Rtf,
    Format::Txt,
];
const PANDOC_DOCUMENT_WRITERS: &[Format] = &[
    Format::Markdown,
    Format::Docx,
    Format::Pdf,
    Format::Txt,
    Format::Html,
    Format::Odt,
    Format::Rtf,
];
const PANDOC_SLIDE_READERS: &[Format] = &[Format::Html];
const PANDOC_SLIDE_WRITERS: &[Format] = &[Format::Pptx, Format::Pdf, Format::Html];
const OFFICE_SHEET_READERS: &[Format] = &[Format::Csv, Format::Xlsx, Format::Xls, Format::Ods];
const OFFICE_SHEET_WRITERS: &[Format] = &[
    Format::Csv,
    Format::Xlsx,
    Format::Xls,
    Format::Ods,
    Format::Html,
];

/// The domain's general-purpose tool, when it can read `from` and write `to`.
pub fn generic(domain: Domain, from: Format, to: Format) -> Option<Tool> {
    let (tool, readers, writers) = match domain {
        Domain::Document => (Tool::Pandoc, PANDOC_DOCUMENT_READERS, PANDOC_DOCUMENT_WRITERS),
        Domain::Presentation => (Tool::Pandoc, PANDOC_SLIDE_READERS, PANDOC_SLIDE_WRITERS),
        Domain::Spreadsheet => (Tool::OfficeSuite, OFFICE_SHEET_READERS, OFFICE_SHEET_WRITERS),
    };
    (readers.contains(&from) && writers.contains(&to)).then_some(tool)
}

fn usable(tools: &[Tool], availability: &ToolAvailability) -> bool {
    tools.iter().all(|t| availability.is_available(*t))
}

fn absent(tools: &[Tool], availability: &ToolAvailability) -> Vec<Tool> {
    tools
        .iter()
        .copied()
        .filter(|t| !availability.is_available(*t))
        .collect()
}

/// Pick the highest-priority usable route for `from → to`.
///
/// Both formats must already be validated against the domain's capability
/// table; this function only decides *how*.
pub fn resolve(
    domain: Domain,
    from: Format,
    to: Format,
    availability: &ToolAvailability,
) -> Result<Route, ConvertError> {
    let mut missing: Vec<Tool> = Vec::new();

    if let Some(handler) = direct(domain, from, to) {
        if usable(handler.required_tools(), availability) {
            return Ok(Route::Direct(handler));
        }
        missing.extend(absent(handler.required_tools(), availability));
    }

    if let Some((first, intermediate, second)) = chain(domain, from, to) {
        let route = Route::Chain {
            first,
            intermediate,
            second,
        };
        let needed = route.required_tools();
        if usable(&needed, availability) {
            return Ok(route);
        }
        missing.extend(absent(&needed, availability));
    }

    if let Some(tool) = generic(domain, from, to) {
        if availability.is_available(tool) {
            return Ok(Route::Generic(tool));
        }
        missing.push(tool);
    }

    missing.sort();
    missing.dedup();
    Err(ConvertError::CapabilityUnavailable { from, to, missing })
}

/// Pairs that are unreachable now but would resolve if `tool` were present.
pub(crate) fn pairs_needing(
    tool: Tool,
    availability: &ToolAvailability,
) -> Vec<(Domain, Format, Format)> {
    let location = match tool {
        Tool::Pdfium => ToolLocation::system_library(),
        other => ToolLocation::program(other.name()),
    };
    let with_tool = availability.clone().with(tool, location);

    let mut pairs = Vec::new();
    for domain in Domain::ALL {
        let caps = domain.capabilities();
        for &from in caps.inputs {
            for &to in caps.outputs {
                if resolve(domain, from, to, availability).is_err()
                    && resolve(domain, from, to, &with_tool).is_ok()
                {
                    pairs.push((domain, from, to));
                }
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn all_tools() -> ToolAvailability {
        Tool::ALL.into_iter().fold(ToolAvailability::none(), |a, t| {
            a.with(t, ToolLocation::program(t.name()))
        })
    }

    fn only(tools: &[Tool]) -> ToolAvailability {
        tools.iter().fold(ToolAvailability::none(), |a, t| {
            a.with(*t, ToolLocation::program(t.name()))
        })
    }

    #[test]
    fn direct_wins_over_generic() {
        let route = resolve(Domain::Document, Format::Markdown, Format::Html, &all_tools()).unwrap();
        assert_eq!(route, Route::Direct(Handler::MarkdownToHtml));
    }

    #[test]
    fn generic_used_when_nothing_specific_exists() {
        let route = resolve(Domain::Document, Format::Markdown, Format::Rtf, &all_tools()).unwrap();
        assert_eq!(route, Route::Generic(Tool::Pandoc));
    }

    #[test]
    fn missing_generic_tool_is_named() {
        let err = resolve(
            Domain::Document,
            Format::Markdown,
            Format::Rtf,
            &ToolAvailability::none(),
        )
        .unwrap_err();
        match err {
            ConvertError::CapabilityUnavailable { missing, .. } => {
                assert_eq!(missing, vec![Tool::Pandoc])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn native_pairs_need_no_tools() {
        let none = ToolAvailability::none();
        for (from, to) in [
            (Format::Markdown, Format::Html),
            (Format::Markdown, Format::Docx),
            (Format::Docx, Format::Markdown),
            (Format::Html, Format::Txt),
            (Format::Txt, Format::Docx),
        ] {
            assert!(
                resolve(Domain::Document, from, to, &none).is_ok(),
                "{from}→{to}"
            );
        }
        assert!(resolve(Domain::Spreadsheet, Format::Xlsx, Format::Json, &none).is_ok());
    }

    #[test]
    fn txt_to_docx_is_a_native_chain() {
        let route = resolve(
            Domain::Document,
            Format::Txt,
            Format::Docx,
            &ToolAvailability::none(),
        )
        .unwrap();
        assert_eq!(route.kind(), RouteKind::Chain);
        assert_eq!(
            route,
            Route::Chain {
                first: Handler::TextToMarkdown,
                intermediate: Format::Markdown,
                second: Handler::MarkdownToDocx,
            }
        );
    }

    #[test]
    fn chain_is_rejected_up_front_when_second_hop_tool_missing() {
        // Tabular needs nothing, but the xlsx→xls hop needs the office suite.
        let err = resolve(
            Domain::Spreadsheet,
            Format::Csv,
            Format::Xls,
            &ToolAvailability::none(),
        )
        .unwrap_err();
        match err {
            ConvertError::CapabilityUnavailable { missing, .. } => {
                assert_eq!(missing, vec![Tool::OfficeSuite])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn slides_to_images_chain_needs_both_tools() {
        let err = resolve(
            Domain::Presentation,
            Format::Pptx,
            Format::Png,
            &only(&[Tool::OfficeSuite]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConvertError::CapabilityUnavailable { ref missing, .. } if missing == &vec![Tool::Pdfium]
        ));

        let route = resolve(
            Domain::Presentation,
            Format::Pptx,
            Format::Png,
            &only(&[Tool::OfficeSuite, Tool::Pdfium]),
        )
        .unwrap();
        assert_eq!(route.required_tools(), vec![Tool::OfficeSuite, Tool::Pdfium]);
    }

    #[test]
    fn pdf_to_html_names_pdf2htmlex() {
        let err = resolve(
            Domain::Presentation,
            Format::Pdf,
            Format::Html,
            &only(&[Tool::Pandoc]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConvertError::CapabilityUnavailable { ref missing, .. } if missing == &vec![Tool::PdfToHtml]
        ));
    }

    #[test]
    fn impossible_pair_has_empty_missing_list() {
        let err = resolve(Domain::Presentation, Format::Pdf, Format::Pptx, &all_tools()).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::CapabilityUnavailable { ref missing, .. } if missing.is_empty()
        ));
    }

    #[test]
    fn same_format_is_passthrough() {
        let route = resolve(
            Domain::Presentation,
            Format::Pptx,
            Format::Pptx,
            &ToolAvailability::none(),
        )
        .unwrap();
        assert_eq!(route, Route::Direct(Handler::Passthrough));
    }

    #[test]
    fn same_workbook_format_is_copied() {
        let none = ToolAvailability::none();
        for format in [Format::Xlsx, Format::Xls, Format::Ods] {
            let route = resolve(Domain::Spreadsheet, format, format, &none).unwrap();
            assert_eq!(route, Route::Direct(Handler::Passthrough), "{format}");
        }
        let route = resolve(Domain::Spreadsheet, Format::Csv, Format::Csv, &none).unwrap();
        assert_eq!(route, Route::Direct(Handler::Tabular));
        let route = resolve(Domain::Spreadsheet, Format::Xls, Format::Xlsx, &none).unwrap();
        assert_eq!(route, Route::Direct(Handler::Tabular));
    }

    #[test]
    fn pairs_needing_office_include_slide_export() {
        let pairs = pairs_needing(Tool::OfficeSuite, &ToolAvailability::none());
        assert!(pairs.contains(&(Domain::Presentation, Format::Ppt, Format::Pdf)));
        assert!(pairs.contains(&(Domain::Spreadsheet, Format::Csv, Format::Ods)));
        assert!(!pairs.contains(&(Domain::Document, Format::Markdown, Format::Html)));
    }

    #[test]
    fn route_display() {
        let r = Route::Chain {
            first: Handler::OfficeExport,
            intermediate: Format::Pdf,
            second: Handler::Rasterize,
        };
        assert_eq!(r.to_string(), "chain(office_export → pdf → rasterize)");
        assert_eq!(Route::Generic(Tool::Pandoc).to_string(), "generic(pandoc)");
    }
}
