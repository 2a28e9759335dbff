//! Conversion handlers and the plumbing they share.
//!
//! Each submodule implements one kind of step. A resolved
//! [`Route`](crate::route::Route) names one or two [`Handler`]s (or a
//! generic [`Tool`]); [`run_handler`] and [`run_generic`] dispatch them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ handler ──▶ staged output ──▶ persist
//!            │
//!            ├─ native     markdown / html / docx / tabular (spawn_blocking)
//!            ├─ pdfium     text extraction, rasterisation (spawn_blocking)
//!            └─ external   soffice / pandoc / pdf2htmlEX (tokio::process)
//! ```
//!
//! Handlers only ever write to `Step::output`, which always lives inside the
//! staging directory. Moving the result into place is the caller's job.

pub mod blocks;
pub mod docx;
pub mod external;
pub mod html;
pub mod markdown;
pub mod office;
pub mod package;
pub mod pandoc;
pub mod pdf;
pub mod pdf2html;
pub mod postprocess;
pub mod staging;
pub mod tabular;
pub mod xlsx;

use crate::config::EngineConfig;
use crate::error::ConvertError;
use crate::format::{Domain, Format};
use crate::options::ConversionOptions;
use crate::route::Handler;
use crate::tools::{Tool, ToolAvailability};
use blocks::Block;
use staging::Staging;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Everything a handler needs for one hop.
pub(crate) struct Step<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub from: Format,
    pub to: Format,
    pub domain: Domain,
    pub options: &'a ConversionOptions,
    pub config: &'a EngineConfig,
    pub tools: &'a ToolAvailability,
    pub staging: &'a Staging,
}

impl Step<'_> {
    /// Private working directory inside the staging area.
    pub fn scratch(&self, prefix: &str) -> Result<TempDir, ConvertError> {
        self.staging.scratch(prefix, None)
    }

    fn pdfium_library(&self) -> Option<PathBuf> {
        self.tools
            .program(Tool::Pdfium)
            .map(Path::to_path_buf)
            .or_else(|| self.config.pdfium_library.clone())
    }

    /// Title for standalone HTML: the first heading, else the input stem.
    fn title(&self, blocks: &[Block]) -> String {
        markdown::first_heading(blocks).unwrap_or_else(|| {
            self.input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }

    fn stylesheet(&self) -> Option<String> {
        self.options
            .document
            .style_template
            .as_deref()
            .filter(|p| has_extension(p, "css"))
            .map(|p| p.to_string_lossy().into_owned())
    }

    fn docx_template(&self) -> Option<&Path> {
        self.options
            .document
            .style_template
            .as_deref()
            .filter(|p| has_extension(p, "docx"))
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

pub(crate) fn read_error(path: &Path, e: std::io::Error) -> ConvertError {
    match e.kind() {
        std::io::ErrorKind::NotFound => ConvertError::InputNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => ConvertError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ConvertError::Internal(format!("reading '{}': {e}", path.display())),
    }
}

/// Read a text input. A UTF-8 BOM is dropped; anything that is not UTF-8
/// is malformed.
async fn read_text(path: &Path, format: Format) -> Result<String, ConvertError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| read_error(path, e))?;
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes);
    String::from_utf8(body.to_vec())
        .map_err(|e| ConvertError::malformed(path, format, format!("not UTF-8 text: {e}")))
}

async fn read_html(path: &Path) -> Result<String, ConvertError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| read_error(path, e))?;
    Ok(html::decode(&bytes))
}

async fn write_text(path: &Path, text: String) -> Result<(), ConvertError> {
    tokio::fs::write(path, text)
        .await
        .map_err(|e| ConvertError::write(path, e))
}

/// Run CPU-bound work off the async executor.
async fn blocking<T, F>(label: &'static str, f: F) -> Result<T, ConvertError>
where
    F: FnOnce() -> Result<T, ConvertError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ConvertError::Internal(format!("{label} task panicked: {e}")))?
}

async fn write_docx(step: &Step<'_>, blocks: Vec<Block>) -> Result<(), ConvertError> {
    let styled = step.options.document.preserve_formatting;
    let template = step.docx_template().map(Path::to_path_buf);
    let output = step.output.to_path_buf();
    blocking("DOCX writer", move || {
        let styles = match template {
            Some(t) if styled => {
                let styles = docx::template_styles(&t).map_err(|e| {
                    ConvertError::InvalidConfig(format!(
                        "Style template '{}' is not a usable DOCX: {e}",
                        t.display()
                    ))
                })?;
                if styles.is_none() {
                    debug!("Template {} has no styles part, using built-in styles", t.display());
                }
                styles
            }
            _ => None,
        };
        docx::write(&output, &blocks, styled, styles).map_err(|e| ConvertError::write(&output, e))
    })
    .await
}

async fn read_docx(step: &Step<'_>) -> Result<Vec<Block>, ConvertError> {
    let input = step.input.to_path_buf();
    blocking("DOCX reader", move || {
        docx::read(&input).map_err(|e| match e {
            docx::ReadError::Io(io) => read_error(&input, io),
            docx::ReadError::NotDocx(detail) => ConvertError::malformed(&input, Format::Docx, detail),
        })
    })
    .await
}

async fn markdown_to_html(step: &Step<'_>) -> Result<(), ConvertError> {
    let md = read_text(step.input, step.from).await?;
    let fragment = markdown::to_html_fragment(&md);
    let html = if step.options.document.preserve_formatting {
        let title = step.title(&markdown::parse_blocks(&md));
        markdown::standalone_html(&title, &fragment, step.stylesheet().as_deref())
    } else {
        fragment
    };
    write_text(step.output, html).await
}

async fn pdf_text(step: &Step<'_>) -> Result<(), ConvertError> {
    let pages = pdf::extract_pages(step.input, step.to, step.pdfium_library().as_deref()).await?;
    let raw = pages.join("\n\n");
    match step.to {
        Format::Txt => write_text(step.output, postprocess::clean_text(&raw, true)).await,
        Format::Markdown => {
            let text = postprocess::clean_text(&raw, true);
            let md = blocks::to_markdown(&blocks::from_text(&text));
            write_text(step.output, postprocess::clean_markdown(&md, false)).await
        }
        Format::Docx => {
            let text = postprocess::clean_text(&raw, true);
            write_docx(step, blocks::from_text(&text)).await
        }
        other => Err(ConvertError::Internal(format!(
            "pdf text extraction cannot produce {other}"
        ))),
    }
}

async fn rasterize(step: &Step<'_>) -> Result<(), ConvertError> {
    tokio::fs::create_dir_all(step.output)
        .await
        .map_err(|e| ConvertError::write(step.output, e))?;
    let stem = step
        .output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());
    let settings = pdf::RasterSettings {
        format: step.to,
        dpi: step.config.raster_dpi,
        max_pixels: step.config.max_rendered_pixels,
        jpeg_quality: step.options.presentation.image_quality,
        library: step.pdfium_library(),
    };
    let members = pdf::rasterize(step.input, step.output, &stem, settings).await?;
    debug!("Rendered {} page image(s)", members.len());
    Ok(())
}

/// Run one handler for `step`.
pub(crate) async fn run_handler(handler: Handler, step: &Step<'_>) -> Result<(), ConvertError> {
    debug!(
        "Handler {}: {} → {}",
        handler,
        step.input.display(),
        step.output.display()
    );
    match handler {
        Handler::Passthrough => tokio::fs::copy(step.input, step.output)
            .await
            .map(|_| ())
            .map_err(|e| ConvertError::write(step.output, e)),
        Handler::MarkdownToHtml => markdown_to_html(step).await,
        Handler::MarkdownToDocx => {
            let md = read_text(step.input, step.from).await?;
            write_docx(step, markdown::parse_blocks(&md)).await
        }
        Handler::MarkdownToText => {
            let md = read_text(step.input, step.from).await?;
            write_text(step.output, blocks::to_text(&markdown::parse_blocks(&md))).await
        }
        Handler::DocxToMarkdown => {
            let blocks = read_docx(step).await?;
            write_text(step.output, blocks::to_markdown(&blocks)).await
        }
        Handler::DocxToText => {
            let blocks = read_docx(step).await?;
            write_text(step.output, blocks::to_text(&blocks)).await
        }
        Handler::HtmlToMarkdown => {
            let source = read_html(step.input).await?;
            write_text(step.output, html::to_markdown(&source)).await
        }
        Handler::HtmlToText => {
            let source = read_html(step.input).await?;
            write_text(step.output, html::to_text(&source)).await
        }
        Handler::TextToMarkdown => {
            let text = read_text(step.input, step.from).await?;
            write_text(step.output, blocks::to_markdown(&blocks::from_text(&text))).await
        }
        Handler::TextToHtml => {
            let text = read_text(step.input, step.from).await?;
            let title = step.title(&[]);
            let standalone = step.options.document.preserve_formatting;
            write_text(step.output, html::from_text(&text, &title, standalone)).await
        }
        Handler::PdfText => pdf_text(step).await,
        Handler::OfficeExport => office::export(step).await,
        Handler::PdfToHtml => pdf2html::convert(step).await,
        Handler::Rasterize => rasterize(step).await,
        Handler::Tabular => {
            let (input, output) = (step.input.to_path_buf(), step.output.to_path_buf());
            let (from, to) = (step.from, step.to);
            let options = step.options.spreadsheet.clone();
            blocking("Spreadsheet", move || {
                tabular::convert(&input, from, &output, to, &options)
            })
            .await
        }
    }
}

/// Hand the whole conversion to the domain's general-purpose tool.
pub(crate) async fn run_generic(tool: Tool, step: &Step<'_>) -> Result<(), ConvertError> {
    debug!("Generic {}: {} → {}", tool, step.from, step.to);
    match tool {
        Tool::Pandoc => pandoc::convert(step).await,
        Tool::OfficeSuite => office::export(step).await,
        other => Err(ConvertError::Internal(format!(
            "{other} is not a generic converter"
        ))),
    }
}
