//! Generic fallback through pandoc.

use crate::error::ConvertError;
use crate::format::{Domain, Format};
use crate::pipeline::external::{expect_output, ToolCommand};
use crate::pipeline::Step;
use crate::tools::Tool;
use std::ffi::OsString;
use std::path::Path;

/// Pandoc reader name. Plain text has no reader of its own and is read as
/// Markdown, which accepts any text.
fn reader(from: Format) -> Option<&'static str> {
    match from {
        Format::Markdown | Format::Txt => Some("markdown"),
        Format::Docx => Some("docx"),
        Format::Html => Some("html"),
        Format::Odt => Some("odt"),
        Format::Rtf => Some("rtf"),
        _ => None,
    }
}

/// Pandoc writer name. `None` for PDF, which pandoc selects from the
/// output file extension.
fn writer(to: Format) -> Option<&'static str> {
    match to {
        Format::Markdown => Some("markdown"),
        Format::Txt => Some("plain"),
        Format::Docx => Some("docx"),
        Format::Html => Some("html"),
        Format::Odt => Some("odt"),
        Format::Rtf => Some("rtf"),
        Format::Pptx => Some("pptx"),
        _ => None,
    }
}

fn is_ext(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Formatting flags for the requested target.
fn formatting_args(to: Format, preserve: bool, template: Option<&Path>) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    if preserve {
        match to {
            Format::Markdown => {
                args.push("--wrap=none".into());
                args.push("--markdown-headings=atx".into());
            }
            Format::Html | Format::Rtf | Format::Pptx => args.push("--standalone".into()),
            _ => {}
        }
    }
    if let Some(t) = template {
        if is_ext(t, "docx") && matches!(to, Format::Docx | Format::Odt) {
            let mut a = OsString::from("--reference-doc=");
            a.push(t.as_os_str());
            args.push(a);
        } else if is_ext(t, "pptx") && to == Format::Pptx {
            let mut a = OsString::from("--reference-doc=");
            a.push(t.as_os_str());
            args.push(a);
        } else if is_ext(t, "css") && to == Format::Html {
            let mut a = OsString::from("--css=");
            a.push(t.as_os_str());
            args.push(a);
        }
    }
    args
}

pub(crate) async fn convert(step: &Step<'_>) -> Result<(), ConvertError> {
    let program = step
        .tools
        .program(Tool::Pandoc)
        .ok_or_else(|| ConvertError::CapabilityUnavailable {
            from: step.from,
            to: step.to,
            missing: vec![Tool::Pandoc],
        })?;
    let reader = reader(step.from).ok_or_else(|| ConvertError::CapabilityUnavailable {
        from: step.from,
        to: step.to,
        missing: vec![],
    })?;

    let (preserve, template) = match step.domain {
        Domain::Presentation => (step.options.presentation.preserve_formatting, None),
        _ => (
            step.options.document.preserve_formatting,
            step.options.document.style_template.as_deref(),
        ),
    };

    let mut cmd = ToolCommand::new(Tool::Pandoc, program).args(["-f", reader]);
    if let Some(w) = writer(step.to) {
        cmd = cmd.args(["-t", w]);
    }
    cmd = cmd
        .args(formatting_args(step.to, preserve, template))
        .arg("-o")
        .arg(step.output.as_os_str())
        .arg(step.input.as_os_str());
    cmd.run(step.config.tool_timeout()).await?;

    expect_output(Tool::Pandoc, step.output).await
}
