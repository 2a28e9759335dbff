//! PDF → HTML through pdf2htmlEX.

use crate::error::ConvertError;
use crate::pipeline::external::{expect_output, ToolCommand};
use crate::pipeline::Step;
use crate::tools::Tool;

/// Zoom factor passed to pdf2htmlEX; keeps small print legible in a browser.
const ZOOM: &str = "1.5";

pub(crate) async fn convert(step: &Step<'_>) -> Result<(), ConvertError> {
    let program = step.tools.program(Tool::PdfToHtml).ok_or_else(|| {
        ConvertError::CapabilityUnavailable {
            from: step.from,
            to: step.to,
            missing: vec![Tool::PdfToHtml],
        }
    })?;

    let dest_dir = step
        .output
        .parent()
        .ok_or_else(|| ConvertError::Internal("staged output has no parent".into()))?;
    let file_name = step
        .output
        .file_name()
        .ok_or_else(|| ConvertError::Internal("staged output has no file name".into()))?;

    // pdf2htmlEX writes <dest-dir>/<name>; the name argument is relative.
    ToolCommand::new(Tool::PdfToHtml, program)
        .args(["--zoom", ZOOM, "--dest-dir"])
        .arg(dest_dir.as_os_str())
        .arg(step.input.as_os_str())
        .arg(file_name)
        .run(step.config.tool_timeout())
        .await?;

    expect_output(Tool::PdfToHtml, step.output).await
}
