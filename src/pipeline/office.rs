//! Headless office suite exports.
//!
//! `soffice --headless --convert-to <fmt> --outdir <dir> <input>` writes
//! `<dir>/<input stem>.<fmt>`. Each call gets its own user profile inside
//! the staging area; a shared profile is locked by the first running
//! instance and makes concurrent calls fail.

use crate::error::ConvertError;
use crate::format::Format;
use crate::pipeline::external::{expect_output, ToolCommand};
use crate::pipeline::Step;
use crate::tools::Tool;
use std::path::Path;
use tracing::debug;

/// `--convert-to` argument for a target format.
fn filter_for(to: Format, delimiter: Option<u8>) -> String {
    match to {
        Format::Txt => "txt:Text".to_string(),
        Format::Html => "html".to_string(),
        Format::Csv => format!(
            "csv:Text - txt - csv (StarCalc):{},34,76",
            delimiter.unwrap_or(b',')
        ),
        other => other.extension().to_string(),
    }
}

/// `file://` URL for a local directory, as `-env:UserInstallation` expects.
fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/").replace(' ', "%20");
    if raw.starts_with('/') {
        format!("file://{raw}")
    } else {
        format!("file:///{raw}")
    }
}

/// Export `step.input` to `step.to` and move the result to `step.output`.
pub(crate) async fn export(step: &Step<'_>) -> Result<(), ConvertError> {
    let program = step
        .tools
        .program(Tool::OfficeSuite)
        .ok_or_else(|| ConvertError::CapabilityUnavailable {
            from: step.from,
            to: step.to,
            missing: vec![Tool::OfficeSuite],
        })?;

    let work = step.scratch("office-")?;
    let out_dir = work.path().join("out");
    let profile = work.path().join("profile");
    tokio::fs::create_dir_all(&out_dir)
        .await
        .map_err(|e| ConvertError::write(&out_dir, e))?;

    let delimiter = step.options.spreadsheet.delimiter;
    let cmd = ToolCommand::new(Tool::OfficeSuite, program)
        .arg(format!("-env:UserInstallation={}", file_url(&profile)))
        .args(["--headless", "--norestore", "--convert-to"])
        .arg(filter_for(step.to, delimiter))
        .arg("--outdir")
        .arg(out_dir.as_os_str())
        .arg(step.input.as_os_str());
    cmd.run(step.config.tool_timeout()).await?;

    let stem = step
        .input
        .file_stem()
        .ok_or_else(|| ConvertError::Internal(format!("no file stem in '{}'", step.input.display())))?;
    let mut produced = out_dir.join(stem);
    produced.set_extension(step.to.extension());
    expect_output(Tool::OfficeSuite, &produced).await?;

    debug!("Office export produced {}", produced.display());
    tokio::fs::rename(&produced, step.output)
        .await
        .map_err(|e| ConvertError::write(step.output, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters() {
        assert_eq!(filter_for(Format::Pdf, None), "pdf");
        assert_eq!(filter_for(Format::Txt, None), "txt:Text");
        assert_eq!(filter_for(Format::Jpeg, None), "jpg");
        assert_eq!(
            filter_for(Format::Csv, Some(b';')),
            "csv:Text - txt - csv (StarCalc):59,34,76"
        );
    }

    #[test]
    fn profile_url() {
        assert_eq!(
            file_url(Path::new("/tmp/stage dir/profile")),
            "file:///tmp/stage%20dir/profile"
        );
    }
}
