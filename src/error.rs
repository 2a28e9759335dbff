//! Error types for the docshift library.
//!
//! Two distinct shapes reflect two distinct failure modes:
//!
//! * [`ConvertError`]: **Fatal for one conversion**: the request cannot be
//!   satisfied (missing input, unsupported pair, external tool crashed).
//!   Returned as `Err(ConvertError)` from [`crate::Converter::convert`].
//!
//! * [`crate::output::BatchFailure`]: **Non-fatal for a batch**: one item
//!   failed but the rest of the batch carries on. The error is stored next to
//!   its input path instead of being propagated.
//!
//! Every error maps onto one [`ErrorKind`] and one [`Stage`], so callers can
//! tell "the tool is missing" apart from "the file is garbage" without string
//! matching.

use crate::format::{Domain, Format};
use crate::tools::Tool;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by a single conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The format token is not one docshift knows about at all.
    #[error("Unknown format '{token}'")]
    UnknownFormat { token: String },

    /// The format is known but absent from this converter's capability table.
    #[error("The {domain} converter does not accept '{format}' as {direction}")]
    UnsupportedFormat {
        format: String,
        domain: Domain,
        direction: Direction,
    },

    /// Content could not be parsed in its declared format.
    #[error("'{path}' is not valid {format}: {detail}")]
    MalformedInput {
        path: PathBuf,
        format: Format,
        detail: String,
    },

    // ── Routing errors ────────────────────────────────────────────────────
    /// No direct handler, chain, or generic tool can satisfy the pair.
    #[error("No conversion path from {from} to {to}{}", describe_missing(.missing))]
    CapabilityUnavailable {
        from: Format,
        to: Format,
        missing: Vec<Tool>,
    },

    // ── External tool errors ──────────────────────────────────────────────
    /// The tool ran and exited non-zero.
    #[error("{tool} failed with exit code {code}: {stderr}")]
    ToolFailed { tool: Tool, code: i32, stderr: String },

    /// The tool did not finish in time and was killed.
    #[error("{tool} timed out after {secs}s")]
    ToolTimeout { tool: Tool, secs: u64 },

    /// The tool could not be started.
    #[error("Failed to start {tool}: {source}")]
    ToolSpawn {
        tool: Tool,
        #[source]
        source: std::io::Error,
    },

    /// The tool exited successfully but did not produce the expected file.
    #[error("{tool} reported success but '{expected}' was not produced")]
    ToolOutputMissing { tool: Tool, expected: PathBuf },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output artifact.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or factory validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Whether a format was rejected as an input or as a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

/// The coarse category of a [`ConvertError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InputNotFound,
    UnsupportedFormat,
    CapabilityUnavailable,
    ExternalToolFailure,
    MalformedInput,
    Output,
    Config,
    Internal,
}

/// The pipeline stage an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Read,
    Transform,
    ExternalTool,
    Write,
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::InputNotFound { .. } | ConvertError::PermissionDenied { .. } => {
                ErrorKind::InputNotFound
            }
            ConvertError::UnknownFormat { .. } | ConvertError::UnsupportedFormat { .. } => {
                ErrorKind::UnsupportedFormat
            }
            ConvertError::MalformedInput { .. } => ErrorKind::MalformedInput,
            ConvertError::CapabilityUnavailable { .. } => ErrorKind::CapabilityUnavailable,
            ConvertError::ToolFailed { .. }
            | ConvertError::ToolTimeout { .. }
            | ConvertError::ToolSpawn { .. }
            | ConvertError::ToolOutputMissing { .. } => ErrorKind::ExternalToolFailure,
            ConvertError::OutputWriteFailed { .. } => ErrorKind::Output,
            ConvertError::InvalidConfig(_) => ErrorKind::Config,
            ConvertError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn stage(&self) -> Stage {
        match self.kind() {
            ErrorKind::InputNotFound
            | ErrorKind::UnsupportedFormat
            | ErrorKind::MalformedInput
            | ErrorKind::Config => Stage::Read,
            ErrorKind::CapabilityUnavailable | ErrorKind::Internal => Stage::Transform,
            ErrorKind::ExternalToolFailure => Stage::ExternalTool,
            ErrorKind::Output => Stage::Write,
        }
    }

    /// Shorthand used by handlers that write into the staging area.
    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::OutputWriteFailed {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, format: Format, detail: impl fmt::Display) -> Self {
        ConvertError::MalformedInput {
            path: path.into(),
            format,
            detail: detail.to_string(),
        }
    }
}

fn describe_missing(missing: &[Tool]) -> String {
    if missing.is_empty() {
        return String::new();
    }
    let names: Vec<&str> = missing.iter().map(|t| t.name()).collect();
    format!(
        "\nMissing external tool(s): {}. Install them or run `docshift doctor`.",
        names.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_unavailable_names_missing_tool() {
        let e = ConvertError::CapabilityUnavailable {
            from: Format::Markdown,
            to: Format::Rtf,
            missing: vec![Tool::Pandoc],
        };
        let msg = e.to_string();
        assert!(msg.contains("md to rtf"), "got: {msg}");
        assert!(msg.contains("pandoc"), "got: {msg}");
        assert_eq!(e.kind(), ErrorKind::CapabilityUnavailable);
    }

    #[test]
    fn capability_unavailable_without_tools_has_no_hint() {
        let e = ConvertError::CapabilityUnavailable {
            from: Format::Pdf,
            to: Format::Pptx,
            missing: vec![],
        };
        assert!(!e.to_string().contains("Missing external tool"));
    }

    #[test]
    fn timeout_is_external_tool_failure() {
        let e = ConvertError::ToolTimeout {
            tool: Tool::OfficeSuite,
            secs: 30,
        };
        assert_eq!(e.kind(), ErrorKind::ExternalToolFailure);
        assert_eq!(e.stage(), Stage::ExternalTool);
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn missing_input_and_malformed_input_are_distinct() {
        let missing = ConvertError::InputNotFound {
            path: PathBuf::from("/nope.csv"),
        };
        let bad = ConvertError::malformed("/bad.json", Format::Json, "expected array");
        assert_eq!(missing.kind(), ErrorKind::InputNotFound);
        assert_eq!(bad.kind(), ErrorKind::MalformedInput);
        assert_eq!(bad.stage(), Stage::Read);
    }

    #[test]
    fn unsupported_format_display() {
        let e = ConvertError::UnsupportedFormat {
            format: "png".into(),
            domain: Domain::Spreadsheet,
            direction: Direction::Output,
        };
        assert_eq!(
            e.to_string(),
            "The spreadsheet converter does not accept 'png' as output"
        );
    }
}
