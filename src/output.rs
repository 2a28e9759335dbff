//! Result types for single and batch conversions.

use crate::error::ConvertError;
use crate::format::Format;
use crate::route::RouteKind;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// What a successful conversion left on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    /// A single output file.
    File { path: PathBuf },
    /// A directory holding one file per page (raster output).
    Directory { path: PathBuf, members: Vec<PathBuf> },
}

impl Artifact {
    pub fn path(&self) -> &Path {
        match self {
            Artifact::File { path } | Artifact::Directory { path, .. } => path,
        }
    }

    /// Every file the artifact consists of.
    pub fn files(&self) -> Vec<&Path> {
        match self {
            Artifact::File { path } => vec![path.as_path()],
            Artifact::Directory { members, .. } => members.iter().map(PathBuf::as_path).collect(),
        }
    }
}

/// Result of one successful conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    pub artifact: Artifact,
    /// Always the requested target format.
    pub format: Format,
    /// Which resolver level produced the artifact.
    pub route: RouteKind,
    pub duration_ms: u64,
}

impl ConversionOutput {
    pub fn path(&self) -> &Path {
        self.artifact.path()
    }
}

/// One batch item that converted.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSuccess {
    pub input: PathBuf,
    pub output: ConversionOutput,
}

/// One batch item that failed. The batch carried on without it.
#[derive(Debug)]
pub struct BatchFailure {
    pub input: PathBuf,
    pub error: ConvertError,
}

/// Outcome of a batch: both lists are always present, possibly empty.
#[derive(Debug, Default)]
pub struct BatchOutput {
    pub succeeded: Vec<BatchSuccess>,
    pub failed: Vec<BatchFailure>,
}

impl BatchOutput {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_artifact_lists_members() {
        let a = Artifact::Directory {
            path: PathBuf::from("/out/deck.png"),
            members: vec![
                PathBuf::from("/out/deck.png/deck-1.png"),
                PathBuf::from("/out/deck.png/deck-2.png"),
            ],
        };
        assert_eq!(a.path(), Path::new("/out/deck.png"));
        assert_eq!(a.files().len(), 2);
    }

    #[test]
    fn artifact_serialises_with_tag() {
        let a = Artifact::File {
            path: PathBuf::from("/out/a.md"),
        };
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["path"], "/out/a.md");
    }

    #[test]
    fn empty_batch_is_complete() {
        let b = BatchOutput::default();
        assert_eq!(b.total(), 0);
        assert!(b.is_complete_success());
    }
}
