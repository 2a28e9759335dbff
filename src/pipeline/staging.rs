//! Staging area and atomic persist.
//!
//! Handlers never write to the final location. They write into a hidden
//! directory created next to it, and the finished artifact is moved into
//! place with a single rename. If anything fails the staging directory is
//! dropped and nothing is left behind.

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

pub(crate) struct Staging {
    dir: TempDir,
}

impl Staging {
    /// Create a staging directory in the parent of `output`, creating the
    /// parent first if needed. Same filesystem, so the final rename is atomic.
    pub async fn next_to(output: &Path) -> Result<Self, ConvertError> {
        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| ConvertError::write(&parent, e))?;
        let dir = tempfile::Builder::new()
            .prefix(".docshift-")
            .tempdir_in(&parent)
            .map_err(|e| ConvertError::write(&parent, e))?;
        debug!("Staging in {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A path for `name` inside the staging directory.
    pub fn file(&self, name: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(name)
    }

    /// A fresh private subdirectory, removed when the guard drops.
    pub fn scratch(&self, prefix: &str, root: Option<&Path>) -> Result<TempDir, ConvertError> {
        let root = root.unwrap_or_else(|| self.dir.path());
        tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(root)
            .map_err(|e| ConvertError::write(root, e))
    }

    /// Move `staged` to `dest`, replacing whatever is there, then drop the
    /// staging directory.
    pub async fn persist(self, staged: &Path, dest: &Path) -> Result<(), ConvertError> {
        if let Ok(meta) = tokio::fs::symlink_metadata(dest).await {
            let removed = if meta.is_dir() {
                tokio::fs::remove_dir_all(dest).await
            } else if staged.is_dir() {
                tokio::fs::remove_file(dest).await
            } else {
                Ok(())
            };
            removed.map_err(|e| ConvertError::write(dest, e))?;
        }
        tokio::fs::rename(staged, dest)
            .await
            .map_err(|e| ConvertError::write(dest, e))?;
        debug!("Persisted {}", dest.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persist_moves_file_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("nested/out/report.txt");
        let staging = Staging::next_to(&dest).await.unwrap();
        let staging_dir = staging.path().to_path_buf();
        let staged = staging.file("report.txt");
        tokio::fs::write(&staged, "hello").await.unwrap();

        staging.persist(&staged, &dest).await.unwrap();

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "hello");
        assert!(!staging_dir.exists());
    }

    #[tokio::test]
    async fn dropped_staging_leaves_nothing() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("out.md");
        {
            let staging = Staging::next_to(&dest).await.unwrap();
            tokio::fs::write(staging.file("partial.md"), "half")
                .await
                .unwrap();
        }
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn persist_replaces_existing_directory() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("deck.png");
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("stale-9.png"), b"x").unwrap();

        let staging = Staging::next_to(&dest).await.unwrap();
        let staged = staging.file("pages");
        std::fs::create_dir(&staged).unwrap();
        std::fs::write(staged.join("deck-1.png"), b"p").unwrap();
        staging.persist(&staged, &dest).await.unwrap();

        assert!(dest.join("deck-1.png").exists());
        assert!(!dest.join("stale-9.png").exists());
    }
}
