//! Per-submission execution directories
//!
//! Every submission is built and run inside its own directory so parallel
//! workers never share a working directory or an artifact path.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, instrument, warn};

use crate::layout::copy_tree;
use crate::sandbox::SandboxError;

/// A scratch directory owned by exactly one submission
///
/// The directory is removed by [`cleanup()`](Self::cleanup) or, failing
/// that, when the value is dropped.
#[derive(Debug)]
pub struct ExecutionDir {
    /// Submission the directory belongs to
    submission_id: String,

    dir: TempDir,
}

impl ExecutionDir {
    /// Create a fresh directory for `submission_id` under `work_root`
    #[instrument]
    pub fn create(work_root: &Path, submission_id: &str) -> Result<Self, SandboxError> {
        std::fs::create_dir_all(work_root).map_err(|source| SandboxError::CreateDir {
            path: work_root.display().to_string(),
            source,
        })?;

        let prefix: String = submission_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let dir = tempfile::Builder::new()
            .prefix(&format!("{prefix}-"))
            .tempdir_in(work_root)
            .map_err(|source| SandboxError::CreateDir {
                path: work_root.display().to_string(),
                source,
            })?;

        debug!(path = ?dir.path(), "execution directory created");

        Ok(Self {
            submission_id: submission_id.to_string(),
            dir,
        })
    }

    pub fn submission_id(&self) -> &str {
        &self.submission_id
    }

    /// Absolute path of the directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Get the path to a file inside the directory
    ///
    /// Returns an error if the name tries to escape the directory.
    pub fn file_path(&self, name: &str) -> Result<PathBuf, SandboxError> {
        if name.is_empty() || name.contains("..") || name.starts_with('/') {
            return Err(SandboxError::InvalidPath(format!(
                "path traversal not allowed: {name}"
            )));
        }
        Ok(self.dir.path().join(name))
    }

    /// Check if a regular file exists in the directory
    pub async fn file_exists(&self, name: &str) -> Result<bool, SandboxError> {
        let path = self.file_path(name)?;
        Ok(tokio::fs::metadata(&path)
            .await
            .is_ok_and(|meta| meta.is_file()))
    }

    /// Copy a submission's files into the directory
    ///
    /// Subdirectories are copied recursively; symlinks are skipped. Top-level
    /// files for which `keep` returns false are left behind. Returns the
    /// names of the copied top-level files, sorted.
    #[instrument(skip(self, keep), fields(submission = %self.submission_id))]
    pub async fn stage_from(
        &self,
        source: &Path,
        keep: impl Fn(&str) -> bool,
    ) -> Result<Vec<String>, SandboxError> {
        let staged = copy_tree(source, self.path(), keep).await?;
        debug!(files = staged.len(), "staged submission");
        Ok(staged)
    }

    /// Remove the directory and everything in it
    pub fn cleanup(self) -> Result<(), SandboxError> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|err| {
            warn!(?path, %err, "failed to remove execution directory");
            SandboxError::Io(err)
        })
    }
}
