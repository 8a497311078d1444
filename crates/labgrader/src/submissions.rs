//! Submission discovery and management
//!
//! One submission is one immediate subdirectory of a lab's submissions
//! directory (or of an upload batch directory inside it).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::layout::{copy_tree, is_report_file, is_safe_component};
use crate::types::SubmissionUnit;

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("invalid name '{0}'")]
    InvalidName(String),

    #[error("submission '{0}' not found")]
    NotFound(String),

    #[error("source directory {} does not exist", .0.display())]
    SourceNotFound(PathBuf),

    #[error("source directory {} is inside the target batch directory", .0.display())]
    SourceInsideTarget(PathBuf),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One file of a submission, as shown for manual review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionFile {
    pub name: String,
    pub content: String,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SubmissionError + '_ {
    move |source| SubmissionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn check_name(name: &str) -> Result<(), SubmissionError> {
    if is_safe_component(name) {
        Ok(())
    } else {
        Err(SubmissionError::InvalidName(name.to_string()))
    }
}

/// List the submissions of a lab, optionally scoped to one upload batch
///
/// A missing directory has no submissions. Results are sorted by id.
#[instrument]
pub async fn list_submissions(
    submissions_dir: &Path,
    batch: Option<&str>,
) -> Result<Vec<SubmissionUnit>, SubmissionError> {
    let dir = match batch {
        Some(key) => {
            check_name(key)?;
            submissions_dir.join(key)
        }
        None => submissions_dir.to_path_buf(),
    };

    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(?dir, "no submissions directory");
            return Ok(Vec::new());
        }
        Err(err) => return Err(io_error(&dir)(err)),
    };

    let mut units = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_error(&dir))? {
        let file_type = entry.file_type().await.map_err(io_error(&dir))?;
        if !file_type.is_dir() {
            continue;
        }
        units.push(SubmissionUnit {
            id: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
        });
    }
    units.sort_by(|a, b| a.id.cmp(&b.id));

    debug!(count = units.len(), "submissions listed");
    Ok(units)
}

/// Replace a batch directory with a copy of an already-extracted upload
///
/// The batch directory is emptied first, so results of earlier uploads never
/// mix with the new ones.
#[instrument]
pub async fn add_submissions(
    batch_dir: &Path,
    source: &Path,
) -> Result<Vec<SubmissionUnit>, SubmissionError> {
    if !tokio::fs::try_exists(source)
        .await
        .map_err(io_error(source))?
    {
        return Err(SubmissionError::SourceNotFound(source.to_path_buf()));
    }

    let source_abs = tokio::fs::canonicalize(source)
        .await
        .map_err(io_error(source))?;
    if let Ok(batch_abs) = tokio::fs::canonicalize(batch_dir).await
        && source_abs.starts_with(&batch_abs)
    {
        return Err(SubmissionError::SourceInsideTarget(source.to_path_buf()));
    }

    clear_submissions(batch_dir).await?;
    copy_tree(&source_abs, batch_dir, |_| true)
        .await
        .map_err(io_error(batch_dir))?;

    let units = list_submissions(batch_dir, None).await?;
    info!(count = units.len(), batch = ?batch_dir, "submissions added");
    Ok(units)
}

/// Write one submission's files, replacing any previous submission with the same id
#[instrument(skip(files), fields(files = files.len()))]
pub async fn save_single_submission(
    batch_dir: &Path,
    submission_id: &str,
    files: &[SubmissionFile],
) -> Result<SubmissionUnit, SubmissionError> {
    check_name(submission_id)?;
    for file in files {
        check_name(&file.name)?;
    }

    let dir = batch_dir.join(submission_id);
    clear_submissions(&dir).await?;
    for file in files {
        let path = dir.join(&file.name);
        tokio::fs::write(&path, &file.content)
            .await
            .map_err(io_error(&path))?;
    }

    Ok(SubmissionUnit {
        id: submission_id.to_string(),
        path: dir,
    })
}

/// Remove everything in a submissions (or batch) directory, leaving it empty
#[instrument]
pub async fn clear_submissions(dir: &Path) -> Result<(), SubmissionError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(io_error(dir)(err)),
    }
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(io_error(dir))?;
    Ok(())
}

fn submission_dir(batch_dir: &Path, submission_id: &str) -> Result<PathBuf, SubmissionError> {
    check_name(submission_id)?;
    let dir = batch_dir.join(submission_id);
    if !dir.is_dir() {
        return Err(SubmissionError::NotFound(submission_id.to_string()));
    }
    Ok(dir)
}

/// Read a submission's top-level files, sorted by name
///
/// Generated report files are not part of the submission and are skipped.
#[instrument]
pub async fn get_submission_files(
    batch_dir: &Path,
    submission_id: &str,
) -> Result<Vec<SubmissionFile>, SubmissionError> {
    let dir = submission_dir(batch_dir, submission_id)?;

    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(&dir).await.map_err(io_error(&dir))?;
    while let Some(entry) = entries.next_entry().await.map_err(io_error(&dir))? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type().await.map_err(io_error(&dir))?;
        if !file_type.is_file() || is_report_file(&name) {
            continue;
        }
        let path = entry.path();
        let content = tokio::fs::read(&path).await.map_err(io_error(&path))?;
        files.push(SubmissionFile {
            name,
            content: String::from_utf8_lossy(&content).into_owned(),
        });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Overwrite (or add) files of an existing submission for manual re-grading
#[instrument(skip(files), fields(files = files.len()))]
pub async fn update_submission_files(
    batch_dir: &Path,
    submission_id: &str,
    files: &[SubmissionFile],
) -> Result<(), SubmissionError> {
    let dir = submission_dir(batch_dir, submission_id)?;
    for file in files {
        check_name(&file.name)?;
        if is_report_file(&file.name) {
            return Err(SubmissionError::InvalidName(file.name.clone()));
        }
    }

    for file in files {
        let path = dir.join(&file.name);
        tokio::fs::write(&path, &file.content)
            .await
            .map_err(io_error(&path))?;
        debug!(?path, "submission file updated");
    }
    Ok(())
}
