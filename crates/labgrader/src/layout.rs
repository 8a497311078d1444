//! On-disk layout of courses, labs, fixtures, submissions and reports
//!
//! ```text
//! {root}/{course}/labs/{lab}/test_cases/{id}_in
//! {root}/{course}/labs/{lab}/test_cases/{id}_out
//! {root}/{course}/labs/{lab}/submissions[/{batch}]/{submission}/
//! {batch dir}/{submission}/{lab}_results.txt
//! {batch dir}/{lab}_result_summary.txt
//! {batch dir}/{lab}_diff_result.json
//! {batch dir}/{lab}_chart_result.json
//! {batch dir}/{lab}_results.zip
//! ```

use std::io;
use std::path::{Path, PathBuf};

pub const LABS_DIR: &str = "labs";
pub const TEST_CASES_DIR: &str = "test_cases";
pub const SUBMISSIONS_DIR: &str = "submissions";

pub const INPUT_SUFFIX: &str = "_in";
pub const OUTPUT_SUFFIX: &str = "_out";

pub const RESULTS_SUFFIX: &str = "_results.txt";
pub const SUMMARY_SUFFIX: &str = "_result_summary.txt";
pub const DIFF_SUFFIX: &str = "_diff_result.json";
pub const CHART_SUFFIX: &str = "_chart_result.json";
pub const ARCHIVE_SUFFIX: &str = "_results.zip";

/// Check that a name is usable as a single path component
pub fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Check whether a file name is a generated per-submission report
pub fn is_report_file(name: &str) -> bool {
    name.ends_with(RESULTS_SUFFIX)
}

/// Directories of one lab
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabPaths {
    lab: String,
    lab_dir: PathBuf,
}

impl LabPaths {
    /// `{root}/{course}/labs/{lab}`
    pub fn new(root: &Path, course: &str, lab: &str) -> Self {
        Self {
            lab: lab.to_string(),
            lab_dir: root.join(course).join(LABS_DIR).join(lab),
        }
    }

    pub fn lab(&self) -> &str {
        &self.lab
    }

    pub fn lab_dir(&self) -> &Path {
        &self.lab_dir
    }

    pub fn test_cases_dir(&self) -> PathBuf {
        self.lab_dir.join(TEST_CASES_DIR)
    }

    pub fn submissions_dir(&self) -> PathBuf {
        self.lab_dir.join(SUBMISSIONS_DIR)
    }

    /// Directory holding one upload batch, or the submissions directory
    /// itself when no batch key is given
    ///
    /// Returns `None` if the batch key is not a single path component.
    pub fn batch_dir(&self, batch: Option<&str>) -> Option<PathBuf> {
        match batch {
            None => Some(self.submissions_dir()),
            Some(key) if is_safe_component(key) => Some(self.submissions_dir().join(key)),
            Some(_) => None,
        }
    }

    /// Report locations for a batch
    pub fn reports(&self, batch_dir: impl Into<PathBuf>) -> ReportPaths {
        ReportPaths::new(batch_dir, &self.lab)
    }
}

/// Report artifact locations of one lab batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    batch_dir: PathBuf,
    lab: String,
}

impl ReportPaths {
    pub fn new(batch_dir: impl Into<PathBuf>, lab: &str) -> Self {
        Self {
            batch_dir: batch_dir.into(),
            lab: lab.to_string(),
        }
    }

    pub fn batch_dir(&self) -> &Path {
        &self.batch_dir
    }

    /// `{batch}/{submission}/{lab}_results.txt`
    pub fn results(&self, submission_id: &str) -> PathBuf {
        self.batch_dir
            .join(submission_id)
            .join(format!("{}{RESULTS_SUFFIX}", self.lab))
    }

    /// `{batch}/{lab}_result_summary.txt`
    pub fn summary(&self) -> PathBuf {
        self.batch_dir.join(format!("{}{SUMMARY_SUFFIX}", self.lab))
    }

    /// `{batch}/{lab}_diff_result.json`
    pub fn diff_dump(&self) -> PathBuf {
        self.batch_dir.join(format!("{}{DIFF_SUFFIX}", self.lab))
    }

    /// `{batch}/{lab}_chart_result.json`
    pub fn chart(&self) -> PathBuf {
        self.batch_dir.join(format!("{}{CHART_SUFFIX}", self.lab))
    }

    /// `{batch}/{lab}_results.zip`
    pub fn archive(&self) -> PathBuf {
        self.batch_dir.join(format!("{}{ARCHIVE_SUFFIX}", self.lab))
    }
}

/// Copy a directory tree, returning the sorted names of copied top-level files
///
/// Symlinks are skipped. Top-level files rejected by `keep` are not copied.
pub(crate) async fn copy_tree(
    from: &Path,
    to: &Path,
    keep: impl Fn(&str) -> bool,
) -> io::Result<Vec<String>> {
    let mut copied = Vec::new();
    let mut pending = vec![(from.to_path_buf(), to.to_path_buf(), true)];

    while let Some((src, dst, top_level)) = pending.pop() {
        tokio::fs::create_dir_all(&dst).await?;
        let mut entries = tokio::fs::read_dir(&src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type().await?;
            let target = dst.join(&name);

            if file_type.is_dir() {
                pending.push((entry.path(), target, false));
            } else if file_type.is_file() {
                if top_level && !keep(&name) {
                    continue;
                }
                tokio::fs::copy(entry.path(), &target).await?;
                if top_level {
                    copied.push(name);
                }
            }
        }
    }

    copied.sort();
    Ok(copied)
}
