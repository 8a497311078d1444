//! Report persistence
//!
//! Every artifact is rendered from a [`GradingRun`] alone and written to a
//! temporary file that is renamed into place, so a report either exists
//! complete or not at all. Re-running overwrites.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, instrument};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::aggregate::{CohortSummary, TestCasePassRate};
use crate::layout::ReportPaths;
use crate::types::{FailedCase, SubmissionResult};

const SEPARATOR: &str = "----------";
const SUMMARY_RULE: &str = "--------------------";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read report {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed report {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to build archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Everything one grading run produced
#[derive(Debug, Clone, PartialEq)]
pub struct GradingRun {
    pub summary: CohortSummary,

    /// Per-submission results, sorted by submission id
    pub results: Vec<SubmissionResult>,
}

/// Failed test cases of one submission in the diff dump
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub id: String,
    pub failed: Vec<FailedCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentGrade {
    pub id: String,
    pub grade: f64,
}

/// Cohort chart document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub passed_tc: Vec<TestCasePassRate>,
    pub students_list: Vec<StudentGrade>,
}

/// Format a percentage the way reports show it: `100.0`, `66.67`
pub fn format_grade(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Plain-text report of one submission
pub fn render_results(result: &SubmissionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "* Total Grade: {}", format_grade(result.grade));

    if let Some(diagnostic) = &result.compile_error {
        let _ = writeln!(out, "* Compilation Error:");
        out.push_str(diagnostic);
        if !diagnostic.ends_with('\n') {
            out.push('\n');
        }
    }

    let _ = writeln!(out, "* Failed Test Cases:");
    for failed in &result.failed {
        let difference = if result.compile_error.is_some() {
            "compilation failed"
        } else {
            failed.diagnostic.as_str()
        };
        let _ = writeln!(out, "{SEPARATOR}");
        let _ = writeln!(out, "test case id: {}", failed.tc_id);
        let _ = writeln!(out, "difference: {difference}");
    }
    out
}

/// Plain-text cohort summary
pub fn render_summary(summary: &CohortSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "* {} Result Summary", summary.lab);
    let _ = writeln!(out, "{SUMMARY_RULE}");
    let _ = writeln!(
        out,
        "* Pass Percentage: {}",
        format_grade(summary.pass_percentage)
    );
    for (id, grade) in &summary.grades {
        let _ = writeln!(out, "{id}:{}", format_grade(*grade));
    }
    out
}

/// Diff dump entries, one per submission
///
/// Submissions without failures are listed with an empty `failed` array so
/// the document covers the whole cohort.
pub fn diff_entries(results: &[SubmissionResult]) -> Vec<DiffEntry> {
    results
        .iter()
        .map(|result| DiffEntry {
            id: result.id.clone(),
            failed: result.failed.clone(),
        })
        .collect()
}

pub fn chart_data(summary: &CohortSummary) -> ChartData {
    ChartData {
        passed_tc: summary.test_case_pass_rates.clone(),
        students_list: summary
            .grades
            .iter()
            .map(|(id, grade)| StudentGrade {
                id: id.clone(),
                grade: *grade,
            })
            .collect(),
    }
}

/// Writes the four report artifacts of one lab batch
#[derive(Debug, Clone)]
pub struct ReportWriter {
    paths: ReportPaths,
}

impl ReportWriter {
    pub fn new(paths: ReportPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ReportPaths {
        &self.paths
    }

    /// Write every artifact of a run, replacing earlier ones
    #[instrument(skip(self, run), fields(lab = %run.summary.lab, submissions = run.results.len()))]
    pub fn write(&self, run: &GradingRun) -> Result<(), ReportError> {
        for result in &run.results {
            write_atomic(
                &self.paths.results(&result.id),
                render_results(result).as_bytes(),
            )?;
        }

        write_atomic(
            &self.paths.summary(),
            render_summary(&run.summary).as_bytes(),
        )?;

        let diff = serde_json::to_string_pretty(&diff_entries(&run.results))?;
        write_atomic(&self.paths.diff_dump(), diff.as_bytes())?;

        let chart = serde_json::to_string_pretty(&chart_data(&run.summary))?;
        write_atomic(&self.paths.chart(), chart.as_bytes())?;

        info!(batch = ?self.paths.batch_dir(), "reports written");
        Ok(())
    }
}

/// Write through a temporary file in the same directory, then rename
fn write_atomic(path: &Path, content: &[u8]) -> Result<(), ReportError> {
    let write_err = |source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut file = NamedTempFile::new_in(parent).map_err(write_err)?;
    file.write_all(content).map_err(write_err)?;
    file.as_file().sync_all().map_err(write_err)?;
    file.persist(path).map_err(|err| write_err(err.error))?;

    debug!(?path, len = content.len(), "report written");
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ReportError> {
    let content = std::fs::read_to_string(path).map_err(|source| ReportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ReportError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a persisted diff dump
pub fn read_diff_dump(paths: &ReportPaths) -> Result<Vec<DiffEntry>, ReportError> {
    read_json(&paths.diff_dump())
}

/// Read a persisted chart document
pub fn read_chart(paths: &ReportPaths) -> Result<ChartData, ReportError> {
    read_json(&paths.chart())
}

/// Every report file of a batch that exists, sorted
///
/// Per-submission reports come first, followed by the summary, the diff dump
/// and the chart.
pub fn results_to_download(paths: &ReportPaths) -> Result<Vec<PathBuf>, ReportError> {
    let read_err = |source| ReportError::Read {
        path: paths.batch_dir().to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    let entries = match std::fs::read_dir(paths.batch_dir()) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(files),
        Err(err) => return Err(read_err(err)),
    };
    for entry in entries {
        let entry = entry.map_err(read_err)?;
        if !entry.file_type().map_err(read_err)?.is_dir() {
            continue;
        }
        let id = entry.file_name().to_string_lossy().into_owned();
        let report = paths.results(&id);
        if report.is_file() {
            files.push(report);
        }
    }
    files.sort();

    for path in [paths.summary(), paths.diff_dump(), paths.chart()] {
        if path.is_file() {
            files.push(path);
        }
    }

    debug!(count = files.len(), "downloadable results");
    Ok(files)
}

/// Bundle every downloadable report of a batch into `{lab}_results.zip`
///
/// Entry names are relative to the batch directory. The archive is built in
/// a temporary file and renamed into place.
#[instrument(skip(paths), fields(batch = ?paths.batch_dir()))]
pub fn compress_results(paths: &ReportPaths) -> Result<PathBuf, ReportError> {
    let files = results_to_download(paths)?;
    let archive = paths.archive();
    let write_err = |source| ReportError::Write {
        path: archive.clone(),
        source,
    };
    let zip_err = |source| ReportError::Archive {
        path: archive.clone(),
        source,
    };

    std::fs::create_dir_all(paths.batch_dir()).map_err(write_err)?;
    let mut tmp = NamedTempFile::new_in(paths.batch_dir()).map_err(write_err)?;
    {
        let mut zip = ZipWriter::new(tmp.as_file_mut());
        let options: FileOptions<'_, ()> =
            FileOptions::default().compression_method(CompressionMethod::Deflated);
        for file in &files {
            let name = file
                .strip_prefix(paths.batch_dir())
                .unwrap_or(file.as_path())
                .to_string_lossy()
                .replace('\\', "/");
            let content = std::fs::read(file).map_err(|source| ReportError::Read {
                path: file.clone(),
                source,
            })?;
            zip.start_file(name, options.clone()).map_err(zip_err)?;
            zip.write_all(&content).map_err(write_err)?;
        }
        zip.finish().map_err(zip_err)?;
    }
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(&archive).map_err(|err| write_err(err.error))?;

    info!(files = files.len(), ?archive, "results archived");
    Ok(archive)
}
