//! Grader variants
//!
//! A course is graded either by comparing program output against test case
//! fixtures ([`StdoutGrader`]) or by running the submission's own unit tests
//! ([`UnittestGrader`]). Both expose the same [`Grader`] operations and write
//! the same reports. [`LabGrader`] picks the variant from the course config.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

pub use crate::grader::stdout::StdoutGrader;
pub use crate::grader::unittest::{UNITTEST_CASE_ID, UnittestGrader};

mod stdout;
mod unittest;

use crate::aggregate::summarize;
use crate::config::{Config, ConfigError, Course, GraderKind, Lab, Toolchain};
use crate::engine::{GradeError, SubmissionGrader, grade_all};
use crate::layout::LabPaths;
use crate::report::{self, ChartData, DiffEntry, GradingRun, ReportWriter};
use crate::submissions::{self, SubmissionError, SubmissionFile};
use crate::types::{GradingMode, SubmissionUnit};

/// Options of one grading run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: GradingMode,

    /// Upload batch to grade (the lab's submissions directory if not specified)
    pub batch: Option<String>,

    /// Worker count override
    pub workers: Option<usize>,
}

/// Operations every grader variant supports
pub trait Grader: Send + Sync {
    /// Grade every submission of a lab batch and write the reports
    fn run_grader(
        &self,
        lab: &str,
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<GradingRun, GradeError>> + Send;

    /// Replace a lab batch with an already-extracted upload
    fn add_submissions(
        &self,
        lab: &str,
        batch: Option<&str>,
        source: &Path,
    ) -> impl Future<Output = Result<Vec<SubmissionUnit>, GradeError>> + Send;

    /// Report files of a lab batch that can be downloaded
    fn results_to_download(
        &self,
        lab: &str,
        batch: Option<&str>,
    ) -> Result<Vec<PathBuf>, GradeError>;

    /// Files of one submission, for manual review
    fn get_submission_files(
        &self,
        lab: &str,
        batch: Option<&str>,
        submission_id: &str,
    ) -> impl Future<Output = Result<Vec<SubmissionFile>, GradeError>> + Send;

    /// Overwrite files of one submission before re-grading
    fn update_submission_files(
        &self,
        lab: &str,
        batch: Option<&str>,
        submission_id: &str,
        files: &[SubmissionFile],
    ) -> impl Future<Output = Result<(), GradeError>> + Send;
}

/// Everything a grader knows about the course it grades
#[derive(Debug, Clone)]
pub struct CourseContext {
    config: Arc<Config>,

    /// Course name as configured
    name: String,

    course: Course,
    toolchain: Toolchain,
}

impl CourseContext {
    /// Resolve a course, ignoring case
    pub fn new(config: Arc<Config>, course: &str) -> Result<Self, ConfigError> {
        let (name, found) = config.get_course(course)?;
        let toolchain = config.get_toolchain(&found.toolchain)?.clone();
        let (name, course) = (name.to_string(), found.clone());
        Ok(Self {
            config,
            name,
            course,
            toolchain,
        })
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn course(&self) -> &Course {
        &self.course
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn lab(&self, lab: &str) -> Result<&Lab, ConfigError> {
        self.course
            .get_lab(lab)
            .ok_or_else(|| ConfigError::LabNotFound {
                course: self.name.clone(),
                lab: lab.to_string(),
            })
    }

    /// Paths of a lab, using the configured spelling of its name
    pub fn lab_paths(&self, lab: &str) -> Result<LabPaths, ConfigError> {
        let lab = self.lab(lab)?;
        Ok(LabPaths::new(&self.config.root, &self.name, &lab.name))
    }

    /// Directory of a lab batch
    pub fn batch_dir(&self, lab: &str, batch: Option<&str>) -> Result<PathBuf, GradeError> {
        let paths = self.lab_paths(lab)?;
        paths.batch_dir(batch).ok_or_else(|| {
            SubmissionError::InvalidName(batch.unwrap_or_default().to_string()).into()
        })
    }

    /// Discover, grade, aggregate and persist one lab batch
    #[instrument(skip(self, lab, job, test_case_ids, options, cancel), fields(course = %self.name, lab = %lab.name))]
    pub(crate) async fn run<J: SubmissionGrader>(
        &self,
        lab: &Lab,
        job: J,
        test_case_ids: Vec<String>,
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<GradingRun, GradeError> {
        let paths = LabPaths::new(&self.config.root, &self.name, &lab.name);
        let batch_dir = paths
            .batch_dir(options.batch.as_deref())
            .ok_or_else(|| {
                SubmissionError::InvalidName(options.batch.clone().unwrap_or_default())
            })?;

        let submissions =
            submissions::list_submissions(&paths.submissions_dir(), options.batch.as_deref())
                .await?;
        let workers = options
            .workers
            .unwrap_or_else(|| self.config.worker_count())
            .max(1);

        let results = grade_all(Arc::new(job), submissions, workers, cancel).await?;
        let summary = summarize(&lab.name, &test_case_ids, &results);
        let run = GradingRun { summary, results };

        let writer = ReportWriter::new(paths.reports(batch_dir));
        let run = tokio::task::spawn_blocking(move || writer.write(&run).map(|()| run))
            .await
            .map_err(|err| GradeError::Worker(err.to_string()))??;

        info!(
            submissions = run.summary.submission_count(),
            pass_percentage = run.summary.pass_percentage,
            "lab graded"
        );
        Ok(run)
    }

    pub async fn add_submissions(
        &self,
        lab: &str,
        batch: Option<&str>,
        source: &Path,
    ) -> Result<Vec<SubmissionUnit>, GradeError> {
        let batch_dir = self.batch_dir(lab, batch)?;
        Ok(submissions::add_submissions(&batch_dir, source).await?)
    }

    pub fn results_to_download(
        &self,
        lab: &str,
        batch: Option<&str>,
    ) -> Result<Vec<PathBuf>, GradeError> {
        let paths = self.lab_paths(lab)?;
        let batch_dir = self.batch_dir(lab, batch)?;
        Ok(report::results_to_download(&paths.reports(batch_dir))?)
    }

    pub fn read_diff_dump(
        &self,
        lab: &str,
        batch: Option<&str>,
    ) -> Result<Vec<DiffEntry>, GradeError> {
        let paths = self.lab_paths(lab)?;
        let batch_dir = self.batch_dir(lab, batch)?;
        Ok(report::read_diff_dump(&paths.reports(batch_dir))?)
    }

    pub fn read_chart(&self, lab: &str, batch: Option<&str>) -> Result<ChartData, GradeError> {
        let paths = self.lab_paths(lab)?;
        let batch_dir = self.batch_dir(lab, batch)?;
        Ok(report::read_chart(&paths.reports(batch_dir))?)
    }

    pub async fn get_submission_files(
        &self,
        lab: &str,
        batch: Option<&str>,
        submission_id: &str,
    ) -> Result<Vec<SubmissionFile>, GradeError> {
        let batch_dir = self.batch_dir(lab, batch)?;
        Ok(submissions::get_submission_files(&batch_dir, submission_id).await?)
    }

    pub async fn update_submission_files(
        &self,
        lab: &str,
        batch: Option<&str>,
        submission_id: &str,
        files: &[SubmissionFile],
    ) -> Result<(), GradeError> {
        let batch_dir = self.batch_dir(lab, batch)?;
        Ok(submissions::update_submission_files(&batch_dir, submission_id, files).await?)
    }

    /// Store one submission from its files, replacing an earlier upload with the same id
    pub async fn save_submission(
        &self,
        lab: &str,
        batch: Option<&str>,
        submission_id: &str,
        files: &[SubmissionFile],
    ) -> Result<SubmissionUnit, GradeError> {
        let batch_dir = self.batch_dir(lab, batch)?;
        Ok(submissions::save_single_submission(&batch_dir, submission_id, files).await?)
    }

    /// Bundle the downloadable reports of a lab batch into one zip archive
    pub fn compress_results(&self, lab: &str, batch: Option<&str>) -> Result<PathBuf, GradeError> {
        let paths = self.lab_paths(lab)?;
        let batch_dir = self.batch_dir(lab, batch)?;
        Ok(report::compress_results(&paths.reports(batch_dir))?)
    }
}

/// Grader selected by a course's `grader` setting
#[derive(Debug, Clone)]
pub enum LabGrader {
    Stdout(StdoutGrader),
    Unittest(UnittestGrader),
}

impl LabGrader {
    /// Build the grader a course is configured for
    pub fn for_course(config: Arc<Config>, course: &str) -> Result<Self, ConfigError> {
        let context = CourseContext::new(config, course)?;
        Ok(match context.course().grader {
            GraderKind::Stdout => Self::Stdout(StdoutGrader::new(context)),
            GraderKind::Unittest => Self::Unittest(UnittestGrader::new(context)),
        })
    }

    pub fn kind(&self) -> GraderKind {
        match self {
            Self::Stdout(_) => GraderKind::Stdout,
            Self::Unittest(_) => GraderKind::Unittest,
        }
    }

    pub fn context(&self) -> &CourseContext {
        match self {
            Self::Stdout(grader) => grader.context(),
            Self::Unittest(grader) => grader.context(),
        }
    }
}

impl Grader for LabGrader {
    async fn run_grader(
        &self,
        lab: &str,
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<GradingRun, GradeError> {
        match self {
            Self::Stdout(grader) => grader.run_grader(lab, options, cancel).await,
            Self::Unittest(grader) => grader.run_grader(lab, options, cancel).await,
        }
    }

    async fn add_submissions(
        &self,
        lab: &str,
        batch: Option<&str>,
        source: &Path,
    ) -> Result<Vec<SubmissionUnit>, GradeError> {
        self.context().add_submissions(lab, batch, source).await
    }

    fn results_to_download(
        &self,
        lab: &str,
        batch: Option<&str>,
    ) -> Result<Vec<PathBuf>, GradeError> {
        self.context().results_to_download(lab, batch)
    }

    async fn get_submission_files(
        &self,
        lab: &str,
        batch: Option<&str>,
        submission_id: &str,
    ) -> Result<Vec<SubmissionFile>, GradeError> {
        self.context()
            .get_submission_files(lab, batch, submission_id)
            .await
    }

    async fn update_submission_files(
        &self,
        lab: &str,
        batch: Option<&str>,
        submission_id: &str,
        files: &[SubmissionFile],
    ) -> Result<(), GradeError> {
        self.context()
            .update_submission_files(lab, batch, submission_id, files)
            .await
    }
}
