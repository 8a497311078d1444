use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::aggregate::aggregate;
use crate::engine::{GradeError, SubmissionGrader};
use crate::fixtures::load_test_cases;
use crate::grader::{CourseContext, Grader, RunOptions};
use crate::layout::LabPaths;
use crate::report::GradingRun;
use crate::runner::{CompileOutcome, Runner};
use crate::submissions::SubmissionFile;
use crate::types::{
    ExecutionLimits, ExecutionOutcome, GradingMode, SubmissionResult, SubmissionUnit, TestCase,
};

/// Grades by feeding test case input on stdin and comparing stdout
#[derive(Debug, Clone)]
pub struct StdoutGrader {
    context: CourseContext,
}

impl StdoutGrader {
    pub fn new(context: CourseContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &CourseContext {
        &self.context
    }
}

/// Per-run state shared by the workers
struct StdoutJob {
    runner: Runner,
    test_cases: Arc<[TestCase]>,
    limits: ExecutionLimits,
}

impl SubmissionGrader for StdoutJob {
    #[instrument(skip(self, submission), fields(submission = %submission.id))]
    async fn grade(&self, submission: SubmissionUnit) -> SubmissionResult {
        let outcomes = match self.runner.prepare(&submission).await {
            CompileOutcome::Success(artifact) => {
                let outcomes = self
                    .runner
                    .evaluate_all(&artifact, &self.test_cases, &self.limits)
                    .await;
                artifact.cleanup();
                outcomes
            }
            CompileOutcome::Failure { diagnostic } => self
                .test_cases
                .iter()
                .map(|tc| ExecutionOutcome::compile_failed(tc, &diagnostic))
                .collect(),
        };
        aggregate(&submission.id, outcomes)
    }
}

impl Grader for StdoutGrader {
    async fn run_grader(
        &self,
        lab: &str,
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<GradingRun, GradeError> {
        let lab = self.context.lab(lab)?.clone();
        let paths = LabPaths::new(&self.context.config().root, self.context.name(), &lab.name);

        let subset = match options.mode {
            GradingMode::Full => None,
            GradingMode::Student => Some(lab.public_test_cases.as_slice()),
        };
        let test_cases = load_test_cases(&paths.test_cases_dir(), subset).await?;
        let test_case_ids: Vec<String> = test_cases.iter().map(|tc| tc.id.clone()).collect();

        debug!(test_cases = test_case_ids.len(), mode = ?options.mode, "fixtures ready");

        let job = StdoutJob {
            runner: Runner::new(
                Arc::clone(self.context.config()),
                self.context.toolchain().clone(),
            ),
            test_cases: test_cases.into(),
            limits: self.context.config().limits_for(&lab),
        };
        self.context
            .run(&lab, job, test_case_ids, options, cancel)
            .await
    }

    async fn add_submissions(
        &self,
        lab: &str,
        batch: Option<&str>,
        source: &Path,
    ) -> Result<Vec<SubmissionUnit>, GradeError> {
        self.context.add_submissions(lab, batch, source).await
    }

    fn results_to_download(
        &self,
        lab: &str,
        batch: Option<&str>,
    ) -> Result<Vec<PathBuf>, GradeError> {
        self.context.results_to_download(lab, batch)
    }

    async fn get_submission_files(
        &self,
        lab: &str,
        batch: Option<&str>,
        submission_id: &str,
    ) -> Result<Vec<SubmissionFile>, GradeError> {
        self.context
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
        self.context
            .update_submission_files(lab, batch, submission_id, files)
            .await
    }
}
