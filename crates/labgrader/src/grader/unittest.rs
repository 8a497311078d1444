//! Grader for courses whose submissions carry their own tests
//!
//! The toolchain's run command (a test runner) is executed once per
//! submission. The whole run counts as a single test case.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use crate::aggregate::aggregate;
use crate::engine::{GradeError, SubmissionGrader};
use crate::grader::{CourseContext, Grader, RunOptions};
use crate::report::GradingRun;
use crate::runner::{CompileOutcome, Runner};
use crate::submissions::SubmissionFile;
use crate::types::{
    ExecutionLimits, ExecutionOutcome, RawExecution, SubmissionResult, SubmissionUnit, TestCase,
    Verdict,
};

/// Id of the single test case a unit-test run is recorded as
pub const UNITTEST_CASE_ID: &str = "unittest";

/// Grades by running the submission's unit tests
#[derive(Debug, Clone)]
pub struct UnittestGrader {
    context: CourseContext,
}

impl UnittestGrader {
    pub fn new(context: CourseContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &CourseContext {
        &self.context
    }
}

fn unittest_case() -> TestCase {
    TestCase {
        id: UNITTEST_CASE_ID.to_owned(),
        input: String::new(),
        expected: String::new(),
    }
}

/// Classify a test runner's exit
///
/// Any non-zero exit fails the case with everything the runner printed.
fn classify(raw: &RawExecution, limits: &ExecutionLimits) -> Verdict {
    if raw.timed_out {
        return Verdict::FailedTimeout {
            timeout_seconds: limits.timeout_seconds,
        };
    }
    if raw.is_success() {
        return Verdict::Passed;
    }

    let mut output = raw.stdout.clone();
    if !output.is_empty() && !raw.stderr.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
    output.push_str(&raw.stderr);
    if output.is_empty() {
        output = match (raw.exit_code, raw.signal) {
            (Some(code), _) => format!("tests exited with code {code}"),
            (None, Some(signal)) => format!("tests killed by signal {signal}"),
            (None, None) => "tests did not run".to_owned(),
        };
    }
    Verdict::FailedMismatch {
        diff: output.clone(),
        output,
    }
}

struct UnittestJob {
    runner: Runner,
    limits: ExecutionLimits,
}

impl SubmissionGrader for UnittestJob {
    #[instrument(skip(self, submission), fields(submission = %submission.id))]
    async fn grade(&self, submission: SubmissionUnit) -> SubmissionResult {
        let case = unittest_case();
        let outcome = match self.runner.prepare(&submission).await {
            CompileOutcome::Success(artifact) => {
                let verdict = match self.runner.run_once(&artifact, None, &self.limits).await {
                    Ok(raw) => classify(&raw, &self.limits),
                    Err(err) => {
                        warn!(%err, "test runner could not be started");
                        Verdict::FailedCrash {
                            exit_code: None,
                            signal: None,
                            stderr: err.to_string(),
                        }
                    }
                };
                artifact.cleanup();
                ExecutionOutcome {
                    test_case_id: case.id,
                    expected: case.expected,
                    verdict,
                }
            }
            CompileOutcome::Failure { diagnostic } => {
                ExecutionOutcome::compile_failed(&case, &diagnostic)
            }
        };
        aggregate(&submission.id, vec![outcome])
    }
}

impl Grader for UnittestGrader {
    async fn run_grader(
        &self,
        lab: &str,
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<GradingRun, GradeError> {
        let lab = self.context.lab(lab)?.clone();
        let job = UnittestJob {
            runner: Runner::new(
                Arc::clone(self.context.config()),
                self.context.toolchain().clone(),
            ),
            limits: self.context.config().limits_for(&lab),
        };
        self.context
            .run(
                &lab,
                job,
                vec![UNITTEST_CASE_ID.to_owned()],
                options,
                cancel,
            )
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
