//! Compile-and-run for one submission
//!
//! The [`Runner`] turns a submission directory into an [`Artifact`] living in
//! its own execution directory, then runs that artifact once per test case.
//! Failures of either step come back as data, never as errors.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument, warn};

pub use crate::runner::compile::{Artifact, compile};
pub use crate::runner::execute::execute;

mod compile;
mod execute;

use crate::compare::judge;
use crate::config::{Config, Toolchain};
use crate::sandbox::SandboxError;
use crate::types::{ExecutionLimits, ExecutionOutcome, RawExecution, SubmissionUnit, TestCase, Verdict};

/// Errors that occur during compilation
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("no .{extension} source files found")]
    NoSources { extension: String },

    #[error("compilation failed with exit code {exit_code:?}")]
    Failed {
        exit_code: Option<i32>,
        output: String,
    },

    #[error("compilation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("compiler did not produce '{0}'")]
    MissingArtifact(String),

    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),
}

impl CompileError {
    /// Text shown to the student for a failed build
    ///
    /// The compiler's own output is kept verbatim when there is any.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Failed { exit_code, output } if output.is_empty() => match exit_code {
                Some(code) => format!("compiler exited with code {code}"),
                None => "compiler was killed".to_owned(),
            },
            Self::Failed { output, .. } => output.clone(),
            other => other.to_string(),
        }
    }
}

/// Errors that occur during execution
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("execution not started: {0}")]
    NotStarted(String),

    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),
}

/// Result of preparing a submission for its runs
#[derive(Debug)]
pub enum CompileOutcome {
    Success(Artifact),
    Failure { diagnostic: String },
}

/// Builds and runs submissions with one toolchain
#[derive(Debug, Clone)]
pub struct Runner {
    config: Arc<Config>,
    toolchain: Toolchain,
}

impl Runner {
    pub fn new(config: Arc<Config>, toolchain: Toolchain) -> Self {
        Self { config, toolchain }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Stage and build a submission
    #[instrument(skip(self), fields(submission = %submission.id))]
    pub async fn prepare(&self, submission: &SubmissionUnit) -> CompileOutcome {
        match compile::compile(&self.config, &self.toolchain, submission).await {
            Ok(artifact) => CompileOutcome::Success(artifact),
            Err(err) => {
                warn!(%err, "submission did not build");
                CompileOutcome::Failure {
                    diagnostic: err.diagnostic(),
                }
            }
        }
    }

    /// Run the artifact on one test case and classify the result
    #[instrument(skip(self, artifact, test_case, limits), fields(submission = %artifact.submission_id(), test_case = %test_case.id))]
    pub async fn evaluate(
        &self,
        artifact: &Artifact,
        test_case: &TestCase,
        limits: &ExecutionLimits,
    ) -> ExecutionOutcome {
        match self.run_once(artifact, Some(test_case.input.as_bytes()), limits).await {
            Ok(raw) => judge(test_case, &raw, limits),
            Err(err) => {
                warn!(%err, "program could not be started");
                ExecutionOutcome {
                    test_case_id: test_case.id.clone(),
                    expected: test_case.expected.clone(),
                    verdict: Verdict::FailedCrash {
                        exit_code: None,
                        signal: None,
                        stderr: err.to_string(),
                    },
                }
            }
        }
    }

    /// Run every test case in order against the same artifact
    pub async fn evaluate_all(
        &self,
        artifact: &Artifact,
        test_cases: &[TestCase],
        limits: &ExecutionLimits,
    ) -> Vec<ExecutionOutcome> {
        let mut outcomes = Vec::with_capacity(test_cases.len());
        for test_case in test_cases {
            outcomes.push(self.evaluate(artifact, test_case, limits).await);
        }
        debug!(
            submission = %artifact.submission_id(),
            passed = outcomes.iter().filter(|o| o.is_passed()).count(),
            total = outcomes.len(),
            "test cases evaluated"
        );
        outcomes
    }

    /// Run the artifact once without classifying the result
    pub async fn run_once(
        &self,
        artifact: &Artifact,
        input: Option<&[u8]>,
        limits: &ExecutionLimits,
    ) -> Result<RawExecution, ExecuteError> {
        execute::execute(&self.config, artifact, input, limits).await
    }
}
