use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Lab;

/// Student output recorded for a test case whose program crashed or failed to build
pub const CRASH_OUTPUT: &str = "ERROR";

/// Student output recorded for a test case whose program ran out of time
pub const TIMEOUT_OUTPUT: &str = "TIMEOUT";

/// A fixed (input, expected output) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Identifier, unique within a lab
    pub id: String,

    /// Payload piped to the program's standard input
    pub input: String,

    /// Exact text the program must print
    pub expected: String,
}

/// One student's (or group's) submitted directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionUnit {
    /// Opaque submission id (the directory name)
    pub id: String,

    /// Path to the submission directory
    pub path: PathBuf,
}

/// Limits applied to every run of a submission's artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Wall clock limit in seconds
    pub timeout_seconds: u64,

    /// Maximum number of bytes captured per output stream
    pub max_output: usize,

    /// Apply the sandbox profile's network-off arguments
    pub network_disabled: bool,
}

impl ExecutionLimits {
    /// 1 mebibyte in bytes
    pub const MIB: usize = 1024 * 1024;

    /// Create limits with the default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the limits for a lab's runs
    pub fn for_lab(lab: &Lab) -> Self {
        Self {
            timeout_seconds: u64::from(lab.runtime_limit),
            network_disabled: lab.disable_internet,
            ..Self::default()
        }
    }

    /// Set the wall clock limit in seconds
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Set the per-stream output cap in bytes
    pub fn with_max_output(mut self, bytes: usize) -> Self {
        self.max_output = bytes;
        self
    }

    /// Enable or disable network access restrictions
    pub fn with_network_disabled(mut self, disabled: bool) -> Self {
        self.network_disabled = disabled;
        self
    }

    /// Wall clock limit as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout_seconds: 2,
            max_output: Self::MIB,
            network_disabled: false,
        }
    }
}

/// What a single process run produced
#[derive(Debug, Clone, Default)]
pub struct RawExecution {
    /// Captured standard output (lossy UTF-8)
    pub stdout: String,

    /// Captured standard error (lossy UTF-8)
    pub stderr: String,

    /// Exit code if the process exited normally
    pub exit_code: Option<i32>,

    /// Signal number if the process was killed by a signal
    pub signal: Option<i32>,

    /// Whether the wall clock limit was hit and the process killed
    pub timed_out: bool,

    /// Wall clock time the run took
    pub wall_time: Duration,
}

impl RawExecution {
    /// Check if the process exited with code 0 within its limit
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Outcome of running one submission against one test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// The test case this outcome belongs to
    pub test_case_id: String,

    /// Expected output of the test case
    pub expected: String,

    pub verdict: Verdict,
}

impl ExecutionOutcome {
    /// Outcome recorded for every test case of a submission that did not build
    pub fn compile_failed(test_case: &TestCase, diagnostic: &str) -> Self {
        Self {
            test_case_id: test_case.id.clone(),
            expected: test_case.expected.clone(),
            verdict: Verdict::FailedCompile {
                diagnostic: diagnostic.to_owned(),
            },
        }
    }

    #[must_use]
    pub fn is_passed(&self) -> bool {
        matches!(self.verdict, Verdict::Passed)
    }

    /// Output shown for the student in reports
    ///
    /// Crashes, timeouts and build failures never show partial output.
    pub fn student_output(&self) -> &str {
        match &self.verdict {
            Verdict::Passed => "",
            Verdict::FailedMismatch { output, .. } => output,
            Verdict::FailedTimeout { .. } => TIMEOUT_OUTPUT,
            Verdict::FailedCrash { .. } | Verdict::FailedCompile { .. } => CRASH_OUTPUT,
        }
    }

    /// Human readable explanation of a failure
    pub fn diagnostic(&self) -> String {
        match &self.verdict {
            Verdict::Passed => String::new(),
            Verdict::FailedMismatch { diff, .. } => diff.clone(),
            Verdict::FailedCrash {
                exit_code,
                signal,
                stderr,
            } => {
                let mut message = match (exit_code, signal) {
                    (Some(code), _) => format!("program exited with code {code}"),
                    (None, Some(signal)) => format!("program killed by signal {signal}"),
                    (None, None) => "program could not be run".to_owned(),
                };
                if !stderr.is_empty() {
                    message.push('\n');
                    message.push_str(stderr);
                }
                message
            }
            Verdict::FailedTimeout { timeout_seconds } => {
                format!("program timed out after {timeout_seconds} seconds")
            }
            Verdict::FailedCompile { diagnostic } => {
                format!("compilation failed\n{diagnostic}")
            }
        }
    }
}

/// Pass/fail classification of one test case run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Output matched exactly
    Passed,

    /// Program exited normally but printed something else
    FailedMismatch { output: String, diff: String },

    /// Program exited non-zero, was killed, or could not be started
    FailedCrash {
        exit_code: Option<i32>,
        signal: Option<i32>,
        stderr: String,
    },

    /// Program hit the wall clock limit
    FailedTimeout { timeout_seconds: u64 },

    /// The submission never built, so nothing was run
    FailedCompile { diagnostic: String },
}

/// A failed test case as persisted in reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedCase {
    pub tc_id: String,

    /// What the student printed, or a sentinel for crashes and timeouts
    pub output: String,

    pub expected: String,

    /// Diff or failure explanation for the text report
    #[serde(skip)]
    pub diagnostic: String,
}

impl From<ExecutionOutcome> for FailedCase {
    fn from(outcome: ExecutionOutcome) -> Self {
        Self {
            output: outcome.student_output().to_owned(),
            diagnostic: outcome.diagnostic(),
            tc_id: outcome.test_case_id,
            expected: outcome.expected,
        }
    }
}

/// Aggregate of one submission's outcomes
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionResult {
    /// Submission id
    pub id: String,

    /// Ids of the passed test cases, in execution order
    pub passed: Vec<String>,

    /// Failed test cases, in execution order
    pub failed: Vec<FailedCase>,

    /// Percentage of passed test cases, rounded to 2 decimals
    pub grade: f64,

    /// Compiler diagnostic when the submission did not build
    pub compile_error: Option<String>,
}

impl SubmissionResult {
    /// Number of test cases evaluated
    pub fn total(&self) -> usize {
        self.passed.len() + self.failed.len()
    }
}

/// Which test cases a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradingMode {
    /// All of the lab's test cases
    #[default]
    Full,

    /// Only the lab's public test cases, as a student-facing preview
    Student,
}
