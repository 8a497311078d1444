//! A batch engine for grading student submissions.
//!
//! Labgrader compiles every submission of a lab in its own execution
//! directory, runs it once per test case with the input on stdin, compares
//! stdout byte for byte against the expected output and writes
//! per-submission and cohort reports next to the submissions.
//!
//! # Features
//!
//! - **Isolated runs**: one execution directory per submission, wall clock limits and capped output.
//! - **Optional sandbox profile**: wrap program runs in an external restriction tool.
//! - **Parallel grading**: a bounded worker pool with cooperative cancellation.
//! - **Deterministic reports**: text reports plus diff and chart JSON, rewritten atomically.
//! - **TOML configuration**: toolchains, courses and labs, with environment overrides.
//! - **Two grader variants**: stdout comparison and unit-test runs.

pub use aggregate::{CohortSummary, PASS_THRESHOLD, TestCasePassRate, aggregate, summarize};
pub use compare::{Comparison, compare, unified_diff};
pub use config::{Config, ConfigError, Course, EXAMPLE_CONFIG, GraderKind, Lab, Toolchain};
pub use engine::{GradeError, SubmissionGrader, grade_all};
pub use fixtures::{FixtureError, load_test_cases};
pub use grader::{CourseContext, Grader, LabGrader, RunOptions, StdoutGrader, UnittestGrader};
pub use layout::{LabPaths, ReportPaths};
pub use report::{ChartData, DiffEntry, GradingRun, ReportError, ReportWriter};
pub use runner::{Artifact, CompileError, CompileOutcome, ExecuteError, Runner};
pub use submissions::{SubmissionError, SubmissionFile, list_submissions};
pub use types::{
    ExecutionLimits, ExecutionOutcome, FailedCase, GradingMode, RawExecution, SubmissionResult,
    SubmissionUnit, TestCase, Verdict,
};

pub mod aggregate;
pub mod compare;
pub mod config;
pub mod engine;
pub mod fixtures;
pub mod grader;
pub mod layout;
pub mod report;
pub mod runner;
pub mod sandbox;
pub mod submissions;
pub mod types;
