//! Grade computation and cohort statistics

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::types::{ExecutionOutcome, FailedCase, SubmissionResult, Verdict};

/// Grade a submission must exceed (strictly) to count as passing
pub const PASS_THRESHOLD: f64 = 50.0;

/// Round to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage of passed test cases, rounded to 2 decimals
///
/// Zero evaluated test cases grade as 0.
pub fn grade(passed: usize, failed: usize) -> f64 {
    let total = passed + failed;
    if total == 0 {
        return 0.0;
    }
    round2(passed as f64 / total as f64 * 100.0)
}

/// Fold one submission's outcomes into its result
pub fn aggregate(submission_id: &str, outcomes: Vec<ExecutionOutcome>) -> SubmissionResult {
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut compile_error = None;

    for outcome in outcomes {
        if let Verdict::FailedCompile { diagnostic } = &outcome.verdict
            && compile_error.is_none()
        {
            compile_error = Some(diagnostic.clone());
        }

        if outcome.is_passed() {
            passed.push(outcome.test_case_id);
        } else {
            failed.push(FailedCase::from(outcome));
        }
    }

    SubmissionResult {
        id: submission_id.to_string(),
        grade: grade(passed.len(), failed.len()),
        passed,
        failed,
        compile_error,
    }
}

/// Cohort pass rate of one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCasePassRate {
    pub tc_id: String,

    #[serde(rename = "pass-percentage")]
    pub pass_percentage: f64,
}

/// Statistics over all submissions of one run
#[derive(Debug, Clone, PartialEq)]
pub struct CohortSummary {
    pub lab: String,

    /// Grade per submission id
    pub grades: BTreeMap<String, f64>,

    /// Share of submissions graded above [`PASS_THRESHOLD`], in percent
    pub pass_percentage: f64,

    /// Pass rate of every test case of the run, in execution order, unrounded
    pub test_case_pass_rates: Vec<TestCasePassRate>,
}

impl CohortSummary {
    pub fn submission_count(&self) -> usize {
        self.grades.len()
    }
}

/// Compute cohort statistics from scratch
///
/// No submissions give a pass percentage of 0.
pub fn summarize(lab: &str, test_case_ids: &[String], results: &[SubmissionResult]) -> CohortSummary {
    let grades: BTreeMap<String, f64> = results
        .iter()
        .map(|result| (result.id.clone(), result.grade))
        .collect();

    let total = results.len();
    let share_of_total = |count: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64 * 100.0
        }
    };

    let passing = results
        .iter()
        .filter(|result| result.grade > PASS_THRESHOLD)
        .count();

    let test_case_pass_rates = test_case_ids
        .iter()
        .map(|tc_id| {
            let count = results
                .iter()
                .filter(|result| result.passed.iter().any(|id| id == tc_id))
                .count();
            TestCasePassRate {
                tc_id: tc_id.clone(),
                pass_percentage: share_of_total(count),
            }
        })
        .collect();

    CohortSummary {
        lab: lab.to_string(),
        grades,
        pass_percentage: round2(share_of_total(passing)),
        test_case_pass_rates,
    }
}

/// Collects submission results sent by grading workers
///
/// Workers only ever send; the aggregator is the single owner of the
/// collected results.
#[derive(Debug)]
pub struct Aggregator {
    receiver: mpsc::Receiver<SubmissionResult>,
    results: BTreeMap<String, SubmissionResult>,
}

impl Aggregator {
    /// Create an aggregator and the sender handed to workers
    pub fn channel(capacity: usize) -> (mpsc::Sender<SubmissionResult>, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            sender,
            Self {
                receiver,
                results: BTreeMap::new(),
            },
        )
    }

    /// Receive until every sender is dropped
    ///
    /// Returns the results ordered by submission id.
    pub async fn collect(mut self) -> Vec<SubmissionResult> {
        while let Some(result) = self.receiver.recv().await {
            debug!(submission = %result.id, grade = result.grade, "result received");
            if let Some(previous) = self.results.insert(result.id.clone(), result) {
                warn!(submission = %previous.id, "duplicate result replaced");
            }
        }
        self.results.into_values().collect()
    }
}
