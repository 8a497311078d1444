//! Worker pool for a grading run
//!
//! Each submission is graded by its own task. At most `workers` tasks run at
//! once; results flow to a single [`Aggregator`] over a channel. Cancellation
//! is checked before a submission starts, never in the middle of one.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::Aggregator;
use crate::config::ConfigError;
use crate::fixtures::FixtureError;
use crate::report::ReportError;
use crate::submissions::SubmissionError;
use crate::types::{SubmissionResult, SubmissionUnit};

/// Errors that abort a whole grading run
#[derive(Debug, Error)]
pub enum GradeError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("fixture error: {0}")]
    Fixture(#[from] FixtureError),

    #[error("submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("report error: {0}")]
    Report(#[from] ReportError),

    #[error("grading cancelled after {graded} of {total} submissions")]
    Cancelled { graded: usize, total: usize },

    #[error("grading worker failed: {0}")]
    Worker(String),
}

/// Grades one submission end to end
///
/// Implementations capture every per-submission failure in the returned
/// result.
pub trait SubmissionGrader: Send + Sync + 'static {
    fn grade(&self, submission: SubmissionUnit) -> impl Future<Output = SubmissionResult> + Send;
}

/// Grade every submission with at most `workers` in flight
///
/// Returns the results sorted by submission id. If `cancel` fires before
/// every submission was graded the run fails with
/// [`GradeError::Cancelled`]; a partial batch is never returned.
#[instrument(skip(grader, submissions, cancel), fields(submissions = submissions.len()))]
pub async fn grade_all<G: SubmissionGrader>(
    grader: Arc<G>,
    submissions: Vec<SubmissionUnit>,
    workers: usize,
    cancel: &CancellationToken,
) -> Result<Vec<SubmissionResult>, GradeError> {
    let total = submissions.len();
    let workers = workers.max(1);
    let semaphore = Arc::new(Semaphore::new(workers));
    let (sender, aggregator) = Aggregator::channel(workers);
    let collector = tokio::spawn(aggregator.collect());

    info!(total, workers, "grading started");

    let mut handles = Vec::with_capacity(total);
    for submission in submissions {
        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                warn!("cancellation requested, no further submissions dispatched");
                break;
            }
            permit = Arc::clone(&semaphore).acquire_owned() => permit
                .map_err(|err| GradeError::Worker(err.to_string()))?,
        };

        let grader = Arc::clone(&grader);
        let sender = sender.clone();
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let _permit = permit;
            if cancel.is_cancelled() {
                debug!(submission = %submission.id, "skipped after cancellation");
                return;
            }
            let result = grader.grade(submission).await;
            if sender.send(result).await.is_err() {
                warn!("aggregator stopped before result was delivered");
            }
        }));
    }
    drop(sender);

    for handle in handles {
        handle
            .await
            .map_err(|err| GradeError::Worker(err.to_string()))?;
    }
    let results = collector
        .await
        .map_err(|err| GradeError::Worker(err.to_string()))?;

    if results.len() != total {
        if cancel.is_cancelled() {
            return Err(GradeError::Cancelled {
                graded: results.len(),
                total,
            });
        }
        return Err(GradeError::Worker(format!(
            "{} of {total} submissions produced no result",
            total - results.len()
        )));
    }

    info!(total, "grading finished");
    Ok(results)
}
