//! Resubmission of objects the store rejected.
//!
//! Each iteration copies the current failure list, opens a fresh batch (which
//! clears the list) and resubmits every failure with its original id. The
//! loop ends when a flush reports no failures. It aborts when two consecutive
//! iterations end with the same failure count, or when `max_iterations` is
//! exhausted.

use tracing::{info, warn};

use super::progress::ProgressReporter;
use super::{IngestState, RunState};
use crate::error::{IngestError, Result};
use crate::store::batch::{BatchSink, FailedSubmission};

/// Stuck records logged (and returned) when aborting.
const STUCK_SAMPLE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_iterations: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_iterations: 10 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryOutcome {
    pub iterations: u32,
    pub resubmitted: u64,
}

fn log_stuck(label: &str, stuck: &[FailedSubmission]) {
    for failed in stuck.iter().take(STUCK_SAMPLE) {
        warn!(
            target = "retry",
            file = label,
            id = %failed.id,
            reason = %failed.message,
            properties = %serde_json::Value::Object(failed.properties.clone()),
            "stuck object"
        );
    }
}

fn stuck_error(sink: &BatchSink<'_>, state: &mut RunState) -> IngestError {
    let failed = sink.failed_objects();
    log_stuck(state.label(), failed);
    state.advance(IngestState::StuckAborted);
    IngestError::StuckRetry {
        remaining: failed.len(),
        stuck: failed.iter().take(STUCK_SAMPLE).cloned().collect(),
    }
}

/// Drive retries until the sink reports zero failures.
pub(crate) async fn retry_failed(
    sink: &mut BatchSink<'_>,
    policy: RetryPolicy,
    progress: &mut ProgressReporter,
    state: &mut RunState,
) -> Result<RetryOutcome> {
    let mut outcome = RetryOutcome::default();
    let mut previous_after: Option<usize> = None;

    loop {
        if sink.failed_objects().is_empty() {
            info!(target = "retry", file = state.label(), "all records imported successfully");
            return Ok(outcome);
        }
        if outcome.iterations >= policy.max_iterations {
            warn!(
                target = "retry",
                file = state.label(),
                iterations = outcome.iterations,
                "retry limit reached"
            );
            return Err(stuck_error(sink, state));
        }

        // opening the next batch clears the sink's list
        let failures = sink.failed_objects().to_vec();
        let attempted = failures.len();
        outcome.iterations += 1;
        state.advance(IngestState::RetryPending(outcome.iterations));
        info!(
            target = "retry",
            file = state.label(),
            iteration = outcome.iterations,
            count = attempted,
            "retrying failed objects"
        );

        let mut batch = sink.open_batch();
        for failed in failures {
            batch.add(failed.properties, Some(failed.id)).await;
            outcome.resubmitted += 1;
            progress.record_retried();
        }
        let after = batch.finish().await;
        state.advance(IngestState::Flushed);

        if previous_after == Some(after) {
            warn!(
                target = "retry",
                file = state.label(),
                remaining = after,
                "failure count unchanged across consecutive retries"
            );
            return Err(stuck_error(sink, state));
        }
        if after == attempted {
            // nothing went through this round; surface what is stuck
            log_stuck(state.label(), sink.failed_objects());
        }
        previous_after = Some(after);
    }
}
