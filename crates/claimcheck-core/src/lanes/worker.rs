use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::Slot;
use crate::envelope::Envelope;
use crate::error::SourceError;
use crate::metrics;

/// Run one capability call under the worker deadline and wrap its outcome.
///
/// The payload is passed through untouched; failures and deadline overruns
/// become error envelopes.
pub(crate) async fn run_worker<T, F>(
    slot: Slot,
    query: impl Into<String>,
    deadline: Duration,
    call: F,
) -> Envelope<T>
where
    F: Future<Output = Result<T, SourceError>>,
{
    let query = query.into();
    let started = Instant::now();
    debug!(lane = %slot.lane(), slot = slot.name(), "worker started");

    let result = match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::Timeout(deadline.as_millis() as u64)),
    };
    let status = outcome_label(&result);
    let envelope = Envelope::from_result(query, result);
    let elapsed = started.elapsed();

    metrics::record_worker_call(slot, status, elapsed);
    match (status, envelope.error_message()) {
        (_, None) => debug!(
            lane = %slot.lane(),
            slot = slot.name(),
            elapsed_ms = elapsed.as_millis() as u64,
            "worker finished"
        ),
        ("unconfigured", Some(error)) => warn!(
            lane = %slot.lane(),
            slot = slot.name(),
            %error,
            "worker skipped: data source not configured"
        ),
        (_, Some(error)) => warn!(
            lane = %slot.lane(),
            slot = slot.name(),
            elapsed_ms = elapsed.as_millis() as u64,
            %error,
            "worker failed"
        ),
    }

    envelope
}

/// Metric and log label for one call; configuration gaps are kept apart
/// from remote failures.
fn outcome_label<T>(result: &Result<T, SourceError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(error) if error.is_configuration() => "unconfigured",
        Err(_) => "error",
    }
}
