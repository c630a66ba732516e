//! Bounded-concurrency batch extraction.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::credentials::Credentials;
use super::error::ExtractError;
use super::models::BatchResult;
use super::url::parse_post_url;
use super::Extractor;

/// Extract every URL, at most `max_in_flight` at a time.
///
/// Outcomes are reported in input order regardless of completion order. A
/// failure of any kind stays with its own URL. Dropping the returned future
/// stops new fetches from starting; fetches already sent run to completion
/// or timeout in the background.
pub async fn run_batch(
    extractor: &Extractor,
    urls: &[String],
    creds: &Credentials,
    max_in_flight: usize,
) -> BatchResult {
    run_batch_until(extractor, urls, creds, max_in_flight, CancellationToken::new()).await
}

/// Like [`run_batch`], but also stops issuing fetches once `cancel` fires.
///
/// Items that had not acquired a slot by then fail with `Cancelled`.
pub async fn run_batch_until(
    extractor: &Extractor,
    urls: &[String],
    creds: &Credentials,
    max_in_flight: usize,
    cancel: CancellationToken,
) -> BatchResult {
    if urls.is_empty() {
        return BatchResult::empty();
    }

    info!(count = urls.len(), max_in_flight, "Starting batch extraction");

    let semaphore = Arc::new(Semaphore::new(max_in_flight.max(1)));
    // Cancels queued items if this future is dropped mid-batch.
    let guard = cancel.clone().drop_guard();

    let mut handles = Vec::with_capacity(urls.len());
    for (index, url) in urls.iter().enumerate() {
        let extractor = extractor.clone();
        let creds = creds.clone();
        let url = url.clone();
        let semaphore = semaphore.clone();
        let cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let descriptor = parse_post_url(&url)?;

            let _permit = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ExtractError::Cancelled),
                permit = semaphore.acquire_owned() => permit
                    .map_err(|_| ExtractError::Cancelled)?,
            };

            debug!(index, post_id = %descriptor.post_id, "Batch item acquired a slot");
            extractor.extract_descriptor(&descriptor, &creds).await
        });
        handles.push(handle);
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (url, handle) in urls.iter().zip(handles) {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(url = %url, "Batch task failed: {e}");
                Err(ExtractError::Internal(format!("worker task failed: {e}")))
            }
        };
        outcomes.push((url.clone(), outcome));
    }

    guard.disarm();

    let result = BatchResult::from_outcomes(outcomes);
    info!(
        total = result.total,
        succeeded = result.successes.len(),
        failed = result.failures.len(),
        "Batch extraction finished"
    );
    result
}
