//! Durable delivery envelope for inbound webhooks
//!
//! At-least-once delivery, at-most-once effect. Every delivery is keyed by
//! its external event id:
//!
//! - PROCESSED          → short-circuit success, effect not re-run
//! - PROCESSING         → reject (a concurrent handler owns it)
//! - FAILED, ≥5 retries → reject terminal, manual intervention required
//! - otherwise          → mark PROCESSING, run the effect, mark
//!                        PROCESSED or FAILED with exponential backoff
//!
//! The status flip to PROCESSING commits before the effect runs, so a
//! second delivery arriving mid-flight observes PROCESSING and backs off.

use shared::util::MINUTE_MS;
use shared::webhook::{WebhookEvent, WebhookStatus};

use crate::orders::storage::LedgerStorage;
use crate::orders::traits::OrderResult;

/// How an inbound delivery was handled
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<T> {
    /// The effect ran (first delivery, or a due retry)
    Fresh(T),
    /// Already processed; effect skipped
    AlreadyProcessed,
    /// Another handler is processing this event right now
    ConcurrentlyProcessing,
    /// Retries exhausted; terminally rejected
    RetriesExhausted,
}

/// Exponential backoff: `now + 2^(retry_count-1)` minutes
fn next_retry_at(now: i64, retry_count: u32) -> i64 {
    let exponent = retry_count.saturating_sub(1).min(30);
    now + (1i64 << exponent) * MINUTE_MS
}

/// Run `effect` exactly once for the event id.
pub async fn process_delivery<F, Fut, T>(
    storage: &LedgerStorage,
    event_id: &str,
    event_type: &str,
    source: &str,
    raw_payload: &str,
    now: i64,
    effect: F,
) -> OrderResult<Delivery<T>>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = OrderResult<T>>,
{
    // Claim the event: the PROCESSING flip and the status checks commit
    // atomically, so exactly one handler wins a concurrent delivery.
    let mut event = {
        let txn = storage.begin_write()?;
        let existing = storage.load_webhook_event(&txn, event_id)?;
        let mut event = match existing {
            Some(event) => match event.status {
                WebhookStatus::Processed => return Ok(Delivery::AlreadyProcessed),
                WebhookStatus::Processing => return Ok(Delivery::ConcurrentlyProcessing),
                WebhookStatus::Failed if event.retries_exhausted() => {
                    tracing::warn!(
                        event_id = %event_id,
                        retry_count = event.retry_count,
                        "Webhook delivery terminally rejected"
                    );
                    return Ok(Delivery::RetriesExhausted);
                }
                _ => event,
            },
            None => WebhookEvent {
                event_id: event_id.to_string(),
                event_type: event_type.to_string(),
                source: source.to_string(),
                raw_payload: raw_payload.to_string(),
                status: WebhookStatus::Pending,
                retry_count: 0,
                next_retry_at: None,
                last_error: None,
                received_at: now,
                processed_at: None,
            },
        };
        event.status = WebhookStatus::Processing;
        storage.store_webhook_event(&txn, &event)?;
        txn.commit().map_err(crate::orders::StorageError::from)?;
        event
    };

    match effect().await {
        Ok(value) => {
            event.status = WebhookStatus::Processed;
            event.processed_at = Some(now);
            event.last_error = None;
            event.next_retry_at = None;
            let txn = storage.begin_write()?;
            storage.store_webhook_event(&txn, &event)?;
            txn.commit().map_err(crate::orders::StorageError::from)?;
            Ok(Delivery::Fresh(value))
        }
        Err(err) => {
            event.status = WebhookStatus::Failed;
            event.retry_count += 1;
            event.next_retry_at = Some(next_retry_at(now, event.retry_count));
            event.last_error = Some(err.to_string());
            let txn = storage.begin_write()?;
            storage.store_webhook_event(&txn, &event)?;
            txn.commit().map_err(crate::orders::StorageError::from)?;

            tracing::error!(
                event_id = %event_id,
                retry_count = event.retry_count,
                error = %err,
                "Webhook effect failed, scheduled for retry"
            );
            Err(err)
        }
    }
}

/// Re-run every FAILED delivery whose backoff has elapsed.
///
/// Returns (succeeded, still_failing). Exposed to the external scheduler
/// through the admin sweep endpoint.
pub async fn retry_sweep<F, Fut, T>(
    storage: &LedgerStorage,
    now: i64,
    mut handler: F,
) -> OrderResult<(usize, usize)>
where
    F: FnMut(WebhookEvent) -> Fut,
    Fut: std::future::Future<Output = OrderResult<T>>,
{
    let due = storage.due_webhook_retries(now)?;
    let mut succeeded = 0;
    let mut still_failing = 0;

    for event in due {
        let event_id = event.event_id.clone();
        let event_type = event.event_type.clone();
        let source = event.source.clone();
        let raw_payload = event.raw_payload.clone();
        let result = process_delivery(
            storage,
            &event_id,
            &event_type,
            &source,
            &raw_payload,
            now,
            || handler(event),
        )
        .await;
        match result {
            Ok(_) => succeeded += 1,
            Err(err) => {
                still_failing += 1;
                tracing::warn!(event_id = %event_id, error = %err, "Webhook retry failed");
            }
        }
    }

    if succeeded > 0 || still_failing > 0 {
        tracing::info!(succeeded, still_failing, "Webhook retry sweep completed");
    }
    Ok((succeeded, still_failing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::traits::OrderError;

    async fn deliver_ok(storage: &LedgerStorage, event_id: &str, now: i64) -> Delivery<u32> {
        process_delivery(storage, event_id, "payment.notify", "gateway", "{}", now, || async {
            Ok(42u32)
        })
        .await
        .unwrap()
    }

    async fn deliver_err(storage: &LedgerStorage, event_id: &str, now: i64) -> OrderError {
        process_delivery::<_, _, u32>(
            storage,
            event_id,
            "payment.notify",
            "gateway",
            "{}",
            now,
            || async { Err(OrderError::Internal("boom".to_string())) },
        )
        .await
        .unwrap_err()
    }

    #[tokio::test]
    async fn test_first_delivery_runs_effect() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        assert_eq!(deliver_ok(&storage, "evt-1", 1_000).await, Delivery::Fresh(42));

        let event = storage.get_webhook_event("evt-1").unwrap().unwrap();
        assert_eq!(event.status, WebhookStatus::Processed);
        assert_eq!(event.processed_at, Some(1_000));
    }

    #[tokio::test]
    async fn test_replay_short_circuits() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        deliver_ok(&storage, "evt-1", 1_000).await;
        assert_eq!(
            deliver_ok(&storage, "evt-1", 2_000).await,
            Delivery::AlreadyProcessed
        );
    }

    #[tokio::test]
    async fn test_concurrent_delivery_rejected() {
        let storage = LedgerStorage::open_in_memory().unwrap();

        // Simulate a crashed/running handler that left the event PROCESSING
        let txn = storage.begin_write().unwrap();
        storage
            .store_webhook_event(
                &txn,
                &WebhookEvent {
                    event_id: "evt-1".to_string(),
                    event_type: "payment.notify".to_string(),
                    source: "gateway".to_string(),
                    raw_payload: "{}".to_string(),
                    status: WebhookStatus::Processing,
                    retry_count: 0,
                    next_retry_at: None,
                    last_error: None,
                    received_at: 0,
                    processed_at: None,
                },
            )
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(
            deliver_ok(&storage, "evt-1", 1_000).await,
            Delivery::ConcurrentlyProcessing
        );
    }

    #[tokio::test]
    async fn test_failure_schedules_exponential_backoff() {
        let storage = LedgerStorage::open_in_memory().unwrap();

        deliver_err(&storage, "evt-1", 1_000).await;
        let event = storage.get_webhook_event("evt-1").unwrap().unwrap();
        assert_eq!(event.status, WebhookStatus::Failed);
        assert_eq!(event.retry_count, 1);
        // 2^0 minutes
        assert_eq!(event.next_retry_at, Some(1_000 + MINUTE_MS));

        deliver_err(&storage, "evt-1", 2_000).await;
        let event = storage.get_webhook_event("evt-1").unwrap().unwrap();
        assert_eq!(event.retry_count, 2);
        // 2^1 minutes
        assert_eq!(event.next_retry_at, Some(2_000 + 2 * MINUTE_MS));
    }

    #[tokio::test]
    async fn test_exhausted_retries_terminally_rejected() {
        let storage = LedgerStorage::open_in_memory().unwrap();

        let mut now = 0;
        for _ in 0..5 {
            now += 100 * MINUTE_MS;
            deliver_err(&storage, "evt-1", now).await;
        }

        assert_eq!(
            deliver_ok(&storage, "evt-1", now + 1_000 * MINUTE_MS).await,
            Delivery::RetriesExhausted
        );
    }

    #[tokio::test]
    async fn test_retry_sweep_recovers_due_failures() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        deliver_err(&storage, "evt-1", 1_000).await;

        // Not yet due
        let (succeeded, _) = retry_sweep(&storage, 1_500, |_| async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(succeeded, 0);

        // Past the backoff
        let (succeeded, still_failing) =
            retry_sweep(&storage, 1_000 + MINUTE_MS, |_| async { Ok(()) })
                .await
                .unwrap();
        assert_eq!(succeeded, 1);
        assert_eq!(still_failing, 0);

        let event = storage.get_webhook_event("evt-1").unwrap().unwrap();
        assert_eq!(event.status, WebhookStatus::Processed);
    }
}
