//! Durable idempotency record for inbound webhook deliveries

use serde::{Deserialize, Serialize};

/// Webhook processing status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookStatus {
    #[default]
    Pending,
    Processing,
    Processed,
    Failed,
}

/// Maximum effect attempts before a delivery is terminally rejected
pub const WEBHOOK_MAX_RETRIES: u32 = 5;

/// At-least-once-delivery / at-most-once-effect envelope record.
///
/// Keyed by the external event id; the raw payload is retained for
/// idempotency and audit only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookEvent {
    /// External event id, unique
    pub event_id: String,
    pub event_type: String,
    pub source: String,
    pub raw_payload: String,
    pub status: WebhookStatus,
    #[serde(default)]
    pub retry_count: u32,
    /// Exponential backoff: now + 2^(retry_count-1) minutes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub received_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<i64>,
}

impl WebhookEvent {
    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= WEBHOOK_MAX_RETRIES
    }

    /// Due for a retry sweep pass?
    pub fn is_retry_due(&self, now: i64) -> bool {
        self.status == WebhookStatus::Failed
            && !self.retries_exhausted()
            && self.next_retry_at.is_some_and(|t| t <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(status: WebhookStatus, retry_count: u32, next_retry_at: Option<i64>) -> WebhookEvent {
        WebhookEvent {
            event_id: "evt-1".to_string(),
            event_type: "payment.notify".to_string(),
            source: "gateway".to_string(),
            raw_payload: String::new(),
            status,
            retry_count,
            next_retry_at,
            last_error: None,
            received_at: 0,
            processed_at: None,
        }
    }

    #[test]
    fn test_retries_exhausted() {
        assert!(!event(WebhookStatus::Failed, 4, None).retries_exhausted());
        assert!(event(WebhookStatus::Failed, 5, None).retries_exhausted());
    }

    #[test]
    fn test_retry_due() {
        assert!(event(WebhookStatus::Failed, 1, Some(100)).is_retry_due(100));
        assert!(!event(WebhookStatus::Failed, 1, Some(100)).is_retry_due(99));
        assert!(!event(WebhookStatus::Failed, 5, Some(100)).is_retry_due(200));
        assert!(!event(WebhookStatus::Processed, 1, Some(100)).is_retry_due(200));
    }
}
