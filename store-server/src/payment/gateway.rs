//! Payment gateway adapter
//!
//! Builds outbound redirect payloads and verifies inbound notification
//! signatures. The signature is a SHA-256 digest over `k=v` pairs sorted
//! by key and joined with `&`, with the shared passphrase appended; the
//! `signature` field itself is always excluded from the digest.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

use shared::order::Order;

/// Gateway credentials shared with the payment provider
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub merchant_id: String,
    pub merchant_key: String,
    pub passphrase: String,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            merchant_id: std::env::var("GATEWAY_MERCHANT_ID")
                .unwrap_or_else(|_| "10000100".into()),
            merchant_key: std::env::var("GATEWAY_MERCHANT_KEY")
                .unwrap_or_else(|_| "46f0cd694581a".into()),
            passphrase: std::env::var("GATEWAY_PASSPHRASE")
                .unwrap_or_else(|_| "dev-passphrase".into()),
        }
    }
}

/// Compute the signature over all fields except `signature` itself
pub fn compute_signature<'a, I>(fields: I, passphrase: &str) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    // BTreeMap gives the deterministic key ordering the digest requires
    let sorted: BTreeMap<&String, &String> =
        fields.into_iter().filter(|(k, _)| *k != "signature").collect();
    let mut payload = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    payload.push_str("&passphrase=");
    payload.push_str(passphrase);

    let digest = Sha256::digest(payload.as_bytes());
    hex::encode(digest)
}

/// Verify the `signature` field of an inbound notification
pub fn verify_signature(fields: &HashMap<String, String>, passphrase: &str) -> bool {
    let Some(presented) = fields.get("signature") else {
        return false;
    };
    let expected = compute_signature(fields.iter(), passphrase);
    // Case-insensitive hex compare; gateways differ in casing
    presented.eq_ignore_ascii_case(&expected)
}

/// Signed redirect payload for the gateway's hosted payment page
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaymentRequest {
    pub fields: BTreeMap<String, String>,
}

impl PaymentRequest {
    /// Build the outbound payment request for an order
    pub fn build(
        order: &Order,
        return_url: &str,
        cancel_url: &str,
        notify_url: &str,
        config: &GatewayConfig,
    ) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("merchant_id".to_string(), config.merchant_id.clone());
        fields.insert("merchant_key".to_string(), config.merchant_key.clone());
        fields.insert("return_url".to_string(), return_url.to_string());
        fields.insert("cancel_url".to_string(), cancel_url.to_string());
        fields.insert("notify_url".to_string(), notify_url.to_string());
        fields.insert("m_payment_id".to_string(), order.order_number.clone());
        fields.insert("amount".to_string(), format!("{:.2}", order.total));
        fields.insert(
            "item_name".to_string(),
            format!("Order {}", order.order_number),
        );

        let signature = compute_signature(fields.iter(), &config.passphrase);
        fields.insert("signature".to_string(), signature);
        Self { fields }
    }
}
