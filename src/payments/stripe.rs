use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::StripeConfig;
use crate::error::{AppError, Result, msg};
use crate::models::Order;

use super::{CheckoutSession, CheckoutSessionStatus};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API: &str = "https://api.stripe.com/v1";

/// Maximum age of a webhook timestamp before it's rejected (in seconds).
/// Stripe recommends 300 seconds (5 minutes).
const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Allowed clock skew for timestamps from the future.
const WEBHOOK_FUTURE_SKEW_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct CreateCheckoutSessionResponse {
    id: String,
    url: String,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(),
            secret_key: config.secret_key.clone(),
        }
    }

    /// Open a hosted checkout session for an order.
    ///
    /// Orders are priced per request, so the line item uses ad-hoc
    /// `price_data` rather than a dashboard Price.
    pub async fn create_checkout_session(
        &self,
        order: &Order,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession> {
        let unit_amount = order.price_cents.to_string();
        let product_name = format!("Custom app: {}", order.app_name);

        let response = self
            .client
            .post(format!("{}/checkout/sessions", STRIPE_API))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[
                ("mode", "payment"),
                ("success_url", success_url),
                ("cancel_url", cancel_url),
                ("customer_email", order.customer_email.as_str()),
                ("client_reference_id", order.id.as_str()),
                ("line_items[0][quantity]", "1"),
                ("line_items[0][price_data][currency]", order.currency.as_str()),
                ("line_items[0][price_data][unit_amount]", unit_amount.as_str()),
                ("line_items[0][price_data][product_data][name]", product_name.as_str()),
                ("metadata[order_id]", order.id.as_str()),
                ("payment_intent_data[metadata][order_id]", order.id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        let session: CreateCheckoutSessionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))?;

        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }

    /// Fetch a checkout session. Returns None when Stripe does not know it.
    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CheckoutSessionStatus>> {
        let response = self
            .client
            .get(format!("{}/checkout/sessions/{}", STRIPE_API, session_id))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe API error: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        let session: StripeCheckoutSession = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))?;

        Ok(Some(CheckoutSessionStatus {
            order_id: session.order_id().map(String::from),
            id: session.id,
            payment_status: session.payment_status,
            payment_intent: session.payment_intent,
        }))
    }
}

/// Verify a `stripe-signature` header (`t=timestamp,v1=signature`).
///
/// A malformed header is an error; a stale or wrong signature is `Ok(false)`.
pub fn verify_webhook_signature(secret: &str, payload: &[u8], signature: &str) -> Result<bool> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in signature.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = Some(t);
        } else if let Some(s) = part.strip_prefix("v1=") {
            // Several v1 entries arrive during secret rotation; any may match
            signatures.push(s);
        }
    }

    let timestamp_str =
        timestamp.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;
    if signatures.is_empty() {
        return Err(AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()));
    }

    let timestamp: i64 = timestamp_str
        .parse()
        .map_err(|_| AppError::BadRequest(msg::INVALID_TIMESTAMP_IN_SIGNATURE.into()))?;

    let age = chrono::Utc::now().timestamp() - timestamp;

    if age > WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
        tracing::warn!(
            "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
            age,
            WEBHOOK_TIMESTAMP_TOLERANCE_SECS
        );
        return Ok(false);
    }

    if age < -WEBHOOK_FUTURE_SKEW_SECS {
        tracing::warn!(
            "Stripe webhook rejected: timestamp in the future (age={}s)",
            age
        );
        return Ok(false);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal(msg::INVALID_WEBHOOK_SECRET.into()))?;
    mac.update(timestamp_str.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    let expected = expected.as_bytes();

    // Signature length is not secret (always 64 hex chars for SHA-256)
    Ok(signatures.iter().any(|candidate| {
        let candidate = candidate.as_bytes();
        candidate.len() == expected.len() && bool::from(expected.ct_eq(candidate))
    }))
}

/// Generic Stripe webhook event - object is parsed based on event_type
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ============ checkout.session.* ============

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub payment_status: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: StripeMetadata,
}

impl StripeCheckoutSession {
    /// Order id from metadata, falling back to `client_reference_id`.
    pub fn order_id(&self) -> Option<&str> {
        self.metadata
            .order_id
            .as_deref()
            .or(self.client_reference_id.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StripeMetadata {
    #[serde(default)]
    pub order_id: Option<String>,
}

// ============ charge.refunded ============

#[derive(Debug, Deserialize)]
pub struct StripeCharge {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub refunded: bool,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub amount_refunded: i64,
}

impl StripeCharge {
    /// Stripe sets `refunded` only once the whole amount is returned.
    pub fn is_fully_refunded(&self) -> bool {
        self.refunded || (self.amount > 0 && self.amount_refunded >= self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_unit_test";

    fn sign(payload: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, payload).as_bytes());
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature() {
        let payload = r#"{"id":"evt_1"}"#;
        let header = sign(payload, chrono::Utc::now().timestamp());
        assert!(verify_webhook_signature(SECRET, payload.as_bytes(), &header).unwrap());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let header = sign(r#"{"id":"evt_1"}"#, chrono::Utc::now().timestamp());
        assert!(!verify_webhook_signature(SECRET, br#"{"id":"evt_2"}"#, &header).unwrap());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = r#"{"id":"evt_1"}"#;
        let header = sign(payload, chrono::Utc::now().timestamp());
        assert!(!verify_webhook_signature("whsec_other", payload.as_bytes(), &header).unwrap());
    }

    #[test]
    fn test_stale_and_future_timestamps_rejected() {
        let payload = "{}";
        let now = chrono::Utc::now().timestamp();
        let stale = sign(payload, now - WEBHOOK_TIMESTAMP_TOLERANCE_SECS - 10);
        let future = sign(payload, now + WEBHOOK_FUTURE_SKEW_SECS + 10);
        assert!(!verify_webhook_signature(SECRET, payload.as_bytes(), &stale).unwrap());
        assert!(!verify_webhook_signature(SECRET, payload.as_bytes(), &future).unwrap());
    }

    #[test]
    fn test_malformed_header_is_error() {
        assert!(verify_webhook_signature(SECRET, b"{}", "garbage").is_err());
        assert!(verify_webhook_signature(SECRET, b"{}", "t=123").is_err());
        assert!(verify_webhook_signature(SECRET, b"{}", "t=abc,v1=00").is_err());
    }

    #[test]
    fn test_checkout_session_order_id_fallback() {
        let session: StripeCheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_test_1",
            "payment_status": "paid",
            "client_reference_id": "af_ord_x"
        }))
        .unwrap();
        assert_eq!(session.order_id(), Some("af_ord_x"));
    }

    #[test]
    fn test_charge_full_refund_detection() {
        let charge = |refunded: bool, amount: i64, amount_refunded: i64| StripeCharge {
            id: "ch_1".into(),
            payment_intent: Some("pi_1".into()),
            refunded,
            amount,
            amount_refunded,
        };
        assert!(charge(true, 0, 0).is_fully_refunded());
        assert!(charge(false, 5000, 5000).is_fully_refunded());
        assert!(!charge(false, 5000, 1000).is_fully_refunded());
        assert!(!charge(false, 0, 0).is_fully_refunded());
    }

    #[test]
    fn test_any_v1_signature_may_match() {
        let payload = r#"{"id":"evt_rotated"}"#;
        let now = chrono::Utc::now().timestamp();
        let valid = sign(payload, now);
        let valid_sig = valid.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", now, "0".repeat(64), valid_sig);
        assert!(verify_webhook_signature(SECRET, payload.as_bytes(), &header).unwrap());

        let header = format!("t={},v1={},v1=abc", now, "0".repeat(64));
        assert!(!verify_webhook_signature(SECRET, payload.as_bytes(), &header).unwrap());
    }
}
