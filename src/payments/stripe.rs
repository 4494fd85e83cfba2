use crate::{config::AppConfig, entities::IntentLineItem, errors::ServiceError};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use tracing::warn;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Allowed clock skew for webhook timestamps from the future (seconds).
const FUTURE_SKEW_TOLERANCE_SECS: i64 = 60;

/// Provider-assigned checkout session handle.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSessionHandle {
    pub id: String,
    pub url: String,
}

/// Thin client for the Stripe Checkout Sessions API and webhook verification.
///
/// Uses Stripe's pre-configured prices (`price_...`) instead of ad-hoc
/// `price_data`, so all payment products stay organized in the Stripe
/// dashboard.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: Option<String>,
    webhook_secret: Option<String>,
    tolerance_secs: u64,
}

impl StripeClient {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.stripe_api_base.trim_end_matches('/').to_string(),
            secret_key: config.stripe_secret_key.clone(),
            webhook_secret: config.stripe_webhook_secret.clone(),
            tolerance_secs: config.payment_webhook_tolerance_secs,
        }
    }

    /// Create a Stripe checkout session for the intent's line items.
    ///
    /// The intent id rides along twice: as `metadata[orderId]` so the webhook
    /// can correlate the settlement back to the intent, and as the
    /// `Idempotency-Key` header so a duplicate fulfillment dispatch cannot
    /// mint two sessions.
    pub async fn create_checkout_session(
        &self,
        intent_id: Uuid,
        items: &[IntentLineItem],
        success_url: &str,
        cancel_url: &str,
    ) -> Result<StripeSessionHandle, ServiceError> {
        let secret_key = self.secret_key.as_deref().ok_or_else(|| {
            ServiceError::ConfigurationError("stripe_secret_key is not configured".to_string())
        })?;

        let mut form: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), success_url.to_string()),
            ("cancel_url".to_string(), cancel_url.to_string()),
            (
                "payment_method_types[0]".to_string(),
                "card".to_string(),
            ),
            ("metadata[orderId]".to_string(), intent_id.to_string()),
        ];
        for (idx, item) in items.iter().enumerate() {
            form.push((format!("line_items[{}][price]", idx), item.price.clone()));
            form.push((
                format!("line_items[{}][quantity]", idx),
                item.quantity.to_string(),
            ));
        }

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .basic_auth(secret_key, None::<&str>)
            .header("Idempotency-Key", intent_id.to_string())
            .form(&form)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::ExternalServiceError(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        response.json::<StripeSessionHandle>().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("Failed to parse Stripe response: {}", e))
        })
    }

    /// Verify a webhook signature and deserialize the event.
    ///
    /// Any verification failure (missing secret, malformed header, stale
    /// timestamp, digest mismatch, invalid JSON) is a single failure class;
    /// the returned message is echoed back to the provider with HTTP 400.
    pub fn construct_event(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeWebhookEvent, ServiceError> {
        self.verify_webhook_signature(payload, signature_header)?;

        serde_json::from_slice(payload)
            .map_err(|e| ServiceError::BadRequest(format!("invalid webhook payload: {}", e)))
    }

    /// Verify the `stripe-signature` header (`t=<ts>,v1=<hex hmac>`) against
    /// the configured signing secret.
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<(), ServiceError> {
        let webhook_secret = self.webhook_secret.as_deref().ok_or_else(|| {
            ServiceError::BadRequest("missing stripe signature or webhook secret".to_string())
        })?;

        let mut timestamp = None;
        let mut sig_v1 = None;
        for part in signature_header.split(',') {
            if let Some(t) = part.strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.strip_prefix("v1=") {
                sig_v1 = Some(s);
            }
        }

        let timestamp_str = timestamp
            .ok_or_else(|| ServiceError::BadRequest("invalid signature format".to_string()))?;
        let sig_v1 = sig_v1
            .ok_or_else(|| ServiceError::BadRequest("invalid signature format".to_string()))?;

        // Reject stale timestamps to prevent replayed deliveries.
        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| ServiceError::BadRequest("invalid timestamp in signature".to_string()))?;
        let age = chrono::Utc::now().timestamp() - timestamp;
        if age > self.tolerance_secs as i64 {
            warn!(
                "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
                age, self.tolerance_secs
            );
            return Err(ServiceError::BadRequest(
                "webhook timestamp outside of tolerance".to_string(),
            ));
        }
        if age < -FUTURE_SKEW_TOLERANCE_SECS {
            warn!(
                "Stripe webhook rejected: timestamp in the future (age={}s)",
                age
            );
            return Err(ServiceError::BadRequest(
                "webhook timestamp outside of tolerance".to_string(),
            ));
        }

        let signed_payload = format!("{}.{}", timestamp_str, String::from_utf8_lossy(payload));
        let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())
            .map_err(|_| ServiceError::InternalError("invalid webhook secret".to_string()))?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        if !constant_time_eq(&expected, sig_v1) {
            return Err(ServiceError::BadRequest(
                "webhook signature mismatch".to_string(),
            ));
        }

        Ok(())
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    // Length is not secret: v1 signatures are always 64 hex chars for SHA-256.
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

/// Generic Stripe webhook event - object is parsed based on event type
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ============ checkout.session.completed ============

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub amount_total: Option<i64>,
    pub customer_email: Option<String>,
    pub customer_details: Option<StripeCustomerDetails>,
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: Option<StripeMetadata>,
}

impl StripeCheckoutSession {
    /// Email entered during checkout, preferring the session-level field.
    pub fn email(&self) -> Option<String> {
        self.customer_email
            .clone()
            .or_else(|| self.customer_details.as_ref().and_then(|d| d.email.clone()))
    }

    pub fn order_id(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.order_id.as_deref())
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeCustomerDetails {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeMetadata {
    #[serde(rename = "orderId")]
    pub order_id: Option<String>,
}

// ============ payment_intent.succeeded ============

#[derive(Debug, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    #[serde(default)]
    pub metadata: Option<StripeMetadata>,
}

impl StripePaymentIntent {
    pub fn order_id(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.order_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(webhook_secret: Option<&str>) -> StripeClient {
        let mut cfg = AppConfig::new("sqlite::memory:", "127.0.0.1", 0, "test");
        cfg.stripe_secret_key = Some("sk_test_123".to_string());
        cfg.stripe_webhook_secret = webhook_secret.map(|s| s.to_string());
        StripeClient::from_config(&cfg)
    }

    fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let signed = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed.as_bytes());
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_is_accepted() {
        let client = test_client(Some("whsec_test"));
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = sign("whsec_test", chrono::Utc::now().timestamp(), payload);

        assert!(client.verify_webhook_signature(payload, &header).is_ok());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let client = test_client(Some("whsec_test"));
        let header = sign(
            "whsec_test",
            chrono::Utc::now().timestamp(),
            br#"{"amount":100}"#,
        );

        let err = client
            .verify_webhook_signature(br#"{"amount":999}"#, &header)
            .unwrap_err();
        assert!(err.to_string().contains("signature mismatch"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let client = test_client(Some("whsec_real"));
        let payload = br#"{}"#;
        let header = sign("whsec_other", chrono::Utc::now().timestamp(), payload);

        assert!(client.verify_webhook_signature(payload, &header).is_err());
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let client = test_client(Some("whsec_test"));
        let payload = br#"{}"#;
        let header = sign(
            "whsec_test",
            chrono::Utc::now().timestamp() - 3_600,
            payload,
        );

        let err = client.verify_webhook_signature(payload, &header).unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn malformed_header_is_rejected() {
        let client = test_client(Some("whsec_test"));
        assert!(client
            .verify_webhook_signature(br#"{}"#, "not-a-signature")
            .is_err());
        assert!(client.verify_webhook_signature(br#"{}"#, "t=abc,v1=").is_err());
    }

    #[test]
    fn missing_webhook_secret_is_rejected() {
        let client = test_client(None);
        let err = client
            .verify_webhook_signature(br#"{}"#, "t=1,v1=deadbeef")
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("missing stripe signature or webhook secret"));
    }

    #[test]
    fn construct_event_parses_verified_payload() {
        let client = test_client(Some("whsec_test"));
        let payload = serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_test_1",
                    "amount_total": 4999,
                    "customer_email": "a@b.com",
                    "metadata": { "orderId": "9f8d8b0a-0000-0000-0000-000000000001" }
                }
            }
        })
        .to_string();
        let header = sign("whsec_test", chrono::Utc::now().timestamp(), payload.as_bytes());

        let event = client
            .construct_event(payload.as_bytes(), &header)
            .expect("event should verify and parse");
        assert_eq!(event.event_type, "checkout.session.completed");

        let session: StripeCheckoutSession =
            serde_json::from_value(event.data.object).expect("session should parse");
        assert_eq!(session.amount_total, Some(4999));
        assert_eq!(session.email().as_deref(), Some("a@b.com"));
        assert_eq!(
            session.order_id(),
            Some("9f8d8b0a-0000-0000-0000-000000000001")
        );
    }

    #[test]
    fn constant_time_eq_basic_cases() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
