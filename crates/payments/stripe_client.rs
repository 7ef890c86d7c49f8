use std::{collections::HashMap, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::error;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Oldest accepted `t=` timestamp on a webhook signature.
/// https://docs.stripe.com/webhooks#replay-attacks
const WEBHOOK_TOLERANCE_SECS: i64 = 300;
/// Clock skew allowed for timestamps from the future.
const WEBHOOK_FUTURE_SKEW_SECS: i64 = 60;

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

impl StripeEvent {
    /// Decodes an already-verified webhook body.
    pub fn from_payload(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: Option<String>,
    pub payment_status: Option<String>,
    pub payment_intent: Option<String>,
    pub client_reference_id: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub status: Option<String>,
    pub amount_received: Option<i64>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

/// Everything needed to open a one-off hosted Checkout session for a single line item.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSessionRequest {
    pub currency: String,
    pub unit_amount: i64,
    pub product_name: String,
    pub product_description: String,
    pub success_url: String,
    pub cancel_url: String,
    pub client_reference_id: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedCheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum StripeApiError {
    /// Stripe answered with a non-2xx status. `message` is Stripe's own explanation.
    #[error("{message}")]
    Rejected {
        status: u16,
        message: String,
        request_id: Option<String>,
    },
    #[error("stripe request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected stripe response: {0}")]
    UnexpectedResponse(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing timestamp in stripe-signature")]
    MissingTimestamp,
    #[error("missing v1 signature in stripe-signature")]
    MissingSignature,
    #[error("invalid timestamp in stripe-signature")]
    InvalidTimestamp,
    #[error("stripe-signature timestamp outside tolerance (age {age_secs}s)")]
    TimestampOutsideTolerance { age_secs: i64 },
    #[error("no v1 signature matches the payload")]
    Mismatch,
}

impl StripeClient {
    pub fn new(
        secret_key: String,
        webhook_secret: String,
        api_base: String,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build stripe http client")?;

        Ok(Self {
            http,
            secret_key,
            webhook_secret,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> std::result::Result<reqwest::Response, StripeApiError> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            context = %context,
            "stripe api request failed"
        );

        let message = details
            .and_then(|d| d.message)
            .unwrap_or_else(|| format!("Stripe API request failed: {context} (status {status})"));

        Err(StripeApiError::Rejected {
            status: status.as_u16(),
            message,
            request_id,
        })
    }

    /// Creates a one-time payment Checkout Session.
    /// https://docs.stripe.com/api/checkout/sessions/create
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> std::result::Result<CreatedCheckoutSession, StripeApiError> {
        let body = Self::checkout_session_form(request);

        let resp = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create checkout session").await?;

        #[derive(Deserialize)]
        struct CheckoutResp {
            id: String,
            url: Option<String>,
        }

        let parsed: CheckoutResp = resp.json().await?;
        let url = parsed.url.ok_or_else(|| {
            StripeApiError::UnexpectedResponse("checkout session URL is missing".to_string())
        })?;

        Ok(CreatedCheckoutSession { id: parsed.id, url })
    }

    fn checkout_session_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
        let mut body: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                request.currency.to_ascii_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                request.unit_amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                request.product_name.clone(),
            ),
            (
                "line_items[0][price_data][product_data][description]".to_string(),
                request.product_description.clone(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            (
                "client_reference_id".to_string(),
                request.client_reference_id.clone(),
            ),
        ];

        // The same metadata goes on the payment intent so `payment_intent.*` events can be
        // correlated even when they arrive before the checkout completion.
        let mut metadata: Vec<_> = request.metadata.iter().collect();
        metadata.sort();
        for (key, value) in metadata {
            body.push((format!("metadata[{}]", key), value.clone()));
            body.push((
                format!("payment_intent_data[metadata][{}]", key),
                value.clone(),
            ));
        }

        body
    }

    /// Checks the `Stripe-Signature` header against the raw body. Decoding the event is
    /// left to the caller.
    /// https://docs.stripe.com/webhooks#verify-manually
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> std::result::Result<(), SignatureError> {
        self.verify_webhook_signature_at(payload, signature_header, Utc::now().timestamp())
    }

    fn verify_webhook_signature_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> std::result::Result<(), SignatureError> {
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',') {
            let part = part.trim();
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest);
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signatures.push(rest);
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
        if signatures.is_empty() {
            return Err(SignatureError::MissingSignature);
        }

        let signed_at: i64 = timestamp
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;
        let age_secs = now - signed_at;
        if age_secs > WEBHOOK_TOLERANCE_SECS || age_secs < -WEBHOOK_FUTURE_SKEW_SECS {
            return Err(SignatureError::TimestampOutsideTolerance { age_secs });
        }

        let matches = signatures.iter().any(|candidate| {
            let Ok(provided) = hex::decode(candidate) else {
                return false;
            };
            let Ok(mut mac) = HmacSha256::new_from_slice(self.webhook_secret.as_bytes()) else {
                return false;
            };
            mac.update(timestamp.as_bytes());
            mac.update(b".");
            mac.update(payload);
            // Constant-time comparison.
            mac.verify_slice(&provided).is_ok()
        });

        if matches {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn client() -> StripeClient {
        StripeClient::new(
            "sk_test".to_string(),
            SECRET.to_string(),
            DEFAULT_API_BASE.to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn sign(payload: &[u8], timestamp: i64, secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    const PAYLOAD: &[u8] =
        br#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{"id":"cs_1"}}}"#;

    #[test]
    fn valid_signature_is_accepted_and_event_decodes() {
        let now = 1_700_000_000;
        let header = sign(PAYLOAD, now, SECRET);
        client()
            .verify_webhook_signature_at(PAYLOAD, &header, now + 10)
            .unwrap();

        let event = StripeEvent::from_payload(PAYLOAD).unwrap();
        assert_eq!(event.type_, "checkout.session.completed");
        assert_eq!(event.id.as_deref(), Some("evt_1"));
    }

    #[test]
    fn signed_body_that_is_not_an_event_still_verifies() {
        let now = 1_700_000_000;
        let body = br#"{"hello":"world"}"#;
        let header = sign(body, now, SECRET);
        assert_eq!(
            client().verify_webhook_signature_at(body, &header, now),
            Ok(())
        );
        assert!(StripeEvent::from_payload(body).is_err());
    }

    #[test]
    fn any_matching_v1_entry_is_accepted() {
        let now = 1_700_000_000;
        let good = sign(PAYLOAD, now, SECRET);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={now},v1={},v1={good_sig}", "ab".repeat(32));
        assert!(
            client()
                .verify_webhook_signature_at(PAYLOAD, &header, now)
                .is_ok()
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = 1_700_000_000;
        let header = sign(PAYLOAD, now, "whsec_other");
        assert_eq!(
            client()
                .verify_webhook_signature_at(PAYLOAD, &header, now)
                .unwrap_err(),
            SignatureError::Mismatch
        );
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let now = 1_700_000_000;
        let header = sign(PAYLOAD, now, SECRET);
        let tampered = br#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{"id":"cs_2"}}}"#;
        assert_eq!(
            client()
                .verify_webhook_signature_at(tampered, &header, now)
                .unwrap_err(),
            SignatureError::Mismatch
        );
    }

    #[test]
    fn stale_and_future_timestamps_are_rejected() {
        let now = 1_700_000_000;
        let stale = sign(PAYLOAD, now - 301, SECRET);
        assert!(matches!(
            client().verify_webhook_signature_at(PAYLOAD, &stale, now),
            Err(SignatureError::TimestampOutsideTolerance { .. })
        ));

        let future = sign(PAYLOAD, now + 61, SECRET);
        assert!(matches!(
            client().verify_webhook_signature_at(PAYLOAD, &future, now),
            Err(SignatureError::TimestampOutsideTolerance { .. })
        ));
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let c = client();
        assert_eq!(
            c.verify_webhook_signature_at(PAYLOAD, "v1=abcd", 0).unwrap_err(),
            SignatureError::MissingTimestamp
        );
        assert_eq!(
            c.verify_webhook_signature_at(PAYLOAD, "t=0", 0).unwrap_err(),
            SignatureError::MissingSignature
        );
        assert_eq!(
            c.verify_webhook_signature_at(PAYLOAD, "t=abc,v1=abcd", 0)
                .unwrap_err(),
            SignatureError::InvalidTimestamp
        );
        assert_eq!(
            c.verify_webhook_signature_at(PAYLOAD, "t=0,v1=not-hex", 0)
                .unwrap_err(),
            SignatureError::Mismatch
        );
    }

    #[test]
    fn checkout_form_carries_metadata_on_session_and_intent() {
        let request = CheckoutSessionRequest {
            currency: "USD".to_string(),
            unit_amount: 15000,
            product_name: "Invoice INV-2024-000123".to_string(),
            product_description: "Invoice for Acme".to_string(),
            success_url: "https://app.test/pay/invoice/1?payment=success".to_string(),
            cancel_url: "https://app.test/pay/invoice/1?payment=cancelled".to_string(),
            client_reference_id: "1".to_string(),
            metadata: HashMap::from([("invoice_id".to_string(), "1".to_string())]),
        };

        let form: HashMap<String, String> = StripeClient::checkout_session_form(&request)
            .into_iter()
            .collect();

        assert_eq!(form["mode"], "payment");
        assert_eq!(form["line_items[0][price_data][currency]"], "usd");
        assert_eq!(form["line_items[0][price_data][unit_amount]"], "15000");
        assert_eq!(form["metadata[invoice_id]"], "1");
        assert_eq!(form["payment_intent_data[metadata][invoice_id]"], "1");
        assert_eq!(form["client_reference_id"], "1");
    }
}
