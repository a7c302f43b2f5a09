use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::{CreatedPaymentIntent, PaymentIntentRequest, PaymentProcessor};
use crate::error::{AppError, Result, msg};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a webhook timestamp before it's rejected (in seconds).
pub const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;
/// Allowed clock skew for timestamps from the future.
pub const WEBHOOK_FUTURE_TOLERANCE_SECS: i64 = 60;

/// Per-request timeout for Stripe API calls. Bounded so a hung call cannot
/// outlive the fulfillment processing timeout.
pub const STRIPE_HTTP_TIMEOUT: Duration = Duration::from_secs(20);

/// True for ids shaped like `pi_<alphanumerics>`.
pub fn is_payment_intent_id(id: &str) -> bool {
    id.strip_prefix("pi_")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric()))
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    api_base: Url,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>, api_base: &str) -> Result<Self> {
        let api_base = Url::parse(api_base)
            .map_err(|e| AppError::Internal(format!("Invalid Stripe API base {}: {}", api_base, e)))?;
        if api_base.cannot_be_a_base() {
            return Err(AppError::Internal(format!("Invalid Stripe API base {}", api_base)));
        }
        let client = Client::builder()
            .timeout(STRIPE_HTTP_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            secret_key: secret_key.into(),
            api_base,
        })
    }

    /// API url with each segment percent-encoded, so ids cannot change the path.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<CreatedPaymentIntent> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".into(), request.amount.to_string()),
            ("currency".into(), request.currency.clone()),
            ("automatic_payment_methods[enabled]".into(), "true".into()),
        ];
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        let response = self
            .client
            .post(self.url(&["v1", "payment_intents"]))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Processor(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Processor(format!(
                "Stripe API error ({}): {}",
                status, error_text
            )));
        }

        let intent: StripePaymentIntent = response
            .json()
            .await
            .map_err(|e| AppError::Processor(format!("Failed to parse Stripe response: {}", e)))?;

        let client_secret = intent.client_secret.ok_or_else(|| {
            AppError::Processor(format!("Payment intent {} has no client secret", intent.id))
        })?;

        Ok(CreatedPaymentIntent {
            id: intent.id,
            client_secret,
        })
    }

    async fn retrieve_payment_intent(&self, id: &str) -> Result<Option<StripePaymentIntent>> {
        if !is_payment_intent_id(id) {
            tracing::warn!("Refusing to look up malformed payment intent id");
            return Ok(None);
        }
        let response = self
            .client
            .get(self.url(&["v1", "payment_intents", id]))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| AppError::Processor(format!("Stripe API error: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Processor(format!(
                "Stripe API error ({}): {}",
                status, error_text
            )));
        }

        let intent = response
            .json()
            .await
            .map_err(|e| AppError::Processor(format!("Failed to parse Stripe response: {}", e)))?;
        Ok(Some(intent))
    }
}

/// Verify a `stripe-signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`)
/// against the raw request body.
///
/// Malformed headers are errors. A well-formed header that is stale, from the
/// future, or carries no matching signature yields `Ok(false)`.
pub fn verify_webhook_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    now: i64,
) -> Result<bool> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = Some(t);
        } else if let Some(s) = part.strip_prefix("v1=") {
            signatures.push(s);
        }
    }

    let timestamp_str =
        timestamp.ok_or_else(|| AppError::Signature(msg::INVALID_SIGNATURE_FORMAT.into()))?;
    if signatures.is_empty() {
        return Err(AppError::Signature(msg::INVALID_SIGNATURE_FORMAT.into()));
    }

    let timestamp: i64 = timestamp_str
        .parse()
        .map_err(|_| AppError::Signature(msg::INVALID_TIMESTAMP_IN_SIGNATURE.into()))?;

    let age = now - timestamp;
    if age > WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
        tracing::warn!(
            "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
            age,
            WEBHOOK_TIMESTAMP_TOLERANCE_SECS
        );
        return Ok(false);
    }
    if age < -WEBHOOK_FUTURE_TOLERANCE_SECS {
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
    let expected_bytes = expected.as_bytes();

    // Signature length is not secret, only the content comparison must be constant-time
    Ok(signatures.iter().any(|sig| {
        let provided = sig.as_bytes();
        provided.len() == expected_bytes.len() && bool::from(expected_bytes.ct_eq(provided))
    }))
}

/// Generic Stripe webhook event - object is parsed based on event_type
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ============ payment_intent.succeeded ============

#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub receipt_email: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub client_secret: Option<String>,
}

// ============ charge.succeeded ============

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCharge {
    pub id: String,
    /// Linked payment intent id (absent for legacy charges)
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}
