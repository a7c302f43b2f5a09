use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde_json::{Value, json};

use crate::db::AppState;
use crate::error::{AppError, Result, msg};
use crate::payments::{StripeCharge, StripePaymentIntent, StripeWebhookEvent, verify_webhook_signature};

use super::fulfillment::{FulfillmentOutcome, PaymentEvent, process_payment_event};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

fn extract_signature(headers: &HeaderMap) -> Result<&str> {
    headers
        .get(SIGNATURE_HEADER)
        .ok_or_else(|| AppError::Signature(msg::MISSING_SIGNATURE_HEADER.into()))?
        .to_str()
        .map_err(|e| {
            tracing::debug!("Invalid UTF-8 in Stripe signature header: {}", e);
            AppError::Signature(msg::INVALID_SIGNATURE_HEADER.into())
        })
}

/// Parse a verified body into a [`PaymentEvent`].
///
/// An envelope that is not `{type, data: {object}}` is rejected. A known event
/// type whose object does not parse is acknowledged as ignored.
pub fn parse_event(body: &[u8]) -> Result<PaymentEvent> {
    let event: StripeWebhookEvent = serde_json::from_slice(body).map_err(|e| {
        tracing::error!("Failed to parse Stripe webhook: {}", e);
        AppError::Signature(msg::INVALID_EVENT_PAYLOAD.into())
    })?;

    let parsed = match event.event_type.as_str() {
        "payment_intent.succeeded" => serde_json::from_value::<StripePaymentIntent>(event.data.object)
            .map(PaymentEvent::PaymentIntentSucceeded),
        "charge.succeeded" => {
            serde_json::from_value::<StripeCharge>(event.data.object).map(PaymentEvent::ChargeSucceeded)
        }
        other => return Ok(PaymentEvent::Ignored(format!("unhandled event type {}", other))),
    };

    Ok(parsed.unwrap_or_else(|e| {
        tracing::warn!(
            event_type = %event.event_type,
            event_id = event.id.as_deref().unwrap_or("-"),
            "Malformed event object: {}",
            e
        );
        PaymentEvent::Ignored(format!("malformed {} object", event.event_type))
    }))
}

/// Axum handler for Stripe webhooks.
///
/// Once the signature checks out the delivery is always acknowledged; the
/// fulfillment outcome lives in `processed_payments` and the logs.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = extract_signature(&headers)?;
    let now = chrono::Utc::now().timestamp();
    if !verify_webhook_signature(&state.webhook_secret, &body, signature, now)? {
        return Err(AppError::Signature(msg::INVALID_SIGNATURE.into()));
    }

    let event = parse_event(&body)?;
    match process_payment_event(&state, event).await {
        FulfillmentOutcome::Completed => tracing::info!("Stripe webhook fulfilled"),
        FulfillmentOutcome::AlreadyHandled => tracing::info!("Stripe webhook already handled"),
        FulfillmentOutcome::Ignored(reason) => tracing::debug!("Stripe webhook ignored: {}", reason),
        FulfillmentOutcome::Failed(failure) => {
            tracing::warn!("Stripe webhook acknowledged after failed fulfillment: {}", failure)
        }
    }

    Ok(Json(json!({ "received": true })))
}
