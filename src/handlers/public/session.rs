use axum::extract::State;
use serde::Deserialize;

use crate::catalog::enrich_line_items;
use crate::db::AppState;
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::Json;
use crate::models::{METADATA_EMAIL_KEY, METADATA_ITEMS_KEY, Receipt, parse_line_items};
use crate::payments::is_payment_intent_id;

#[derive(Debug, Deserialize)]
pub struct PaymentSessionRequest {
    #[serde(default)]
    pub payment_intent_id: Option<String>,
}

/// Receipt for a confirmation page. Read-only.
pub async fn get_payment_session(
    State(state): State<AppState>,
    Json(request): Json<PaymentSessionRequest>,
) -> Result<Json<Receipt>> {
    let id = request
        .payment_intent_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest(msg::PAYMENT_INTENT_ID_REQUIRED.into()))?;
    if !is_payment_intent_id(id) {
        return Err(AppError::BadRequest(msg::INVALID_PAYMENT_INTENT_ID.into()));
    }

    let intent = state
        .payments
        .retrieve_payment_intent(id)
        .await?
        .or_not_found(msg::PAYMENT_INTENT_NOT_FOUND)?;

    let line_items = match intent.metadata.get(METADATA_ITEMS_KEY) {
        None => Vec::new(),
        Some(raw) => parse_line_items(raw).unwrap_or_else(|e| {
            tracing::warn!(payment_intent = %intent.id, "Unreadable item metadata: {}", e);
            Vec::new()
        }),
    };

    let items = enrich_line_items(state.catalog.as_ref(), &line_items).await?;

    let customer_email = intent
        .receipt_email
        .clone()
        .or_else(|| intent.metadata.get(METADATA_EMAIL_KEY).cloned());

    Ok(Json(Receipt {
        id: intent.id,
        amount_total: intent.amount,
        currency: intent.currency,
        status: intent.status,
        items,
        customer_email,
    }))
}
