use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::catalog::MaterialLookup;
use crate::db::AppState;
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::models::{CartItem, LineItem, OrderMetadata, to_cents, validate_email_format};
use crate::payments::PaymentIntentRequest;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentIntentRequest {
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentResponse {
    pub client_secret: String,
}

/// Validate a cart and price it from the catalog.
///
/// The total is summed in major units and rounded to cents once. Client
/// supplied prices are never read. Metadata carries only ids, quantities and
/// the purchaser email.
pub async fn build_payment_intent(
    catalog: &dyn MaterialLookup,
    currency: &str,
    items: &[CartItem],
    email: Option<&str>,
) -> Result<PaymentIntentRequest> {
    let email = email
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::BadRequest(msg::EMAIL_REQUIRED.into()))?;
    validate_email_format(email)?;

    if items.is_empty() {
        return Err(AppError::BadRequest(msg::NO_ITEMS.into()));
    }

    let mut line_items = Vec::with_capacity(items.len());
    let mut total = 0.0_f64;

    for item in items {
        let quantity = item
            .quantity
            .filter(|q| *q > 0)
            .ok_or_else(|| AppError::BadRequest(msg::INVALID_QUANTITY.into()))?;

        let material = catalog.find_purchasable(item.id).await?.ok_or_else(|| {
            AppError::BadRequest(format!("{}: {}", msg::MATERIAL_NOT_FOUND, item.id))
        })?;

        let price = material
            .price
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| {
                AppError::BadRequest(format!("{}: {}", msg::MATERIAL_NOT_PURCHASABLE, item.id))
            })?;

        total += price * quantity as f64;
        line_items.push(LineItem {
            id: item.id,
            quantity,
        });
    }

    let metadata = OrderMetadata {
        items: line_items,
        email: email.to_string(),
    };

    Ok(PaymentIntentRequest {
        amount: to_cents(total),
        currency: currency.to_string(),
        metadata: metadata.to_pairs()?,
    })
}

pub async fn create_payment_intent(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> Result<Json<CreatePaymentIntentResponse>> {
    let intent = build_payment_intent(
        state.catalog.as_ref(),
        &state.currency,
        &request.items,
        request.email.as_deref(),
    )
    .await?;

    let created = state.payments.create_payment_intent(&intent).await?;

    tracing::info!(
        payment_intent = %created.id,
        amount = intent.amount,
        currency = %intent.currency,
        "Payment intent created"
    );

    Ok(Json(CreatePaymentIntentResponse {
        client_secret: created.client_secret,
    }))
}
