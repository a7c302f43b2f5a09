use axum::{extract::State, http::StatusCode};
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::Json;
use crate::models::SubscribeRequest;

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub message: &'static str,
}

/// Subscribing again with the same email refreshes the record.
pub async fn subscribe(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<SubscribeResponse>)> {
    let email = request.validate()?;

    let conn = state.db.get()?;
    queries::upsert_subscriber(&conn, &email, true)?;
    tracing::info!("Newsletter subscription recorded");

    Ok((
        StatusCode::CREATED,
        Json(SubscribeResponse {
            message: "Subscription confirmed",
        }),
    ))
}
