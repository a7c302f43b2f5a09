use axum::extract::State;
use serde::Serialize;

use crate::db::AppState;
use crate::email::ContactMessage;
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::models::{ContactRequest, SuggestionRequest};

#[derive(Debug, Serialize)]
pub struct MessageSentResponse {
    pub message: &'static str,
}

async fn dispatch(state: &AppState, message: ContactMessage) -> Result<Json<MessageSentResponse>> {
    if !state.mailer.send_message(&message).await {
        return Err(AppError::Internal(msg::EMAIL_SEND_FAILED.into()));
    }
    tracing::info!(subject = %message.subject, "Contact message forwarded");
    Ok(Json(MessageSentResponse {
        message: "Email sent",
    }))
}

/// Forward a contact form message to the store inbox.
pub async fn send_email(
    State(state): State<AppState>,
    Json(request): Json<ContactRequest>,
) -> Result<Json<MessageSentResponse>> {
    let message = request.into_message()?;
    dispatch(&state, message).await
}

pub async fn send_suggestion(
    State(state): State<AppState>,
    Json(request): Json<SuggestionRequest>,
) -> Result<Json<MessageSentResponse>> {
    let message = request.into_message()?;
    dispatch(&state, message).await
}
