use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::util::extract_bearer_token;

/// Require `Authorization: Bearer <ADMIN_API_KEY>`. With no key configured
/// every admin request is refused.
pub async fn admin_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let Some(expected) = state.admin_api_key.as_deref() else {
        tracing::debug!("Admin request refused: no admin key configured");
        return Err(AppError::Unauthorized);
    };

    let token = extract_bearer_token(request.headers()).ok_or(AppError::Unauthorized)?;
    if !bool::from(token.as_bytes().ct_eq(expected.as_bytes())) {
        tracing::warn!("Admin request refused: invalid key");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
