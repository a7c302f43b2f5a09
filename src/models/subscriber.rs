use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result, msg};

/// Basic email format validation.
///
/// Exactly one @, non-empty local part without spaces, and a dotted domain
/// that does not start or end with a dot. Not RFC 5322.
pub fn validate_email_format(email: &str) -> Result<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(AppError::BadRequest(msg::EMAIL_EMPTY.into()));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    let local_part = parts[0];
    let domain_part = parts[1];

    if local_part.is_empty() || local_part.contains(' ') {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    if domain_part.is_empty()
        || !domain_part.contains('.')
        || domain_part.starts_with('.')
        || domain_part.ends_with('.')
    {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct Subscriber {
    pub email: String,
    pub consent: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub consent: Option<bool>,
}

impl SubscribeRequest {
    /// Returns the normalized email once the request passes validation.
    pub fn validate(&self) -> Result<String> {
        let email = self
            .email
            .as_deref()
            .ok_or_else(|| AppError::BadRequest(msg::EMAIL_EMPTY.into()))?;
        validate_email_format(email)?;

        match self.consent {
            None => Err(AppError::BadRequest(msg::CONSENT_REQUIRED.into())),
            Some(false) => Err(AppError::BadRequest(msg::CONSENT_NOT_GIVEN.into())),
            Some(true) => Ok(email.trim().to_lowercase()),
        }
    }
}
