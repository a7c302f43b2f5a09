use serde::Deserialize;

use crate::email::ContactMessage;
use crate::error::{AppError, Result, msg};

use super::validate_email_format;

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Contact form submission. Replies go back to the sender.
#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ContactRequest {
    pub fn into_message(self) -> Result<ContactMessage> {
        let (Some(email), Some(name), Some(text)) = (
            required(&self.email),
            required(&self.name),
            required(&self.message),
        ) else {
            return Err(AppError::BadRequest(msg::CONTACT_FIELDS_REQUIRED.into()));
        };
        validate_email_format(email)?;

        // Subject is a single line
        let name: String = name.chars().filter(|c| !c.is_control()).collect();

        Ok(ContactMessage {
            reply_to: Some(email.to_string()),
            subject: format!("New message from {}", name),
            text: text.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SuggestionRequest {
    #[serde(default)]
    pub message: Option<String>,
}

impl SuggestionRequest {
    pub fn into_message(self) -> Result<ContactMessage> {
        let text = required(&self.message)
            .ok_or_else(|| AppError::BadRequest(msg::MESSAGE_REQUIRED.into()))?;
        Ok(ContactMessage {
            reply_to: None,
            subject: "New suggestion".to_string(),
            text: text.to_string(),
        })
    }
}
