//! Outgoing mail through the Resend API.
//!
//! Purchase deliveries carry the bought files as attachments. Contact form
//! messages and suggestions go to the store's own inbox. Without an API key
//! every dispatch reports failure, so a purchase claim is recorded as
//! `failed` and a later redelivery can retry it.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Retry delays in seconds (exponential backoff: 1s, 4s, 16s)
const RETRY_DELAYS: &[u64] = &[1, 4, 16];

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Per-request timeout. With the retry delays a dispatch stays under two
/// minutes, far below the fulfillment processing timeout.
pub const MAIL_HTTP_TIMEOUT: Duration = Duration::from_secs(20);

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: String,
}

/// One delivery: a recipient, the titles listed in the body, and the files.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseEmail {
    pub to: String,
    pub titles: Vec<String>,
    pub attachments: Vec<Attachment>,
}

/// A plain-text message for the store's inbox.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactMessage {
    /// Where replies from the inbox should go
    pub reply_to: Option<String>,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait MailDispatch: Send + Sync {
    /// Returns true once the provider has accepted the message.
    async fn send_purchase(&self, email: &PurchaseEmail) -> bool;

    async fn send_message(&self, message: &ContactMessage) -> bool;
}

/// Attachment filename derived from a material title: word characters,
/// whitespace and dashes only, plus a `.pdf` extension.
pub fn attachment_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "document.pdf".to_string()
    } else {
        format!("{}.pdf", cleaned)
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[derive(Debug, Serialize)]
struct ResendAttachment {
    filename: String,
    content: String,
    content_type: String,
}

/// Resend API request body.
#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    subject: String,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<ResendAttachment>,
}

/// Resend API response.
#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    #[allow(dead_code)]
    id: String,
}

/// Mailer using the Resend API.
#[derive(Clone)]
pub struct ResendMailer {
    api_key: Option<String>,
    from_email: String,
    /// Inbox for contact messages and suggestions
    contact_email: String,
    store_name: String,
    http_client: Client,
}

impl ResendMailer {
    pub fn new(
        api_key: Option<String>,
        from_email: String,
        contact_email: String,
        store_name: String,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(MAIL_HTTP_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            api_key,
            from_email,
            contact_email,
            store_name,
            http_client,
        })
    }

    fn build_message_request<'a>(&'a self, message: &'a ContactMessage) -> ResendEmailRequest<'a> {
        ResendEmailRequest {
            from: &self.from_email,
            to: vec![self.contact_email.as_str()],
            reply_to: message.reply_to.as_deref(),
            subject: message.subject.clone(),
            text: message.text.clone(),
            html: None,
            attachments: Vec::new(),
        }
    }

    fn build_request<'a>(&'a self, email: &'a PurchaseEmail) -> ResendEmailRequest<'a> {
        let subject = format!("Your {} purchase - PDF documents", self.store_name);

        let mut text = format!(
            "Thank you for your purchase!\n\nThank you for shopping at {}. The documents you bought are attached:\n\n",
            self.store_name
        );
        for title in &email.titles {
            text.push_str(&format!("- {}\n", title));
        }
        text.push_str(&format!(
            "\nWe hope these resources help you in your learning.\n\nThe {} team",
            self.store_name
        ));

        let store = escape_html(&self.store_name);
        let list: String = email
            .titles
            .iter()
            .map(|t| format!("<li>{}</li>", escape_html(t)))
            .collect();
        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #333;">Thank you for your purchase!</h2>
<p>Thank you for shopping at <strong>{}</strong>. The documents you bought are attached:</p>
<ul>{}</ul>
<p>We hope these resources help you in your learning.</p>
<p style="color: #666;">The {} team</p>
</body>
</html>"#,
            store, list, store
        );

        ResendEmailRequest {
            from: &self.from_email,
            to: vec![email.to.as_str()],
            reply_to: None,
            subject,
            text,
            html: Some(html),
            attachments: email
                .attachments
                .iter()
                .map(|a| ResendAttachment {
                    filename: a.filename.clone(),
                    content: BASE64.encode(&a.content),
                    content_type: a.content_type.clone(),
                })
                .collect(),
        }
    }

    /// Send a request to Resend API with exponential backoff retry.
    ///
    /// Retries on transient errors (network issues, 5xx, 429 rate limit).
    /// Gives up immediately on other 4xx responses.
    async fn send_request_with_retry(
        &self,
        api_key: &str,
        request: &ResendEmailRequest<'_>,
        to_email: &str,
    ) -> bool {
        for (attempt, delay_secs) in std::iter::once(&0u64).chain(RETRY_DELAYS).enumerate() {
            if *delay_secs > 0 {
                tracing::warn!(
                    attempt,
                    delay_secs,
                    "Retrying email send after transient failure"
                );
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            }

            match self.send_resend_request(api_key, request).await {
                Ok(()) => {
                    tracing::info!(
                        attempt,
                        to = %to_email,
                        attachments = request.attachments.len(),
                        "Email sent via Resend"
                    );
                    return true;
                }
                Err(true) => continue,
                Err(false) => return false,
            }
        }

        tracing::error!(
            to = %to_email,
            attempts = RETRY_DELAYS.len() + 1,
            "Email send failed after all retries"
        );
        false
    }

    /// Send a single request to Resend API.
    ///
    /// Returns Ok(()) on success, or Err(is_transient) on failure.
    async fn send_resend_request(
        &self,
        api_key: &str,
        request: &ResendEmailRequest<'_>,
    ) -> std::result::Result<(), bool> {
        let response = self
            .http_client
            .post(RESEND_API_URL)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to send request to Resend API");
                true
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<ResendEmailResponse>()
                .await
                .map(|_| ())
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to parse Resend API response");
                    false
                });
        }

        let body = response.text().await.unwrap_or_default();
        let is_transient = status.as_u16() == 429 || status.is_server_error();
        if is_transient {
            tracing::warn!(status = %status, body = %body, "Resend API returned transient error");
        } else {
            tracing::error!(status = %status, body = %body, "Resend API returned non-transient error");
        }
        Err(is_transient)
    }
}

#[async_trait]
impl MailDispatch for ResendMailer {
    async fn send_purchase(&self, email: &PurchaseEmail) -> bool {
        if email.attachments.is_empty() {
            tracing::warn!(to = %email.to, "No attachments to send, skipping purchase email");
            return false;
        }

        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!(to = %email.to, "No Resend API key configured, cannot send email");
            return false;
        };

        let request = self.build_request(email);
        self.send_request_with_retry(api_key, &request, &email.to).await
    }

    async fn send_message(&self, message: &ContactMessage) -> bool {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!("No Resend API key configured, cannot send contact message");
            return false;
        };

        let request = self.build_message_request(message);
        self.send_request_with_retry(api_key, &request, &self.contact_email)
            .await
    }
}
