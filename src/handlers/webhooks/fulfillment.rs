//! Fulfillment of paid orders.
//!
//! Every paid order is keyed by a [`ProcessingKey`] and claimed atomically in
//! `processed_payments` before anything is sent, so each key produces at most
//! one successful purchase email however often the processor redelivers.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::Utc;

use crate::catalog::enrich_line_items;
use crate::db::{AppState, queries};
use crate::email::{Attachment, PDF_CONTENT_TYPE, PurchaseEmail, attachment_filename};
use crate::models::{
    ClaimOutcome, EnrichedItem, METADATA_EMAIL_KEY, METADATA_ITEMS_KEY, ProcessingKey,
    ProcessingStatus, order_from_metadata,
};
use crate::payments::{StripeCharge, StripePaymentIntent};

/// Payment events the engine acts on. Everything else is acknowledged and
/// dropped before it gets here.
#[derive(Debug, Clone)]
pub enum PaymentEvent {
    PaymentIntentSucceeded(StripePaymentIntent),
    ChargeSucceeded(StripeCharge),
    Ignored(String),
}

/// Why a claimed fulfillment did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentFailure {
    /// Metadata on an authentic event is missing or unusable. Not transient.
    DataIntegrity(String),
    /// Nothing deliverable, or the mail provider refused the message
    Dispatch(String),
    /// The claim store or the catalog could not be read or written
    Store(String),
    /// The processor could not be asked for a charge's payment intent
    Processor(String),
}

impl fmt::Display for FulfillmentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FulfillmentFailure::DataIntegrity(e) => write!(f, "data integrity: {}", e),
            FulfillmentFailure::Dispatch(e) => write!(f, "dispatch: {}", e),
            FulfillmentFailure::Store(e) => write!(f, "store: {}", e),
            FulfillmentFailure::Processor(e) => write!(f, "processor: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    Completed,
    AlreadyHandled,
    Failed(FulfillmentFailure),
    Ignored(String),
}

/// An order that has been paid and can be claimed.
#[derive(Debug, Clone, PartialEq)]
pub struct PaidOrder {
    pub key: ProcessingKey,
    pub metadata: HashMap<String, String>,
}

fn has_value(metadata: &HashMap<String, String>, key: &str) -> bool {
    metadata.get(key).is_some_and(|v| !v.trim().is_empty())
}

/// Charges carrying their own order metadata, as opposed to ones that only
/// point at a payment intent.
fn charge_has_order_metadata(charge: &StripeCharge) -> bool {
    has_value(&charge.metadata, METADATA_EMAIL_KEY) && has_value(&charge.metadata, METADATA_ITEMS_KEY)
}

/// Normalize an event to the paid order it confirms.
pub async fn resolve_paid_order(
    state: &AppState,
    event: PaymentEvent,
) -> Result<PaidOrder, FulfillmentOutcome> {
    match event {
        PaymentEvent::PaymentIntentSucceeded(intent) => Ok(PaidOrder {
            key: ProcessingKey::payment_intent(&intent.id),
            metadata: intent.metadata,
        }),
        PaymentEvent::ChargeSucceeded(charge) => {
            if charge_has_order_metadata(&charge) {
                let key = match charge.payment_intent.as_deref() {
                    Some(pi) => ProcessingKey::payment_intent(pi),
                    None => ProcessingKey::charge(&charge.id),
                };
                return Ok(PaidOrder {
                    key,
                    metadata: charge.metadata,
                });
            }

            let Some(pi_id) = charge.payment_intent else {
                tracing::info!(charge = %charge.id, "Charge has no order metadata and no payment intent, nothing to fulfill");
                return Err(FulfillmentOutcome::Ignored(format!(
                    "charge {} has no order",
                    charge.id
                )));
            };

            match state.payments.retrieve_payment_intent(&pi_id).await {
                Ok(Some(intent)) => Ok(PaidOrder {
                    key: ProcessingKey::payment_intent(&intent.id),
                    metadata: intent.metadata,
                }),
                Ok(None) => {
                    tracing::warn!(charge = %charge.id, payment_intent = %pi_id, "Linked payment intent not found");
                    Err(FulfillmentOutcome::Ignored(format!(
                        "payment intent {} not found",
                        pi_id
                    )))
                }
                Err(e) => {
                    tracing::error!(charge = %charge.id, payment_intent = %pi_id, "Failed to retrieve payment intent: {}", e);
                    Err(FulfillmentOutcome::Failed(FulfillmentFailure::Processor(
                        e.to_string(),
                    )))
                }
            }
        }
        PaymentEvent::Ignored(reason) => Err(FulfillmentOutcome::Ignored(reason)),
    }
}

/// Entry point for an authenticated event.
pub async fn process_payment_event(state: &AppState, event: PaymentEvent) -> FulfillmentOutcome {
    match resolve_paid_order(state, event).await {
        Ok(order) => fulfill_order(state, order).await,
        Err(outcome) => outcome,
    }
}

fn stale_before(state: &AppState) -> Option<i64> {
    (state.processing_timeout_secs > 0)
        .then(|| Utc::now().timestamp() - state.processing_timeout_secs)
}

fn claim(state: &AppState, key: &ProcessingKey) -> crate::error::Result<ClaimOutcome> {
    let mut conn = state.db.get()?;
    queries::try_claim_processed_payment(&mut conn, key, stale_before(state))
}

/// Record the terminal state of a claim. Store errors are logged only: the
/// outcome of the fulfillment itself is already decided.
fn finish(
    state: &AppState,
    key: &ProcessingKey,
    attempt: i64,
    failure: Option<&FulfillmentFailure>,
) {
    let (status, last_error) = match failure {
        None => (ProcessingStatus::Completed, None),
        Some(f) => (ProcessingStatus::Failed, Some(f.to_string())),
    };
    let result = state.db.get().map_err(Into::into).and_then(|conn| {
        queries::mark_processed_payment(&conn, key, attempt, status, last_error.as_deref())
    });
    match result {
        Ok(true) => {
            tracing::info!(processing_key = %key, attempt, status = ?status, "Processed payment updated")
        }
        Ok(false) => tracing::error!(
            processing_key = %key,
            attempt,
            status = ?status,
            "Claim was taken over by a later delivery, status not recorded"
        ),
        Err(e) => tracing::error!(processing_key = %key, attempt, "Failed to record processed payment status: {}", e),
    }
}

fn fail(
    state: &AppState,
    key: &ProcessingKey,
    attempt: i64,
    failure: FulfillmentFailure,
) -> FulfillmentOutcome {
    match &failure {
        FulfillmentFailure::DataIntegrity(_) => {
            tracing::error!(processing_key = %key, "Fulfillment aborted: {}", failure)
        }
        _ => tracing::warn!(processing_key = %key, "Fulfillment failed: {}", failure),
    }
    finish(state, key, attempt, Some(&failure));
    FulfillmentOutcome::Failed(failure)
}

/// One attachment per distinct material whose file can be read.
async fn collect_attachments(state: &AppState, items: &[EnrichedItem]) -> (Vec<String>, Vec<Attachment>) {
    let mut seen = HashSet::new();
    let mut titles = Vec::new();
    let mut attachments = Vec::new();

    for item in items {
        if !seen.insert(item.id) {
            continue;
        }
        let Some(file_ref) = item.file_ref.as_deref() else {
            tracing::warn!(material_id = item.id, title = %item.title, "Material has no file, skipping");
            continue;
        };
        let Some(content) = state.files.read(file_ref).await else {
            tracing::warn!(material_id = item.id, title = %item.title, "Material file unreadable, skipping");
            continue;
        };
        titles.push(item.title.clone());
        attachments.push(Attachment {
            filename: attachment_filename(&item.title),
            content,
            content_type: PDF_CONTENT_TYPE.to_string(),
        });
    }

    (titles, attachments)
}

/// Claim the order and send its files.
pub async fn fulfill_order(state: &AppState, order: PaidOrder) -> FulfillmentOutcome {
    let key = order.key;

    let claimed = match claim(state, &key) {
        Ok(claimed) => claimed,
        Err(e) => {
            tracing::error!(processing_key = %key, "Failed to claim processed payment: {}", e);
            return FulfillmentOutcome::Failed(FulfillmentFailure::Store(e.to_string()));
        }
    };
    let Some(attempt) = claimed.attempt() else {
        tracing::info!(processing_key = %key, "Duplicate delivery, already handled");
        return FulfillmentOutcome::AlreadyHandled;
    };
    if let ClaimOutcome::Reclaimed { attempts } = claimed {
        tracing::info!(processing_key = %key, attempts, "Processed payment reclaimed for retry");
    } else {
        tracing::info!(processing_key = %key, "Processed payment claimed");
    }

    let parsed = match order_from_metadata(&order.metadata) {
        Ok(parsed) => parsed,
        Err(e) => return fail(state, &key, attempt, FulfillmentFailure::DataIntegrity(e.to_string())),
    };

    let items = match enrich_line_items(state.catalog.as_ref(), &parsed.items).await {
        Ok(items) => items,
        Err(e) => return fail(state, &key, attempt, FulfillmentFailure::Store(e.to_string())),
    };

    let (titles, attachments) = collect_attachments(state, &items).await;
    if attachments.is_empty() {
        return fail(
            state,
            &key,
            attempt,
            FulfillmentFailure::Dispatch("no deliverable files for this order".into()),
        );
    }

    let email = PurchaseEmail {
        to: parsed.email,
        titles,
        attachments,
    };
    tracing::info!(processing_key = %key, to = %email.to, attachments = email.attachments.len(), "Dispatching purchase email");

    if !state.mailer.send_purchase(&email).await {
        return fail(
            state,
            &key,
            attempt,
            FulfillmentFailure::Dispatch("mail provider did not accept the message".into()),
        );
    }

    finish(state, &key, attempt, None);
    FulfillmentOutcome::Completed
}
