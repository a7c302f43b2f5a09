use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Lifecycle of a fulfillment claim.
///
/// `processing` and `completed` absorb duplicate deliveries; `failed` may be
/// claimed again by a later delivery of the same event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProcessingStatus {
    Processing,
    Completed,
    Failed,
}

/// Durable idempotency record, one per processing key.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedPayment {
    pub processing_key: String,
    pub status: ProcessingStatus,
    /// Number of times the key was claimed
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Deduplication key derived from a payment event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessingKey(String);

impl ProcessingKey {
    pub fn payment_intent(id: &str) -> Self {
        Self(format!("payment_intent:{}", id))
    }

    /// Used only for charges with no linked payment intent, so the key can
    /// never collide with a real payment-intent key.
    pub fn charge(id: &str) -> Self {
        Self(format!("charge:{}", id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of the atomic claim on a processing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// First delivery for this key
    Claimed,
    /// A failed (or stale processing) row was taken over
    Reclaimed { attempts: i64 },
    /// Row is processing or completed; this delivery is a no-op
    AlreadyHandled,
}

impl ClaimOutcome {
    /// The attempt number this claim owns. Status writes are fenced on it,
    /// so a claim that was taken over cannot overwrite its successor.
    pub fn attempt(self) -> Option<i64> {
        match self {
            ClaimOutcome::Claimed => Some(1),
            ClaimOutcome::Reclaimed { attempts } => Some(attempts),
            ClaimOutcome::AlreadyHandled => None,
        }
    }
}
