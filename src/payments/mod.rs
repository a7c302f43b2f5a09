mod stripe;

pub use stripe::*;

use async_trait::async_trait;

use crate::error::Result;

/// Everything the processor needs to open a payment intent.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntentRequest {
    /// Total in minor currency units
    pub amount: i64,
    pub currency: String,
    pub metadata: Vec<(&'static str, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Payment processor API used by checkout, the session query and the
/// webhook engine (for charges that only reference their intent).
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_payment_intent(&self, request: &PaymentIntentRequest)
    -> Result<CreatedPaymentIntent>;

    /// `Ok(None)` when the processor does not know the id.
    async fn retrieve_payment_intent(&self, id: &str) -> Result<Option<StripePaymentIntent>>;
}
