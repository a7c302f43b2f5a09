pub mod fulfillment;
pub mod stripe;

pub use fulfillment::{
    FulfillmentFailure, FulfillmentOutcome, PaidOrder, PaymentEvent, fulfill_order,
    process_payment_event, resolve_paid_order,
};
pub use stripe::handle_stripe_webhook;

use axum::{Router, routing::post};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook/stripe", post(handle_stripe_webhook))
}
