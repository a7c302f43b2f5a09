mod checkout;
mod contact;
mod materials;
mod newsletter;
mod session;

pub use checkout::*;
pub use contact::*;
pub use materials::*;
pub use newsletter::*;
pub use session::*;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::rate_limit;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Checkout endpoints; every call reaches the payment processor.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/stripe/create-payment-intent", post(create_payment_intent))
        .route("/stripe/payment-session", post(get_payment_session))
}

/// Contact form and suggestions; each call sends an email.
pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/send-email", post(send_email))
        .route("/send-suggestion", post(send_suggestion))
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/materials/shop", get(list_shop_materials))
        .route("/materials/resource", get(list_resource_materials))
        .route("/material/{id}", get(get_material))
        .route("/newsletter/subscribe", post(subscribe))
}

pub fn router(rate_limit: RateLimitConfig) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(checkout_routes().layer(rate_limit::strict_layer(rate_limit.strict_rpm)))
        .merge(contact_routes().layer(rate_limit::strict_layer(rate_limit.strict_rpm)))
        .merge(catalog_routes().layer(rate_limit::standard_layer(rate_limit.standard_rpm)))
}
