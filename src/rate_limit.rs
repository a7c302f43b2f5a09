//! Per-IP rate limiting for public endpoints.
//!
//! Tiers:
//! - Strict: /stripe/* and the contact endpoints, which call an external API
//! - Standard: catalog reads and newsletter signup
//!
//! The webhook endpoint is not limited; the processor retries on its own
//! schedule and deliveries are authenticated by signature.

use std::sync::Arc;
use std::time::Duration;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;

/// Rate limiter layer type alias using governor types directly
pub type RateLimitLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

/// Creates a rate limiter layer allowing `requests_per_minute` per IP,
/// replenished evenly over the minute. Zero is treated as one.
fn create_layer(requests_per_minute: u32) -> RateLimitLayer {
    let rpm = requests_per_minute.max(1);
    let replenish_ms = (60_000 / u64::from(rpm)).max(1);
    let config = GovernorConfigBuilder::default()
        .period(Duration::from_millis(replenish_ms))
        .burst_size(rpm)
        .finish()
        .expect("period and burst size are non-zero");

    GovernorLayer::new(Arc::new(config))
}

/// Strict tier, for endpoints that call the payment processor or send mail.
pub fn strict_layer(requests_per_minute: u32) -> RateLimitLayer {
    create_layer(requests_per_minute)
}

/// Standard tier, for catalog and newsletter endpoints.
pub fn standard_layer(requests_per_minute: u32) -> RateLimitLayer {
    create_layer(requests_per_minute)
}
