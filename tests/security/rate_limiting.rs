//! Rate limiting tests for the public API.
//!
//! Checkout and contact endpoints sit in the strict tier, catalog reads in the standard
//! tier, and `/health` is never limited. Limits are tracked per peer IP.

#[path = "../common/mod.rs"]
mod common;
use common::*;

use std::net::SocketAddr;

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
};
use serde_json::json;
use storefront::config::RateLimitConfig;
use tower::ServiceExt;

/// Public router with real limits. `ConnectInfo` is injected directly since
/// there is no socket in `oneshot` tests.
fn limited_app(state: AppState, config: RateLimitConfig, ip: SocketAddr) -> Router {
    handlers::public::router(config)
        .layer(axum::Extension(ConnectInfo(ip)))
        .with_state(state)
}

fn localhost() -> SocketAddr {
    "127.0.0.1:12345".parse().unwrap()
}

fn checkout_request() -> Request<Body> {
    json_request(
        "POST",
        "/stripe/create-payment-intent",
        json!({ "items": [{ "id": 7, "quantity": 1 }], "email": "a@b.com" }),
    )
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_strict_tier_returns_429_when_exceeded() {
    let ctx = TestContext::new();
    ctx.material_with_file(7, "Spanish Verbs A1", 19.99);
    let config = RateLimitConfig {
        strict_rpm: 1,
        standard_rpm: 60,
    };
    let app = limited_app(ctx.state.clone(), config, localhost());

    let first = app.clone().oneshot(checkout_request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.oneshot(checkout_request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        ctx.payments.created_requests().len(),
        1,
        "limited requests must not reach the processor"
    );
}

#[tokio::test]
async fn test_tiers_are_independent() {
    let ctx = TestContext::new();
    ctx.material_with_file(7, "Spanish Verbs A1", 19.99);
    let config = RateLimitConfig {
        strict_rpm: 1,
        standard_rpm: 60,
    };
    let app = limited_app(ctx.state.clone(), config, localhost());

    app.clone().oneshot(checkout_request()).await.unwrap();
    let limited = app.clone().oneshot(checkout_request()).await.unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);

    let catalog = app.oneshot(get("/materials/shop")).await.unwrap();
    assert_eq!(catalog.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_standard_tier_limits_catalog() {
    let ctx = TestContext::new();
    let config = RateLimitConfig {
        strict_rpm: 10,
        standard_rpm: 2,
    };
    let app = limited_app(ctx.state.clone(), config, localhost());

    for _ in 0..2 {
        let response = app.clone().oneshot(get("/materials/resource")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app.oneshot(get("/materials/resource")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_health_is_not_limited() {
    let ctx = TestContext::new();
    let config = RateLimitConfig {
        strict_rpm: 1,
        standard_rpm: 1,
    };
    let app = limited_app(ctx.state.clone(), config, localhost());

    for _ in 0..5 {
        let response = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_limits_are_per_ip() {
    let ctx = TestContext::new();
    ctx.material_with_file(7, "Spanish Verbs A1", 19.99);
    let config = RateLimitConfig {
        strict_rpm: 1,
        standard_rpm: 60,
    };

    // One limiter, peer address set per request
    let app = handlers::public::router(config).with_state(ctx.state.clone());

    let with_ip = |ip: &str| {
        let mut request = checkout_request();
        request
            .extensions_mut()
            .insert(ConnectInfo(ip.parse::<SocketAddr>().unwrap()));
        request
    };

    let a = app.clone().oneshot(with_ip("10.0.0.1:1000")).await.unwrap();
    assert_eq!(a.status(), StatusCode::OK);
    let a_again = app.clone().oneshot(with_ip("10.0.0.1:1001")).await.unwrap();
    assert_eq!(a_again.status(), StatusCode::TOO_MANY_REQUESTS);

    let b = app.oneshot(with_ip("10.0.0.2:1000")).await.unwrap();
    assert_eq!(b.status(), StatusCode::OK, "a second IP has its own budget");
}

#[tokio::test]
async fn test_contact_endpoints_use_strict_tier() {
    let ctx = TestContext::new();
    let config = RateLimitConfig {
        strict_rpm: 1,
        standard_rpm: 60,
    };
    let app = limited_app(ctx.state.clone(), config, localhost());
    let suggestion = || json_request("POST", "/send-suggestion", json!({ "message": "Hola" }));

    let first = app.clone().oneshot(suggestion()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = app.oneshot(suggestion()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(ctx.mailer.messages().len(), 1);
}
