//! Payment session (receipt) query tests.

#[path = "../common/mod.rs"]
mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;
use storefront::error::msg;
use tower::ServiceExt;

async fn query(ctx: &TestContext, body: serde_json::Value) -> axum::http::Response<axum::body::Body> {
    public_app(ctx.state.clone())
        .oneshot(json_request("POST", "/stripe/payment-session", body))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_receipt_lists_enriched_items() {
    let ctx = TestContext::new();
    ctx.material_with_file(7, "Spanish Verbs A1", 19.99);
    ctx.payments.insert_intent(payment_intent(
        "pi_1",
        metadata(&[("email", "a@b.com"), ("items", r#"[{"id":7,"quantity":2}]"#)]),
    ));

    let response = query(&ctx, json!({ "payment_intent_id": "pi_1" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["id"], "pi_1");
    assert_eq!(json["amount_total"], 3998);
    assert_eq!(json["currency"], "eur");
    assert_eq!(json["status"], "succeeded");
    assert_eq!(json["customer_email"], "a@b.com");
    assert_eq!(
        json["items"],
        json!([{ "id": 7, "title": "Spanish Verbs A1", "quantity": 2, "amount": 1999, "cover": null }])
    );
    assert!(json["items"][0].get("file_ref").is_none(), "file references stay private");
}

#[tokio::test]
async fn test_receipt_email_preferred_over_metadata() {
    let ctx = TestContext::new();
    let mut intent = payment_intent("pi_2", metadata(&[("email", "meta@b.com"), ("items", "[]")]));
    intent.receipt_email = Some("receipt@b.com".into());
    ctx.payments.insert_intent(intent);

    let json = body_json(query(&ctx, json!({ "payment_intent_id": "pi_2" })).await).await;
    assert_eq!(json["customer_email"], "receipt@b.com");
}

#[tokio::test]
async fn test_unknown_intent_not_found() {
    let ctx = TestContext::new();
    let response = query(&ctx, json!({ "payment_intent_id": "pi_missing" })).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_id_rejected() {
    let ctx = TestContext::new();
    assert_eq!(query(&ctx, json!({})).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        query(&ctx, json!({ "payment_intent_id": " " })).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_unreadable_items_yield_empty_receipt() {
    let ctx = TestContext::new();
    ctx.payments.insert_intent(payment_intent(
        "pi_3",
        metadata(&[("email", "a@b.com"), ("items", "{not json")]),
    ));
    ctx.payments
        .insert_intent(payment_intent("pi_4", metadata(&[("email", "a@b.com")])));

    for id in ["pi_3", "pi_4"] {
        let response = query(&ctx, json!({ "payment_intent_id": id })).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["items"], json!([]));
    }
}

#[tokio::test]
async fn test_session_query_has_no_side_effects() {
    let ctx = TestContext::new();
    ctx.material_with_file(7, "Spanish Verbs A1", 19.99);
    ctx.payments.insert_intent(payment_intent(
        "pi_5",
        metadata(&[("email", "a@b.com"), ("items", r#"[{"id":7,"quantity":1}]"#)]),
    ));

    query(&ctx, json!({ "payment_intent_id": "pi_5" })).await;

    assert_eq!(ctx.mailer.call_count(), 0);
    assert!(ctx.processed(&ProcessingKey::payment_intent("pi_5")).is_none());
}

#[tokio::test]
async fn test_malformed_id_rejected_before_processor() {
    let ctx = TestContext::new();
    // Even a known id is refused when it could rewrite the API path
    ctx.payments.insert_intent(payment_intent(
        "../customers/cus_123",
        metadata(&[("email", "a@b.com")]),
    ));

    for id in ["../customers/cus_123", "pi_1/../../customers", "pi_1?expand[]=customer", "ch_123"] {
        let response = query(&ctx, json!({ "payment_intent_id": id })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "id: {}", id);
        assert_eq!(body_json(response).await["details"], msg::INVALID_PAYMENT_INTENT_ID);
    }
    assert!(ctx.payments.retrieved.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_receipt_resolves_unpublished_material() {
    let ctx = TestContext::new();
    ctx.material_with_file(7, "Spanish Verbs A1", 19.99);
    ctx.payments.insert_intent(payment_intent(
        "pi_6",
        metadata(&[("email", "a@b.com"), ("items", r#"[{"id":7,"quantity":1}]"#)]),
    ));
    ctx.conn()
        .execute("UPDATE materials SET is_draft = 1 WHERE id = 7", [])
        .unwrap();

    let json = body_json(query(&ctx, json!({ "payment_intent_id": "pi_6" })).await).await;
    assert_eq!(json["items"][0]["title"], "Spanish Verbs A1");
}
