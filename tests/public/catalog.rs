//! Public catalog endpoint tests

#[path = "../common/mod.rs"]
mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use tower::ServiceExt;

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_shop_lists_paid_published_materials() {
    let ctx = TestContext::new();
    ctx.material_with_file(1, "Paid Guide", 12.0);
    insert_material(&ctx.conn(), 2, "Free Sheet", None, Some("pdfs/free.pdf"));

    let response = public_app(ctx.state.clone())
        .oneshot(get("/materials/shop"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "Paid Guide");
    assert!(list[0].get("file_ref").is_none(), "file references must not leak");
}

#[tokio::test]
async fn test_resources_list_free_materials() {
    let ctx = TestContext::new();
    ctx.material_with_file(1, "Paid Guide", 12.0);
    insert_material(&ctx.conn(), 2, "Free Sheet", None, Some("pdfs/free.pdf"));

    let json = body_json(
        public_app(ctx.state.clone())
            .oneshot(get("/materials/resource"))
            .await
            .unwrap(),
    )
    .await;

    let titles: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Free Sheet"]);
}

#[tokio::test]
async fn test_get_material() {
    let ctx = TestContext::new();
    ctx.material_with_file(7, "Spanish Verbs A1", 19.99);

    let response = public_app(ctx.state.clone())
        .oneshot(get("/material/7"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], 7);
    assert_eq!(json["price"], 19.99);
}

#[tokio::test]
async fn test_unpublished_material_is_not_found() {
    let ctx = TestContext::new();
    ctx.material_with_file(7, "Spanish Verbs A1", 19.99);
    ctx.conn()
        .execute("UPDATE materials SET is_draft = 1 WHERE id = 7", [])
        .unwrap();

    let response = public_app(ctx.state.clone())
        .oneshot(get("/material/7"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = public_app(ctx.state.clone())
        .oneshot(get("/material/12345"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_numeric_id_rejected() {
    let ctx = TestContext::new();
    let response = public_app(ctx.state.clone())
        .oneshot(get("/material/abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
