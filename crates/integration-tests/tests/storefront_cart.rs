//! Cart and order creation without a print service.
//!
//! These tests require a running storefront (cargo run -p filamento-storefront).

use filamento_integration_tests::TestContext;
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_new_session_has_empty_cart() {
    let ctx = TestContext::new();
    let resp = ctx.get("/api/cart").await.expect("Failed to get cart");
    assert_eq!(resp.status(), StatusCode::OK);

    let cart: Value = resp.json().await.expect("Failed to parse cart");
    assert_eq!(cart["items"], json!([]));
    assert_eq!(cart["total_quantity"], 0);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_add_unknown_upload_is_not_found() {
    let ctx = TestContext::new();
    let resp = ctx
        .post_json(
            "/api/cart/items",
            &json!({ "uploadId": "6f1c2a8e-0d8b-4c2e-9a53-2b0f3e1c7d11" }),
        )
        .await
        .expect("Failed to add item");

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.expect("Failed to parse error");
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_checkout_with_empty_cart_is_rejected() {
    let ctx = TestContext::new();
    let resp = ctx
        .post_json("/api/checkout/session", &json!({}))
        .await
        .expect("Failed to create payment session");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_create_order_requires_buyer() {
    let ctx = TestContext::new();
    let resp = ctx
        .post_json("/api/create-order", &json!({}))
        .await
        .expect("Failed to create order");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "Dados do comprador são obrigatórios");
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_create_order_rejects_malformed_idempotency_key() {
    let ctx = TestContext::new();
    let resp = ctx
        .client
        .post(ctx.url("/api/create-order"))
        .header("idempotency-key", "chave com espaços")
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to create order");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_webhook_without_credentials_is_unauthorized() {
    let ctx = TestContext::new();
    let resp = ctx
        .post_json(
            "/api/webhooks/pagarme",
            &json!({ "id": "hook_1", "type": "order.paid", "data": { "id": "or_x" } }),
        )
        .await
        .expect("Failed to post webhook");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
