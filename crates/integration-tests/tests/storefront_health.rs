//! Health and catalog endpoints.
//!
//! These tests require a running storefront (cargo run -p filamento-storefront)
//! with a migrated database.

use filamento_integration_tests::TestContext;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_liveness() {
    let ctx = TestContext::new();
    let resp = ctx.get("/health").await.expect("Failed to call /health");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("Failed to read body"), "ok");
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_readiness() {
    let ctx = TestContext::new();
    let resp = ctx
        .get("/health/ready")
        .await
        .expect("Failed to call /health/ready");

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_request_id_is_echoed() {
    let ctx = TestContext::new();
    let resp = ctx
        .client
        .get(ctx.url("/health"))
        .header("x-request-id", "teste-123")
        .send()
        .await
        .expect("Failed to call /health");

    assert_eq!(
        resp.headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("teste-123")
    );
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_materials_catalog() {
    let ctx = TestContext::new();
    let resp = ctx
        .get("/api/materials")
        .await
        .expect("Failed to get materials");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.expect("Failed to parse catalog");
    let materials = body["materials"].as_array().expect("materials array");
    assert_eq!(materials.len(), 5);
    assert_eq!(materials[0]["id"], "pla");
    assert_eq!(body["fillTiers"].as_array().map(Vec::len), Some(5));
    assert_eq!(body["defaultFill"], "medium");
}
