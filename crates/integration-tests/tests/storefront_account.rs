//! Registration, login and account endpoints.
//!
//! These tests require a running storefront (cargo run -p filamento-storefront)
//! with a migrated database.

use filamento_integration_tests::{TEST_PASSWORD, TestContext, sample_address};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_me_is_anonymous_by_default() {
    let ctx = TestContext::new();
    let body: Value = ctx
        .get("/api/auth/me")
        .await
        .expect("Failed to call /me")
        .json()
        .await
        .expect("Failed to parse /me");

    assert_eq!(body["success"], false);
    assert_eq!(body["user"], Value::Null);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_account_requires_login() {
    let ctx = TestContext::new();
    let resp = ctx
        .get("/api/account/profile")
        .await
        .expect("Failed to get profile");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_register_logout_login() {
    let ctx = TestContext::new();
    let email = ctx.register().await.expect("Failed to register");

    let me: Value = ctx
        .get("/api/auth/me")
        .await
        .expect("Failed to call /me")
        .json()
        .await
        .expect("Failed to parse /me");
    assert_eq!(me["user"]["email"], email.as_str());

    let resp = ctx
        .post_json("/api/auth/logout", &json!({}))
        .await
        .expect("Failed to logout");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = ctx
        .post_json(
            "/api/auth/login",
            &json!({ "email": email, "password": "senha-errada-123" }),
        )
        .await
        .expect("Failed to login");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = ctx
        .post_json(
            "/api/auth/login",
            &json!({ "email": email, "password": TEST_PASSWORD }),
        )
        .await
        .expect("Failed to login");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_duplicate_registration_conflicts() {
    let ctx = TestContext::new();
    let email = ctx.register().await.expect("Failed to register");

    let other = TestContext::new();
    let resp = other
        .post_json(
            "/api/auth/register",
            &json!({ "email": email, "password": TEST_PASSWORD }),
        )
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_first_address_becomes_default() {
    let ctx = TestContext::new();
    ctx.register().await.expect("Failed to register");

    let resp = ctx
        .post_json("/api/account/addresses", &sample_address())
        .await
        .expect("Failed to create address");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let address: Value = resp.json().await.expect("Failed to parse address");
    assert_eq!(address["isDefault"], true);
    assert_eq!(address["zipCode"], "01304001");

    let list: Vec<Value> = ctx
        .get("/api/account/addresses")
        .await
        .expect("Failed to list addresses")
        .json()
        .await
        .expect("Failed to parse addresses");
    assert_eq!(list.len(), 1);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_new_account_has_no_orders() {
    let ctx = TestContext::new();
    ctx.register().await.expect("Failed to register");

    let orders: Vec<Value> = ctx
        .get("/api/account/orders")
        .await
        .expect("Failed to list orders")
        .json()
        .await
        .expect("Failed to parse orders");
    assert!(orders.is_empty());

    let resp = ctx
        .get("/api/account/orders/999999")
        .await
        .expect("Failed to get order");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
