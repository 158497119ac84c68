//! Order creation, idempotent replay and webhook reconciliation.
//!
//! These tests require a running storefront (cargo run -p filamento-storefront)
//! backed by the print service and a Pagar.me sandbox key.

use filamento_integration_tests::{TestContext, pix_order, unique_key, webhook_credentials};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_boleto_without_address_is_rejected_before_payment() {
    let ctx = TestContext::new();
    let resp = ctx
        .create_order(
            &unique_key(),
            &json!({
                "customer": {
                    "name": "Ana Souza",
                    "email": "ana@exemplo.com",
                    "document": "52998224725",
                },
                "payment": { "method": "boleto" },
            }),
        )
        .await
        .expect("Failed to create order");

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = resp.json().await.expect("Failed to parse error");
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_replay_is_scoped_to_the_session() {
    let key = unique_key();

    let buyer = TestContext::new();
    buyer.fill_cart().await.expect("Failed to fill cart");
    let first = buyer
        .create_order(&key, &pix_order())
        .await
        .expect("Failed to create order");
    assert_eq!(first.status(), StatusCode::CREATED);
    let first: Value = first.json().await.expect("Failed to parse order");
    assert_eq!(first["replayed"], false);

    // Same session, same key: the stored answer comes back
    let replay = buyer
        .create_order(&key, &pix_order())
        .await
        .expect("Failed to replay order");
    assert_eq!(replay.status(), StatusCode::OK);
    let replay: Value = replay.json().await.expect("Failed to parse replay");
    assert_eq!(replay["replayed"], true);
    assert_eq!(replay["orderId"], first["orderId"]);

    // Same key with a different request is refused
    let mut boleto = pix_order();
    boleto["payment"] = json!({ "method": "boleto" });
    let conflict = buyer
        .create_order(&key, &boleto)
        .await
        .expect("Failed to reuse key");
    assert_eq!(conflict.status(), StatusCode::CONFLICT);

    // Another session sending the key sees nothing of the first order
    let stranger = TestContext::new();
    let resp = stranger
        .create_order(&key, &pix_order())
        .await
        .expect("Failed to create order");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("Failed to parse error");
    assert_eq!(body["success"], false);
    assert!(body.get("orderId").is_none());
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_webhook_settles_order_and_ignores_late_events() {
    // Needs the server's webhook credentials
    let Some((username, password)) = webhook_credentials() else {
        return;
    };

    let ctx = TestContext::new();
    ctx.fill_cart().await.expect("Failed to fill cart");
    let order: Value = ctx
        .create_order(&unique_key(), &pix_order())
        .await
        .expect("Failed to create order")
        .json()
        .await
        .expect("Failed to parse order");
    let gateway_order_id = order["orderId"].as_str().expect("Missing orderId");

    let post = |event: Value| {
        ctx.client
            .post(ctx.url("/api/webhooks/pagarme"))
            .basic_auth(&username, Some(&password))
            .json(&event)
            .send()
    };
    let charge_event = |kind: &str, status: &str| {
        json!({
            "id": format!("hook_{kind}"),
            "type": format!("charge.{kind}"),
            "data": { "status": status, "order": { "id": gateway_order_id } },
        })
    };

    let paid: Value = post(charge_event("paid", "paid"))
        .await
        .expect("Failed to post webhook")
        .json()
        .await
        .expect("Failed to parse ack");
    assert_eq!(paid, json!({ "received": true, "updated": true }));

    // A pending event arriving after payment must not reopen the order
    let late: Value = post(charge_event("pending", "pending"))
        .await
        .expect("Failed to post webhook")
        .json()
        .await
        .expect("Failed to parse ack");
    assert_eq!(late, json!({ "received": true, "updated": false }));

    let refunded: Value = post(charge_event("refunded", "refunded"))
        .await
        .expect("Failed to post webhook")
        .json()
        .await
        .expect("Failed to parse ack");
    assert_eq!(refunded, json!({ "received": true, "updated": true }));
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_webhook_for_unknown_order_is_acknowledged() {
    // Needs the server's webhook credentials
    let Some((username, password)) = webhook_credentials() else {
        return;
    };

    let ctx = TestContext::new();
    let resp = ctx
        .client
        .post(ctx.url("/api/webhooks/pagarme"))
        .basic_auth(&username, Some(&password))
        .json(&json!({
            "type": "order.paid",
            "data": { "id": "or_nao_existe", "status": "paid" },
        }))
        .send()
        .await
        .expect("Failed to post webhook");

    assert_eq!(resp.status(), StatusCode::OK);
    let ack: Value = resp.json().await.expect("Failed to parse ack");
    assert_eq!(ack["updated"], false);
}
