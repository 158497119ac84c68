//! Filamento storefront library.
//!
//! JSON API for ordering 3D prints: model uploads, print quotes, cart,
//! checkout and Pagar.me payments. The binary in `main.rs` only wires
//! configuration, tracing and the listener around [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
///
/// Layers, innermost first: sessions, request id, HTTP tracing, then the
/// Sentry hub and transaction layers so they cover the whole request.
pub fn app(state: AppState) -> Router {
    let session_store = middleware::create_session_store(state.pool());
    let session_layer = middleware::create_session_layer(session_store, state.config());
    let max_upload_bytes = state.config().uploads.max_bytes;
    let trust_proxy_headers = state.config().trust_proxy_headers;

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes(max_upload_bytes, trust_proxy_headers))
        .layer(session_layer)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::extract::ConnectInfo;
    use axum::http::Request;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use filamento_core::pricing::EnergyRates;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{
        PagarmeConfig, PrintServiceConfig, StorefrontConfig, UploadConfig, WebhookCredentials,
    };

    fn test_config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/filamento_test"),
            host: [127, 0, 0, 1].into(),
            port: 3000,
            base_url: "http://localhost:3000".to_owned(),
            trust_proxy_headers: false,
            session_secret: SecretString::from("x".repeat(64)),
            pagarme: PagarmeConfig {
                api_url: "http://localhost:9/core/v5".to_owned(),
                secret_key: SecretString::from("sk_test_local"),
                statement_descriptor: "FILAMENTO3D".to_owned(),
                boleto_due_days: 3,
                pix_expires_in: 3600,
                webhook: None,
            },
            print_service: PrintServiceConfig {
                base_url: "http://localhost:9".to_owned(),
                timeout: Duration::from_secs(1),
                energy: EnergyRates::default(),
            },
            uploads: UploadConfig {
                max_bytes: 1024 * 1024,
            },
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    /// Router over a pool that never connects; only routes that skip the
    /// database can be exercised.
    fn app_with(config: StorefrontConfig) -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/filamento_test")
            .unwrap();
        app(AppState::new(config, pool).unwrap())
    }

    fn test_app() -> Router {
        app_with(test_config())
    }

    fn app_with_webhook() -> Router {
        let mut config = test_config();
        config.pagarme.webhook = Some(WebhookCredentials {
            username: "pagarme".to_owned(),
            password: SecretString::from("s3nh4-do-webhook"),
        });
        app_with(config)
    }

    fn peer() -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 50_000)))
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"ok");
    }

    #[tokio::test]
    async fn test_materials_route_is_mounted_under_api() {
        let response = test_app()
            .oneshot(Request::get("/api/materials").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_webhook_refused_without_configured_credentials() {
        let request = Request::post("/api/webhooks/pagarme")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"type":"order.paid","data":{"id":"or_1"}}"#))
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_checks_credentials_before_reading_body() {
        let request = Request::post("/api/webhooks/pagarme")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app_with_webhook().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Webhook não autorizado");
    }

    #[tokio::test]
    async fn test_webhook_rejects_malformed_body_after_auth() {
        let authorization = format!("Basic {}", STANDARD.encode("pagarme:s3nh4-do-webhook"));
        let request = Request::post("/api/webhooks/pagarme")
            .header("content-type", "application/json")
            .header("authorization", authorization)
            .body(Body::from("{not json"))
            .unwrap();
        let response = app_with_webhook().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_order_validates_before_storage_or_gateway() {
        // Neither the database nor the gateway at localhost:9 is reachable;
        // anything past validation would answer 500 or 502.
        let body = serde_json::json!({
            "customer": {
                "name": "Ana Souza",
                "email": "ana@exemplo.com",
                "document": "52998224725",
            },
            "payment": {"method": "boleto"},
        });
        let request = Request::post("/api/create-order")
            .header("content-type", "application/json")
            .header("idempotency-key", "pedido-1")
            .extension(peer())
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = test_app()
            .oneshot(Request::get("/api/nothing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
