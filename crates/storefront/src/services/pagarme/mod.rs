//! Pagar.me gateway client.
//!
//! Creates orders through `POST {api_url}/orders` with HTTP Basic auth
//! (`secret_key:` base64-encoded) and an `Idempotency-Key` header, then
//! normalizes the response into an [`OrderOutcome`].

pub mod request;
pub mod response;
pub mod webhook;

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::PagarmeConfig;

pub use request::{CreateOrderRequest, OrderSettings, build_order_request};
pub use response::{BoletoInfo, GatewayErrorBody, GatewayOrder, OrderOutcome, PixInfo, normalize};
pub use webhook::{StatusUpdate, WebhookEvent, verify_basic_auth};

/// Gateway request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when talking to the gateway.
#[derive(Debug, Error)]
pub enum PagarmeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway rejected the request.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The response body did not match the expected schema.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The order could not be assembled from local data.
    #[error("{0}")]
    InvalidRequest(String),

    /// Client configuration is unusable.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Pagar.me API client.
#[derive(Clone)]
pub struct PagarmeClient {
    client: reqwest::Client,
    api_url: String,
    statement_descriptor: String,
    boleto_due_days: u32,
    pix_expires_in: u32,
}

impl PagarmeClient {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PagarmeConfig) -> Result<Self, PagarmeError> {
        let mut headers = HeaderMap::new();

        // Basic auth with the secret key as username and an empty password
        let token = STANDARD.encode(format!("{}:", config.secret_key.expose_secret()));
        let mut auth_value = HeaderValue::from_str(&format!("Basic {token}"))
            .map_err(|e| PagarmeError::Config(format!("Invalid secret key format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            statement_descriptor: config.statement_descriptor.clone(),
            boleto_due_days: config.boleto_due_days,
            pix_expires_in: config.pix_expires_in,
        })
    }

    /// Store settings for a request built now.
    #[must_use]
    pub fn settings(&self) -> OrderSettings {
        OrderSettings {
            statement_descriptor: self.statement_descriptor.clone(),
            boleto_due_days: self.boleto_due_days,
            pix_expires_in: self.pix_expires_in,
            now: Utc::now(),
        }
    }

    /// Create an order and normalize the response.
    ///
    /// Replaying the same `idempotency_key` makes the gateway return the
    /// original order instead of charging again.
    ///
    /// # Errors
    ///
    /// Returns `PagarmeError::Rejected` with the flattened gateway message on
    /// a non-2xx response, or `PagarmeError::Parse` if the body is not an
    /// order.
    #[instrument(skip(self, request), fields(code = %request.code, method))]
    pub async fn create_order(
        &self,
        request: &CreateOrderRequest,
        idempotency_key: &str,
    ) -> Result<OrderOutcome, PagarmeError> {
        let method = request
            .payment_method()
            .ok_or_else(|| PagarmeError::InvalidRequest("pagamento ausente".to_owned()))?;
        tracing::Span::current().record("method", method.as_str());

        let url = format!("{}/orders", self.api_url);
        let response = self
            .client
            .post(&url)
            .header("Idempotency-Key", idempotency_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<GatewayErrorBody>(&body)
                .map(|b| b.flatten())
                .unwrap_or_else(|_| format!("Erro na operadora de pagamento ({status})"));
            warn!(status = status.as_u16(), %message, "Gateway rejected order");
            return Err(PagarmeError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let order: GatewayOrder =
            serde_json::from_str(&body).map_err(|e| PagarmeError::Parse(e.to_string()))?;
        let outcome = normalize(&order, method);
        debug!(
            order_id = %outcome.order_id,
            charge_status = %outcome.charge_status,
            success = outcome.success,
            "Gateway order created"
        );

        Ok(outcome)
    }
}
