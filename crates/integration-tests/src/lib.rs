//! Integration tests for the Filamento storefront API.
//!
//! The tests talk to a running storefront over HTTP and are `#[ignore]`d by
//! default.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate and start the storefront
//! cargo run -p filamento-cli -- migrate
//! cargo run -p filamento-storefront
//!
//! # Run integration tests
//! cargo test -p filamento-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_BASE_URL` - Server under test (default: `http://localhost:3000`)
//! - `PAGARME_WEBHOOK_USERNAME`, `PAGARME_WEBHOOK_PASSWORD` - Same webhook
//!   credentials the server runs with; webhook tests skip without them
//!
//! Order tests need the print service and a Pagar.me sandbox key behind
//! the storefront.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::{Value, json};
use uuid::Uuid;

/// HTTP client bound to one storefront session.
///
/// The cookie store keeps the session cookie, so a context behaves like one
/// browser tab: cart, uploads and login carry across requests.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
}

impl TestContext {
    /// Create a context with a fresh session.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url(),
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    pub async fn get(&self, path: &str) -> reqwest::Result<Response> {
        self.client.get(self.url(path)).send().await
    }

    /// POST `body` as JSON to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Result<Response> {
        self.client.post(self.url(path)).json(body).send().await
    }

    /// Register a throwaway account; the session is logged in afterwards.
    ///
    /// Returns the email used.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    pub async fn register(&self) -> reqwest::Result<String> {
        let email = unique_email();
        self.post_json(
            "/api/auth/register",
            &json!({
                "email": email,
                "password": TEST_PASSWORD,
                "display_name": "Cliente Teste",
            }),
        )
        .await?
        .error_for_status()?;
        Ok(email)
    }

    /// POST a create-order body with an `Idempotency-Key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    pub async fn create_order(&self, key: &str, body: &Value) -> reqwest::Result<Response> {
        self.client
            .post(self.url("/api/create-order"))
            .header("idempotency-key", key)
            .json(body)
            .send()
            .await
    }

    /// Upload a tiny model, configure it and add it to the cart.
    ///
    /// Goes through the print service for the price.
    ///
    /// # Errors
    ///
    /// Returns an error if a request fails or answers with an error status.
    pub async fn fill_cart(&self) -> reqwest::Result<Value> {
        let part = Part::bytes(SAMPLE_STL.as_bytes().to_vec()).file_name("cubo.stl");
        let uploads: Value = self
            .client
            .post(self.url("/api/uploads"))
            .multipart(Form::new().part("file", part))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let upload_id = uploads[0]["id"].as_str().unwrap_or_default().to_owned();

        self.client
            .put(self.url(&format!("/api/uploads/{upload_id}")))
            .json(&json!({ "fill": "medium", "material": "pla", "color": "Branco", "quantity": 1 }))
            .send()
            .await?
            .error_for_status()?;

        self.post_json("/api/cart/items", &json!({ "uploadId": upload_id }))
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Password used for test accounts.
pub const TEST_PASSWORD: &str = "impressao-3d-segura";

/// Base URL of the storefront under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL")
        .map(|url| url.trim_end_matches('/').to_owned())
        .unwrap_or_else(|_| "http://localhost:3000".to_owned())
}

/// An email address no other test run has used.
#[must_use]
pub fn unique_email() -> String {
    format!("teste+{}@filamento.test", Uuid::new_v4().simple())
}

/// Smallest ASCII STL the print service accepts.
pub const SAMPLE_STL: &str = "solid cubo
facet normal 0 0 1
outer loop
vertex 0 0 0
vertex 10 0 0
vertex 0 10 0
endloop
endfacet
endsolid cubo
";

/// Webhook credentials the server under test was started with.
#[must_use]
pub fn webhook_credentials() -> Option<(String, String)> {
    let username = std::env::var("PAGARME_WEBHOOK_USERNAME").ok()?;
    let password = std::env::var("PAGARME_WEBHOOK_PASSWORD").ok()?;
    Some((username, password))
}

/// A PIX create-order body for a valid buyer.
#[must_use]
pub fn pix_order() -> Value {
    json!({
        "customer": {
            "name": "Ana Souza",
            "email": "ana@exemplo.com",
            "document": "52998224725",
            "phone": "11987654321",
            "address": {
                "street": "Rua Augusta",
                "number": "1500",
                "neighborhood": "Consolação",
                "city": "São Paulo",
                "state": "SP",
                "zip_code": "01304-001",
            },
        },
        "payment": { "method": "pix" },
    })
}

/// A fresh idempotency key.
#[must_use]
pub fn unique_key() -> String {
    format!("pedido-{}", Uuid::new_v4().simple())
}

/// A valid address body for the account endpoints.
#[must_use]
pub fn sample_address() -> Value {
    json!({
        "label": "Casa",
        "street": "Rua Augusta",
        "number": "1500",
        "neighborhood": "Consolação",
        "city": "São Paulo",
        "state": "SP",
        "zip_code": "01304-001",
    })
}
