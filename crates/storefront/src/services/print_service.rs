//! Client for the slicing/estimation service.
//!
//! The service slices an uploaded model and reports the filament weight and
//! print time. Prices are computed locally from that estimate; a failed
//! estimate for one material never blocks the others.

use axum::body::Bytes;
use futures::future::join_all;
use reqwest::multipart::{Form, Part};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{instrument, warn};

use filamento_core::cart::Cart;
use filamento_core::pricing::{
    EnergyRates, FillTier, Material, MaterialQuote, PrintTime, SliceEstimate, quote_estimate,
};

use crate::config::PrintServiceConfig;

/// Errors from the estimation service.
#[derive(Debug, Error)]
pub enum PrintServiceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service did not answer in time.
    #[error("estimation service timed out")]
    Timeout,

    /// The service answered with an error status.
    #[error("estimation service error: {status} - {message}")]
    Service { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl PrintServiceError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(e)
        }
    }
}

/// A model file held in memory for slicing.
#[derive(Debug, Clone)]
pub struct ModelFile {
    pub name: String,
    pub bytes: Bytes,
}

#[derive(Debug, Deserialize)]
struct EstimateResponse {
    #[serde(default)]
    time: Option<PrintTime>,
    #[serde(default)]
    material: Option<MaterialEstimate>,
}

#[derive(Debug, Deserialize)]
struct MaterialEstimate {
    #[serde(default)]
    weight_grams: Option<Decimal>,
}

impl From<EstimateResponse> for SliceEstimate {
    fn from(response: EstimateResponse) -> Self {
        Self {
            weight_grams: response.material.and_then(|m| m.weight_grams),
            time: response.time,
        }
    }
}

#[derive(Debug, Serialize)]
struct PaymentSessionItem<'a> {
    name: &'a str,
    price: Decimal,
    quantity: u32,
}

#[derive(Debug, Serialize)]
struct PaymentSessionRequest<'a> {
    items: Vec<PaymentSessionItem<'a>>,
    total: Decimal,
}

/// Hosted checkout session created by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub url: String,
    #[serde(default)]
    pub id: Option<String>,
}

/// Estimation service client.
#[derive(Clone)]
pub struct PrintServiceClient {
    client: reqwest::Client,
    base_url: String,
    rates: EnergyRates,
}

impl PrintServiceClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PrintServiceConfig) -> Result<Self, PrintServiceError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            rates: config.energy,
        })
    }

    /// Energy rates used for pricing.
    #[must_use]
    pub const fn rates(&self) -> &EnergyRates {
        &self.rates
    }

    /// Slice `file` and return the raw estimate.
    ///
    /// # Errors
    ///
    /// Returns `PrintServiceError` if the request fails, times out, or the
    /// service answers with a non-2xx status.
    #[instrument(skip(self, file), fields(file = %file.name, material = %material, fill = fill.as_str()))]
    pub async fn estimate(
        &self,
        file: &ModelFile,
        fill: FillTier,
        material: Material,
        quantity: u32,
    ) -> Result<SliceEstimate, PrintServiceError> {
        let part = Part::stream(reqwest::Body::from(file.bytes.clone()))
            .file_name(file.name.clone())
            .mime_str("application/octet-stream")?;
        let form = Form::new()
            .part("stl_file", part)
            .text("infill", fill.percent().to_string())
            .text("material", material.id())
            .text("quantity", quantity.to_string());

        let response = self
            .client
            .post(format!("{}/estimate", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(PrintServiceError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PrintServiceError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let estimate: EstimateResponse = response
            .json()
            .await
            .map_err(|e| PrintServiceError::Parse(e.to_string()))?;
        Ok(estimate.into())
    }

    /// Price `file` in every material concurrently.
    ///
    /// Each failed estimate is logged and reported as an unavailable quote.
    #[instrument(skip(self, file), fields(file = %file.name, fill = fill.as_str()))]
    pub async fn quote_all(
        &self,
        file: &ModelFile,
        fill: FillTier,
        quantity: u32,
    ) -> Vec<MaterialQuote> {
        let estimates = Material::ALL.map(|material| async move {
            match self.estimate(file, fill, material, quantity).await {
                Ok(estimate) => quote_estimate(&estimate, material, quantity, &self.rates),
                Err(e) => {
                    warn!(error = %e, material = %material, "Estimate unavailable");
                    MaterialQuote {
                        material,
                        quote: None,
                    }
                }
            }
        });

        join_all(estimates).await
    }

    /// Create a hosted payment session for the cart.
    ///
    /// # Errors
    ///
    /// Returns `PrintServiceError` if the request fails or the response has
    /// no session URL.
    #[instrument(skip(self, cart), fields(items = cart.items.len()))]
    pub async fn create_payment_session(
        &self,
        cart: &Cart,
    ) -> Result<PaymentSession, PrintServiceError> {
        let body = PaymentSessionRequest {
            items: cart
                .items
                .iter()
                .map(|i| PaymentSessionItem {
                    name: &i.name,
                    price: i.price,
                    quantity: i.quantity,
                })
                .collect(),
            total: cart.total_amount,
        };

        let response = self
            .client
            .post(format!("{}/create-payment", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(PrintServiceError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PrintServiceError::Service {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| PrintServiceError::Parse(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_response_conversion() {
        let response: EstimateResponse = serde_json::from_str(
            r#"{"time":{"hours":2,"minutes":15,"seconds":0},"material":{"weight_grams":48.5}}"#,
        )
        .unwrap();
        let estimate = SliceEstimate::from(response);
        assert_eq!(estimate.weight_grams, Some(Decimal::new(485, 1)));
        assert_eq!(
            estimate.time,
            Some(PrintTime {
                hours: 2,
                minutes: 15,
                seconds: 0,
            })
        );
    }

    #[test]
    fn test_partial_estimate_response() {
        let response: EstimateResponse =
            serde_json::from_str(r#"{"time":{"minutes":40}}"#).unwrap();
        let estimate = SliceEstimate::from(response);
        assert_eq!(estimate.weight_grams, None);
        assert_eq!(estimate.time.map(|t| t.minutes), Some(40));
    }

    #[tokio::test]
    async fn test_unreachable_service_marks_every_material_unavailable() {
        let client = PrintServiceClient::new(&PrintServiceConfig {
            // Reserved port, nothing listens there
            base_url: "http://127.0.0.1:9".to_owned(),
            timeout: std::time::Duration::from_secs(2),
            energy: EnergyRates::default(),
        })
        .unwrap();
        let file = ModelFile {
            name: "cubo.stl".to_owned(),
            bytes: Bytes::from_static(b"solid cubo\nendsolid cubo\n"),
        };

        let quotes = client.quote_all(&file, FillTier::Medium, 1).await;
        assert_eq!(quotes.len(), Material::ALL.len());
        assert!(quotes.iter().all(|q| !q.is_available()));
    }

    #[test]
    fn test_payment_session_request_shape() {
        let mut cart = Cart::new();
        cart.add_item(filamento_core::cart::CartItem::new(
            "a",
            "Vaso",
            Decimal::new(2550, 2),
            2,
        ))
        .unwrap();
        let body = PaymentSessionRequest {
            items: cart
                .items
                .iter()
                .map(|i| PaymentSessionItem {
                    name: &i.name,
                    price: i.price,
                    quantity: i.quantity,
                })
                .collect(),
            total: cart.total_amount,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["items"][0]["name"], "Vaso");
        assert_eq!(json["total"], "51.00");
    }
}
