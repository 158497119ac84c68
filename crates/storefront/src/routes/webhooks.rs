//! Payment gateway webhooks.
//!
//! The gateway posts `order.*` and `charge.*` events with HTTP Basic auth.
//! The body is only parsed once the credentials check out. Each event
//! updates the status of the matching local order unless that would move it
//! backwards. Events for orders we don't know are acknowledged so the
//! gateway stops retrying.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header::AUTHORIZATION},
};
use serde::Serialize;
use tracing::instrument;

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::services::pagarme::{WebhookEvent, verify_basic_auth};
use crate::state::AppState;

/// Webhook acknowledgement.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub updated: bool,
}

/// POST /api/webhooks/pagarme
///
/// # Errors
///
/// Returns `401` when webhook credentials are not configured or the request
/// does not carry them, and `400` when an authenticated body is not a
/// webhook event.
#[instrument(skip_all, fields(event_id, event_type))]
pub async fn pagarme(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let Some(credentials) = &state.config().pagarme.webhook else {
        tracing::warn!("Webhook received but no webhook credentials are configured");
        return Err(AppError::Unauthorized("Webhook não autorizado".to_owned()));
    };
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    if !verify_basic_auth(authorization, credentials) {
        tracing::warn!("Webhook with invalid credentials");
        return Err(AppError::Unauthorized("Webhook não autorizado".to_owned()));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("Evento de webhook inválido".to_owned()))?;
    let span = tracing::Span::current();
    span.record("event_type", event.event_type.as_str());
    if let Some(id) = &event.id {
        span.record("event_id", id.as_str());
    }

    let Some(update) = event.status_update() else {
        tracing::debug!("Ignoring webhook event");
        return Ok(Json(WebhookAck {
            received: true,
            updated: false,
        }));
    };

    let updated = OrderRepository::new(state.pool())
        .update_status(&update.gateway_order_id, update.charge_status)
        .await?;

    if updated {
        tracing::info!(
            gateway_order_id = %update.gateway_order_id,
            charge_status = %update.charge_status,
            "Order status updated from webhook"
        );
    } else {
        tracing::info!(
            gateway_order_id = %update.gateway_order_id,
            charge_status = %update.charge_status,
            "Webhook for unknown order or out-of-order status"
        );
    }

    Ok(Json(WebhookAck {
        received: true,
        updated,
    }))
}
