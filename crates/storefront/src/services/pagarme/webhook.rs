//! Webhook events used to reconcile local orders with the gateway.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::ExposeSecret;
use serde::Deserialize;

use filamento_core::ChargeStatus;

use super::response::GatewayOrder;
use crate::config::WebhookCredentials;

/// Envelope posted by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Status change to apply to a local order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub gateway_order_id: String,
    pub charge_status: ChargeStatus,
}

#[derive(Debug, Deserialize)]
struct ChargeData {
    #[serde(default)]
    status: ChargeStatus,
    #[serde(default)]
    order: Option<OrderRef>,
}

#[derive(Debug, Deserialize)]
struct OrderRef {
    id: String,
}

impl WebhookEvent {
    /// Extract the status update carried by `order.*` and `charge.*` events.
    ///
    /// Returns `None` for other event types or when the payload lacks an
    /// order id.
    #[must_use]
    pub fn status_update(&self) -> Option<StatusUpdate> {
        let (kind, _) = self.event_type.split_once('.')?;
        match kind {
            "order" => {
                let order: GatewayOrder = serde_json::from_value(self.data.clone()).ok()?;
                let charge_status = order.charges.first().map_or_else(
                    || ChargeStatus::from_gateway(order.status.as_deref().unwrap_or_default()),
                    |c| c.status,
                );
                Some(StatusUpdate {
                    gateway_order_id: order.id,
                    charge_status,
                })
            }
            "charge" => {
                let charge: ChargeData = serde_json::from_value(self.data.clone()).ok()?;
                Some(StatusUpdate {
                    gateway_order_id: charge.order?.id,
                    charge_status: charge.status,
                })
            }
            _ => None,
        }
    }
}

/// Check an `Authorization: Basic ...` header against the configured
/// webhook credentials.
#[must_use]
pub fn verify_basic_auth(header: Option<&str>, expected: &WebhookCredentials) -> bool {
    let Some(encoded) = header.and_then(|h| h.strip_prefix("Basic ")) else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };
    let Some((username, password)) = decoded.split_once(':') else {
        return false;
    };

    let user_ok = constant_time_eq(username.as_bytes(), expected.username.as_bytes());
    let pass_ok = constant_time_eq(
        password.as_bytes(),
        expected.password.expose_secret().as_bytes(),
    );
    user_ok & pass_ok
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use filamento_core::OrderStatus;
    use secrecy::SecretString;

    use super::*;

    fn event(json: &str) -> WebhookEvent {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_charge_paid_event() {
        let update = event(
            r#"{"id":"hook_1","type":"charge.paid","data":{"id":"ch_1","status":"paid",
                "order":{"id":"or_1","status":"paid"}}}"#,
        )
        .status_update()
        .unwrap();
        assert_eq!(
            update,
            StatusUpdate {
                gateway_order_id: "or_1".to_owned(),
                charge_status: ChargeStatus::Paid,
            }
        );
    }

    #[test]
    fn test_order_canceled_event_without_charges() {
        let update = event(r#"{"type":"order.canceled","data":{"id":"or_2","status":"canceled"}}"#)
            .status_update()
            .unwrap();
        assert_eq!(update.gateway_order_id, "or_2");
        assert_eq!(update.charge_status, ChargeStatus::Canceled);
    }

    #[test]
    fn test_order_event_prefers_charge_status() {
        let update = event(
            r#"{"type":"order.updated","data":{"id":"or_3","status":"pending",
                "charges":[{"status":"failed"}]}}"#,
        )
        .status_update()
        .unwrap();
        assert_eq!(update.charge_status, ChargeStatus::Failed);
    }

    #[test]
    fn test_chargeback_event_refunds_order() {
        let update = event(
            r#"{"type":"charge.chargedback","data":{"id":"ch_4","status":"chargedback",
                "order":{"id":"or_4"}}}"#,
        )
        .status_update()
        .unwrap();
        assert_eq!(update.charge_status, ChargeStatus::Chargedback);
        assert_eq!(update.charge_status.order_status(), OrderStatus::Refunded);
    }

    #[test]
    fn test_irrelevant_events_ignored() {
        assert!(event(r#"{"type":"customer.created","data":{"id":"cus_1"}}"#)
            .status_update()
            .is_none());
        assert!(event(r#"{"type":"charge.paid","data":{"id":"ch_1","status":"paid"}}"#)
            .status_update()
            .is_none());
    }

    #[test]
    fn test_basic_auth() {
        let creds = WebhookCredentials {
            username: "pagarme".to_owned(),
            password: SecretString::from("s3nh4-do-webhook"),
        };
        let header = format!("Basic {}", STANDARD.encode("pagarme:s3nh4-do-webhook"));
        assert!(verify_basic_auth(Some(&header), &creds));

        let wrong = format!("Basic {}", STANDARD.encode("pagarme:outra"));
        assert!(!verify_basic_auth(Some(&wrong), &creds));
        assert!(!verify_basic_auth(Some("Bearer abc"), &creds));
        assert!(!verify_basic_auth(None, &creds));
    }
}
