//! Gateway response schema and its normalized form.
//!
//! The gateway body is deserialized once into [`GatewayOrder`]. Everything
//! the storefront reports back comes from [`normalize`], which reads the
//! first charge and its last transaction.

use serde::{Deserialize, Serialize};

use filamento_core::ChargeStatus;
use filamento_core::payment::PaymentMethodKind;

/// `POST /orders` response.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub charges: Vec<GatewayCharge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayCharge {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: ChargeStatus,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub last_transaction: Option<GatewayTransaction>,
}

/// Last transaction of a charge. Method-specific fields are absent for the
/// other methods.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayTransaction {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: ChargeStatus,
    #[serde(default)]
    pub transaction_type: Option<String>,
    // boleto
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub pdf: Option<String>,
    #[serde(default)]
    pub line: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub due_at: Option<String>,
    // pix
    #[serde(default)]
    pub qr_code: Option<String>,
    #[serde(default)]
    pub qr_code_url: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    // credit card
    #[serde(default)]
    pub acquirer_message: Option<String>,
    #[serde(default)]
    pub gateway_response: Option<GatewayResponse>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub errors: Vec<GatewayResponseError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayResponseError {
    pub message: String,
}

/// Error body of a non-2xx response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    /// `{ "field": ["msg", ...] }`, occasionally `{ "field": "msg" }`.
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

impl GatewayErrorBody {
    /// One line: the message followed by `field: msg; field: msg`.
    #[must_use]
    pub fn flatten(&self) -> String {
        let details = self.errors.as_ref().map(flatten_errors).unwrap_or_default();
        match (self.message.as_deref().map(str::trim), details.is_empty()) {
            (Some(message), true) if !message.is_empty() => message.to_owned(),
            (Some(message), false) if !message.is_empty() => format!("{message} {details}"),
            (_, false) => details,
            _ => "Erro ao processar pagamento".to_owned(),
        }
    }
}

fn flatten_errors(errors: &serde_json::Value) -> String {
    let serde_json::Value::Object(map) = errors else {
        return errors.as_str().map(str::to_owned).unwrap_or_default();
    };

    let mut parts = Vec::new();
    for (field, value) in map {
        match value {
            serde_json::Value::Array(messages) => {
                for message in messages.iter().filter_map(serde_json::Value::as_str) {
                    parts.push(format!("{field}: {message}"));
                }
            }
            serde_json::Value::String(message) => parts.push(format!("{field}: {message}")),
            _ => {}
        }
    }
    parts.join("; ")
}

/// Boleto details for the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoletoInfo {
    pub url: Option<String>,
    pub pdf: Option<String>,
    pub barcode: Option<String>,
    pub line: Option<String>,
    pub due_at: Option<String>,
}

/// PIX details for the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixInfo {
    pub qr_code: Option<String>,
    pub qr_code_url: Option<String>,
    pub expires_at: Option<String>,
}

/// What the storefront reports after a payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderOutcome {
    pub success: bool,
    /// Gateway order id.
    pub order_id: String,
    pub order_status: Option<String>,
    pub charge_status: ChargeStatus,
    pub transaction_status: ChargeStatus,
    pub payment_method: PaymentMethodKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boleto: Option<BoletoInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pix: Option<PixInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Reduce a gateway order to an [`OrderOutcome`].
///
/// The attempt succeeded when the charge or its last transaction is in a
/// successful status.
#[must_use]
pub fn normalize(order: &GatewayOrder, method: PaymentMethodKind) -> OrderOutcome {
    let charge = order.charges.first();
    let transaction = charge.and_then(|c| c.last_transaction.as_ref());

    let charge_status = charge.map_or(ChargeStatus::Unknown, |c| c.status);
    let transaction_status = transaction.map_or(ChargeStatus::Unknown, |t| t.status);
    let success = charge_status.is_successful() || transaction_status.is_successful();

    let boleto = transaction
        .filter(|_| method == PaymentMethodKind::Boleto)
        .map(|t| BoletoInfo {
            url: t.url.clone(),
            pdf: t.pdf.clone(),
            barcode: t.barcode.clone(),
            line: t.line.clone(),
            due_at: t.due_at.clone(),
        });
    let pix = transaction
        .filter(|_| method == PaymentMethodKind::Pix)
        .map(|t| PixInfo {
            qr_code: t.qr_code.clone(),
            qr_code_url: t.qr_code_url.clone(),
            expires_at: t.expires_at.clone(),
        });

    let message = if success {
        None
    } else if charge.is_none() {
        Some("Pagamento não processado pela operadora".to_owned())
    } else {
        Some(refusal_message(transaction))
    };

    OrderOutcome {
        success,
        order_id: order.id.clone(),
        order_status: order.status.clone(),
        charge_status,
        transaction_status,
        payment_method: method,
        boleto,
        pix,
        message,
    }
}

fn refusal_message(transaction: Option<&GatewayTransaction>) -> String {
    let Some(transaction) = transaction else {
        return "Pagamento recusado".to_owned();
    };

    let errors: Vec<&str> = transaction
        .gateway_response
        .iter()
        .flat_map(|r| r.errors.iter())
        .map(|e| e.message.as_str())
        .collect();
    if !errors.is_empty() {
        return errors.join("; ");
    }

    transaction
        .acquirer_message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or("Pagamento recusado")
        .to_owned()
}
