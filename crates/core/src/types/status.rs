//! Status enums for orders and gateway charges.

use serde::{Deserialize, Serialize};

/// Local order status.
///
/// Stored as text in `storefront.order.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Waiting for payment (boleto not paid yet, PIX not scanned yet).
    #[default]
    Pending,
    /// The gateway is still processing the charge.
    Processing,
    /// Payment confirmed.
    Paid,
    /// Payment refused or errored.
    Failed,
    /// Canceled or expired.
    Canceled,
    /// Paid, then refunded or charged back.
    Refunded,
}

impl OrderStatus {
    /// Every status.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Processing,
        Self::Paid,
        Self::Failed,
        Self::Canceled,
        Self::Refunded,
    ];

    /// Whether an order in this status may move to `next`.
    ///
    /// Gateway events arrive in any order, so a late `pending` must not undo
    /// a payment. Only these moves are allowed:
    /// - `pending` to anything else
    /// - `processing` to a settled status
    /// - `paid` to `refunded`
    /// - `failed` or `canceled` to `paid` (money arrived after all)
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Pending, Self::Pending)
            | (Self::Processing, Self::Pending | Self::Processing) => false,
            (Self::Pending | Self::Processing, _)
            | (Self::Paid, Self::Refunded)
            | (Self::Failed | Self::Canceled, Self::Paid) => true,
            _ => false,
        }
    }

    /// Statuses from which an order may move to `next`.
    #[must_use]
    pub fn sources_of(next: Self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(next))
            .collect()
    }

    /// The database/text representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            "refunded" => Ok(Self::Refunded),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Charge or transaction status reported by the payment gateway.
///
/// Covers both charge statuses (`paid`, `overpaid`, `chargedback`, ...) and
/// the per-method transaction statuses (`captured`, `not_authorized`,
/// `generated`, ...). Unrecognized strings map to [`ChargeStatus::Unknown`]
/// instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Paid,
    Pending,
    /// Boleto or PIX code generated and awaiting payment.
    Generated,
    /// Boleto opened by the payer.
    Viewed,
    /// Card authorized but not captured.
    Authorized,
    #[serde(alias = "waiting_capture")]
    AuthorizedPendingCapture,
    /// Card amount captured.
    Captured,
    PartialCaptured,
    Processing,
    WaitingPayment,
    Overpaid,
    Underpaid,
    NotAuthorized,
    WithError,
    Failed,
    #[serde(alias = "cancelled", alias = "voided")]
    Canceled,
    Refunded,
    Chargedback,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ChargeStatus {
    /// Parse a gateway status string, mapping anything unrecognized to
    /// [`ChargeStatus::Unknown`].
    #[must_use]
    pub fn from_gateway(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "paid" => Self::Paid,
            "pending" => Self::Pending,
            "generated" => Self::Generated,
            "viewed" => Self::Viewed,
            "authorized" => Self::Authorized,
            "authorized_pending_capture" | "waiting_capture" => Self::AuthorizedPendingCapture,
            "captured" => Self::Captured,
            "partial_captured" => Self::PartialCaptured,
            "processing" => Self::Processing,
            "waiting_payment" => Self::WaitingPayment,
            "overpaid" => Self::Overpaid,
            "underpaid" => Self::Underpaid,
            "not_authorized" => Self::NotAuthorized,
            "with_error" => Self::WithError,
            "failed" => Self::Failed,
            "canceled" | "cancelled" | "voided" => Self::Canceled,
            "refunded" => Self::Refunded,
            "chargedback" => Self::Chargedback,
            _ => Self::Unknown,
        }
    }

    /// Whether the checkout should be reported as successful.
    ///
    /// Boleto and PIX charges are successful once generated, even though no
    /// money moved yet.
    #[must_use]
    pub const fn is_successful(self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Pending | Self::Generated | Self::Authorized
        )
    }

    /// Map the gateway status onto the local order lifecycle.
    #[must_use]
    pub const fn order_status(self) -> OrderStatus {
        match self {
            Self::Paid | Self::Captured | Self::PartialCaptured | Self::Overpaid => {
                OrderStatus::Paid
            }
            Self::Pending
            | Self::Generated
            | Self::Viewed
            | Self::WaitingPayment
            | Self::Authorized
            | Self::AuthorizedPendingCapture
            | Self::Underpaid => OrderStatus::Pending,
            Self::Processing | Self::Unknown => OrderStatus::Processing,
            Self::Failed | Self::NotAuthorized | Self::WithError => OrderStatus::Failed,
            Self::Canceled => OrderStatus::Canceled,
            Self::Refunded | Self::Chargedback => OrderStatus::Refunded,
        }
    }

    /// The gateway's string for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Pending => "pending",
            Self::Generated => "generated",
            Self::Viewed => "viewed",
            Self::Authorized => "authorized",
            Self::AuthorizedPendingCapture => "authorized_pending_capture",
            Self::Captured => "captured",
            Self::PartialCaptured => "partial_captured",
            Self::Processing => "processing",
            Self::WaitingPayment => "waiting_payment",
            Self::Overpaid => "overpaid",
            Self::Underpaid => "underpaid",
            Self::NotAuthorized => "not_authorized",
            Self::WithError => "with_error",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Refunded => "refunded",
            Self::Chargedback => "chargedback",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
