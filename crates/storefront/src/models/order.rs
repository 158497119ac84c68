//! Orders placed through the payment gateway.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use filamento_core::cart::CartItem;
use filamento_core::payment::PaymentMethodKind;
use filamento_core::{ChargeStatus, OrderId, OrderStatus, UserId};

use crate::services::pagarme::OrderOutcome;

/// A stored order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(skip)]
    pub user_id: Option<UserId>,
    /// Who may replay this order's idempotency key.
    #[serde(skip)]
    pub owner: String,
    #[serde(skip)]
    pub idempotency_key: String,
    #[serde(skip)]
    pub request_fingerprint: String,
    pub gateway_order_id: String,
    pub status: OrderStatus,
    pub charge_status: ChargeStatus,
    pub payment_method: PaymentMethodKind,
    pub total_amount: Decimal,
    pub items: Vec<CartItem>,
    pub customer_name: String,
    pub customer_email: String,
    /// Normalized gateway answer at creation time.
    pub outcome: OrderOutcome,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new order.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub user_id: Option<UserId>,
    pub owner: &'a str,
    pub idempotency_key: &'a str,
    pub request_fingerprint: &'a str,
    pub total_amount: Decimal,
    pub items: &'a [CartItem],
    pub customer_name: &'a str,
    pub customer_email: &'a str,
    pub outcome: &'a OrderOutcome,
}

impl NewOrder<'_> {
    /// Local status derived from the gateway outcome.
    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        if self.outcome.success {
            match self.outcome.charge_status {
                ChargeStatus::Unknown => self.outcome.transaction_status.order_status(),
                status => status.order_status(),
            }
        } else {
            match self.outcome.charge_status {
                ChargeStatus::Canceled => OrderStatus::Canceled,
                _ => OrderStatus::Failed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(success: bool, charge_status: ChargeStatus) -> OrderOutcome {
        OrderOutcome {
            success,
            order_id: "or_1".to_owned(),
            order_status: None,
            charge_status,
            transaction_status: ChargeStatus::Unknown,
            payment_method: PaymentMethodKind::Pix,
            boleto: None,
            pix: None,
            message: None,
        }
    }

    fn new_order(outcome: &OrderOutcome) -> NewOrder<'_> {
        NewOrder {
            user_id: None,
            owner: "session:t",
            idempotency_key: "k",
            request_fingerprint: "f",
            total_amount: Decimal::ONE,
            items: &[],
            customer_name: "Ana",
            customer_email: "ana@exemplo.com",
            outcome,
        }
    }

    #[test]
    fn test_status_from_outcome() {
        let paid = outcome(true, ChargeStatus::Paid);
        assert_eq!(new_order(&paid).status(), OrderStatus::Paid);

        let generated = outcome(true, ChargeStatus::Generated);
        assert_eq!(new_order(&generated).status(), OrderStatus::Pending);

        // Successful transaction on a charge the gateway hasn't settled yet
        let settling = outcome(true, ChargeStatus::Unknown);
        assert_eq!(new_order(&settling).status(), OrderStatus::Processing);

        let refused = outcome(false, ChargeStatus::Failed);
        assert_eq!(new_order(&refused).status(), OrderStatus::Failed);

        let canceled = outcome(false, ChargeStatus::Canceled);
        assert_eq!(new_order(&canceled).status(), OrderStatus::Canceled);
    }

    #[test]
    fn test_status_falls_back_to_transaction() {
        let mut captured = outcome(true, ChargeStatus::Unknown);
        captured.transaction_status = ChargeStatus::Captured;
        assert_eq!(new_order(&captured).status(), OrderStatus::Paid);

        let mut overpaid = outcome(true, ChargeStatus::Overpaid);
        overpaid.transaction_status = ChargeStatus::Paid;
        assert_eq!(new_order(&overpaid).status(), OrderStatus::Paid);
    }
}
