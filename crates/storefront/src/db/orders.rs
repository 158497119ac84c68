//! Order repository.
//!
//! Orders are keyed locally by `id` and deduplicated by `(owner,
//! idempotency_key)`; webhook reconciliation finds them by
//! `gateway_order_id`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use filamento_core::cart::CartItem;
use filamento_core::{ChargeStatus, OrderId, OrderStatus, UserId};

use super::RepositoryError;
use crate::models::order::{NewOrder, Order};
use crate::services::pagarme::OrderOutcome;

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: Option<i32>,
    owner: String,
    idempotency_key: String,
    request_fingerprint: String,
    gateway_order_id: String,
    status: String,
    charge_status: String,
    payment_method: String,
    total_amount: Decimal,
    items: Json<Vec<CartItem>>,
    customer_name: String,
    customer_email: String,
    outcome: Json<OrderOutcome>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<OrderStatus>()
            .map_err(RepositoryError::DataCorruption)?;
        let payment_method = row
            .payment_method
            .parse()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: OrderId::new(row.id),
            user_id: row.user_id.map(UserId::new),
            owner: row.owner,
            idempotency_key: row.idempotency_key,
            request_fingerprint: row.request_fingerprint,
            gateway_order_id: row.gateway_order_id,
            status,
            charge_status: ChargeStatus::from_gateway(&row.charge_status),
            payment_method,
            total_amount: row.total_amount,
            items: row.items.0,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            outcome: row.outcome.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, user_id, owner, idempotency_key, request_fingerprint, \
                             gateway_order_id, status, charge_status, payment_method, \
                             total_amount, items, customer_name, customer_email, outcome, \
                             created_at, updated_at";

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record an order after the gateway answered.
    ///
    /// If the owner already has an order with the same idempotency key it is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if stored data is invalid.
    pub async fn create(&self, order: &NewOrder<'_>) -> Result<Order, RepositoryError> {
        let inserted = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO storefront.order
                (user_id, owner, idempotency_key, request_fingerprint, gateway_order_id,
                 status, charge_status, payment_method, total_amount, items,
                 customer_name, customer_email, outcome)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (owner, idempotency_key) DO NOTHING
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.user_id)
        .bind(order.owner)
        .bind(order.idempotency_key)
        .bind(order.request_fingerprint)
        .bind(&order.outcome.order_id)
        .bind(order.status().as_str())
        .bind(order.outcome.charge_status.as_str())
        .bind(order.outcome.payment_method.as_str())
        .bind(order.total_amount)
        .bind(Json(order.items))
        .bind(order.customer_name)
        .bind(order.customer_email)
        .bind(Json(order.outcome))
        .fetch_optional(self.pool)
        .await?;

        match inserted {
            Some(row) => Order::try_from(row),
            None => self
                .get_by_idempotency_key(order.owner, order.idempotency_key)
                .await?
                .ok_or(RepositoryError::NotFound),
        }
    }

    /// Find the order `owner` created with `key`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_idempotency_key(
        &self,
        owner: &str,
        key: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM storefront.order
            WHERE owner = $1 AND idempotency_key = $2
            "
        ))
        .bind(owner)
        .bind(key)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM storefront.order
            WHERE user_id = $1
            ORDER BY created_at DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    /// One of a user's orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.order WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Apply a gateway status to the order with `gateway_order_id`.
    ///
    /// The update only happens when the order's current status may move to
    /// the new one (see [`OrderStatus::can_transition_to`]), so a late or
    /// out-of-order event never undoes a settled payment.
    ///
    /// # Returns
    ///
    /// Returns `true` if an order was updated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_status(
        &self,
        gateway_order_id: &str,
        charge_status: ChargeStatus,
    ) -> Result<bool, RepositoryError> {
        let next = charge_status.order_status();
        let sources: Vec<&str> = OrderStatus::sources_of(next)
            .into_iter()
            .map(OrderStatus::as_str)
            .collect();

        let result = sqlx::query(
            r"
            UPDATE storefront.order
            SET status = $2, charge_status = $3, updated_at = NOW()
            WHERE gateway_order_id = $1 AND status = ANY($4)
            ",
        )
        .bind(gateway_order_id)
        .bind(next.as_str())
        .bind(charge_status.as_str())
        .bind(sources)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
