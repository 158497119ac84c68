//! Cart reducer and checkout snapshot.
//!
//! The cart is a plain value: handlers load it from the session, apply one
//! operation and store it back. Totals are recomputed from the lines after
//! every operation, so `total_quantity` and `total_amount` always equal the
//! sums over `items`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::payment::Buyer;
use crate::pricing::{FillTier, Material};

/// Largest quantity a single line may hold.
pub const MAX_QUANTITY: u32 = 1000;

/// Check a line quantity: at least 1 and at most [`MAX_QUANTITY`].
///
/// # Errors
///
/// Returns [`CartError::InvalidQuantity`] when out of range.
pub const fn check_quantity(quantity: u32) -> Result<u32, CartError> {
    if quantity == 0 || quantity > MAX_QUANTITY {
        return Err(CartError::InvalidQuantity);
    }
    Ok(quantity)
}

/// Errors from cart operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("item não encontrado no carrinho: {0}")]
    ItemNotFound(String),
    #[error("quantidade inválida")]
    InvalidQuantity,
    #[error("carrinho vazio")]
    Empty,
}

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    pub name: String,
    /// Unit price.
    pub price: Decimal,
    pub quantity: u32,
    /// `price * quantity`.
    pub total_price: Decimal,
    pub material: Option<Material>,
    pub fill: Option<FillTier>,
    pub color: Option<String>,
    /// Upload id of the model this line prints.
    pub file_ref: Option<String>,
}

impl CartItem {
    /// Create a line with `total_price` computed from price and quantity.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Decimal, quantity: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            quantity,
            total_price: price * Decimal::from(quantity),
            material: None,
            fill: None,
            color: None,
            file_ref: None,
        }
    }

    fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
        self.total_price = self.price * Decimal::from(quantity);
    }
}

/// Shopping cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub total_quantity: u32,
    pub total_amount: Decimal,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add a line, merging with an existing line of the same id.
    ///
    /// When merging, the existing line keeps its price and gains the incoming
    /// quantity.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] for a zero quantity or when the
    /// line would exceed [`MAX_QUANTITY`].
    pub fn add_item(&mut self, item: CartItem) -> Result<(), CartError> {
        check_quantity(item.quantity)?;

        if let Some(existing) = self.items.iter_mut().find(|i| i.id == item.id) {
            let quantity = existing
                .quantity
                .checked_add(item.quantity)
                .ok_or(CartError::InvalidQuantity)
                .and_then(check_quantity)?;
            existing.set_quantity(quantity);
        } else {
            let mut item = item;
            let quantity = item.quantity;
            item.set_quantity(quantity);
            self.items.push(item);
        }

        self.recompute();
        Ok(())
    }

    /// Set the quantity of a line. Zero removes it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotFound`] if no line has `id`, and
    /// [`CartError::InvalidQuantity`] above [`MAX_QUANTITY`].
    pub fn update_quantity(&mut self, id: &str, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove_item(id);
        }
        check_quantity(quantity)?;

        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| CartError::ItemNotFound(id.to_owned()))?;
        item.set_quantity(quantity);

        self.recompute();
        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotFound`] if no line has `id`.
    pub fn remove_item(&mut self, id: &str) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        if self.items.len() == before {
            return Err(CartError::ItemNotFound(id.to_owned()));
        }

        self.recompute();
        Ok(())
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
        self.recompute();
    }

    fn recompute(&mut self) {
        self.total_quantity = self
            .items
            .iter()
            .fold(0_u32, |total, i| total.saturating_add(i.quantity));
        self.total_amount = self.items.iter().map(|i| i.total_price).sum();
    }
}

/// Cart and buyer frozen at checkout, consumed once by the payment step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutData {
    pub cart: Cart,
    pub buyer: Buyer,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl CheckoutData {
    /// Snapshot the cart for payment.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Empty`] if the cart has no lines.
    pub fn snapshot(cart: &Cart, buyer: Buyer, now: DateTime<Utc>) -> Result<Self, CartError> {
        if cart.is_empty() {
            return Err(CartError::Empty);
        }
        Ok(Self {
            cart: cart.clone(),
            buyer,
            total_amount: cart.total_amount,
            created_at: now,
        })
    }
}
