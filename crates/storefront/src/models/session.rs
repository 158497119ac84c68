//! Session-related types.
//!
//! The session carries the logged-in identity plus the shopping state the
//! browser would otherwise keep locally: uploads, cart and checkout snapshot.

use serde::{Deserialize, Serialize};

use filamento_core::{Email, UserId};

/// Session-stored user identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the shopping cart.
    pub const CART: &str = "cart";

    /// Key for the checkout snapshot consumed by the payment step.
    pub const CHECKOUT: &str = "checkout";

    /// Key for uploaded file metadata.
    pub const UPLOADS: &str = "uploads";

    /// Key for the token that owns this session's anonymous orders.
    pub const ORDER_OWNER: &str = "order_owner";
}
