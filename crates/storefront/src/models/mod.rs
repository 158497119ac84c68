//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`] and from the session payloads in [`session`].

pub mod address;
pub mod order;
pub mod session;
pub mod user;

pub use address::{Address, AddressInput};
pub use order::{NewOrder, Order};
pub use session::CurrentUser;
pub use user::{ProfileUpdate, User, UserProfile};
