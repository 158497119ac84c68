//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Email/password accounts and profiles
//! - `pagarme` - Payment gateway orders and webhooks
//! - `print_service` - Slicing/estimation service client
//! - `uploads` - In-memory store for uploaded model files

pub mod auth;
pub mod pagarme;
pub mod print_service;
pub mod uploads;

pub use auth::{AuthError, AuthService};
pub use pagarme::{PagarmeClient, PagarmeError};
pub use print_service::{PrintServiceClient, PrintServiceError};
pub use uploads::{UploadError, UploadStore};
