//! Filamento Core - Shared domain library.
//!
//! This crate provides the domain types and pure business logic used by the
//! Filamento components:
//! - `storefront` - JSON API behind the 3D printing shop
//! - `cli` - Command-line tools for migrations and offline quotes
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Everything here can be exercised from unit tests.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, and statuses
//! - [`br`] - Brazilian document, phone and CEP formatting/validation
//! - [`pricing`] - Print cost calculation from weight, material and time
//! - [`cart`] - Cart reducer and checkout snapshot
//! - [`payment`] - Payment method model with per-method validation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod br;
pub mod cart;
pub mod payment;
pub mod pricing;
pub mod types;

pub use types::*;
