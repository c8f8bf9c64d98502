//! Verdant Core - Shared domain types.
//!
//! This crate provides the common types used across all Verdant components:
//! - `api` - Public JSON API for the storefront
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, emails, owner keys, sizes,
//!   and order statuses
//! - [`pricing`] - Effective-price and order-total arithmetic
//! - [`slug`] - Slug derivation for categories and products

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod pricing;
pub mod slug;
pub mod types;

pub use slug::slugify;
pub use types::*;
