//! Request extractors for authentication and cart identity.

pub mod auth;

pub use auth::{CartIdentity, CurrentUser};
