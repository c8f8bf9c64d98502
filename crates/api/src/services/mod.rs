//! Business logic between the route handlers and the storage traits.

pub mod auth;
pub mod cart;
pub mod checkout;
