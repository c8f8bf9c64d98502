//! Domain models for the API.
//!
//! These types represent validated domain objects separate from database row
//! types; the storage adapters convert rows into them at the boundary.

pub mod cart;
pub mod catalog;
pub mod order;
pub mod user;

pub use cart::{CartItem, CartLine};
pub use catalog::{Category, Product, ProductDetail, ProductFilter, ProductVariant};
pub use order::{Order, OrderItem};
pub use user::{ProfileUpdate, User};
