//! Order domain types.
//!
//! Orders are immutable after creation except for status transitions; item
//! prices are frozen at order-creation time and never recomputed from the
//! live product.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use verdant_core::{OrderId, OrderStatus, OrderToken, ProductId, Size, UserId, VariantId};

/// A completed order with its items.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    /// Internal row ID.
    pub id: OrderId,
    /// Externally-visible opaque identifier.
    #[serde(rename = "order_id")]
    pub token: OrderToken,
    /// Owning user; orders cannot be anonymous.
    #[serde(rename = "user")]
    pub user_id: UserId,
    /// Contact email, defaulted from the user's profile when not supplied.
    pub email: String,
    /// Free-form shipping address.
    pub shipping_address: String,
    /// Sum of item subtotals, computed once at creation.
    pub total_amount: Decimal,
    /// Lifecycle status.
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub updated_at: DateTime<Utc>,
    /// The order's items; cascade-deleted with the order.
    pub items: Vec<OrderItem>,
}

/// One line of an order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    /// Internal row ID.
    pub id: i32,
    /// Referenced product.
    #[serde(rename = "product")]
    pub product_id: ProductId,
    pub product_title: String,
    pub product_image: String,
    /// Referenced variant, if any.
    #[serde(rename = "variant")]
    pub variant_id: Option<VariantId>,
    pub size: Option<Size>,
    pub color: Option<String>,
    pub quantity: u32,
    /// Unit price frozen at order-creation time.
    pub price: Decimal,
}
