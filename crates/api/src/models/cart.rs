//! Cart domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use verdant_core::{CartItemId, CartOwner, ProductId, Size, VariantId, pricing};

use super::catalog::{Product, ProductVariant};

/// One line of a cart ledger.
///
/// `(owner, product, variant)` is unique within the ledger: a repeat add for
/// the same triple increments `quantity` instead of creating a second row.
#[derive(Debug, Clone)]
pub struct CartItem {
    /// Unique cart item ID.
    pub id: CartItemId,
    /// The ledger this item belongs to.
    pub owner: CartOwner,
    /// Referenced product.
    pub product_id: ProductId,
    /// Referenced variant, if any.
    pub variant_id: Option<VariantId>,
    /// Accumulated quantity, always >= 1.
    pub quantity: u32,
    /// Creation time; cart listings are ordered by this ascending.
    pub created_at: DateTime<Utc>,
}

/// A cart line joined with product/variant data for display.
///
/// The unit price is derived at read time (discount price wins); it is never
/// stored on the cart item itself.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    /// Cart item ID.
    pub id: CartItemId,
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
    /// Effective unit price at read time.
    pub unit_price: Decimal,
    /// `unit_price * quantity`.
    pub total_price: Decimal,
}

impl CartLine {
    /// Build a display line from a cart item and its referenced records.
    #[must_use]
    pub fn new(item: &CartItem, product: &Product, variant: Option<&ProductVariant>) -> Self {
        let unit_price = pricing::effective_unit_price(product.price, product.discount_price);
        Self {
            id: item.id,
            product_id: item.product_id,
            product_title: product.title.clone(),
            product_image: product.image_url.clone(),
            variant_id: item.variant_id,
            size: variant.map(|v| v.size.clone()),
            color: variant.map(|v| v.color.clone()),
            quantity: item.quantity,
            unit_price,
            total_price: pricing::line_total(unit_price, item.quantity),
        }
    }
}
