//! Catalog domain types: categories, products, and variants.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use verdant_core::{CategoryId, ProductId, Size, VariantId};

/// A product category.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    /// Unique category ID.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// Unique URL slug, derived from the name at creation when absent.
    pub slug: String,
    /// Optional description.
    pub description: Option<String>,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub updated_at: DateTime<Utc>,
}

/// A product in the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Display title.
    pub title: String,
    /// Unique URL slug, derived from the title at creation when absent.
    pub slug: String,
    /// Owning category.
    #[serde(rename = "category")]
    pub category_id: CategoryId,
    /// Denormalized category name for listings.
    pub category_name: String,
    /// Long-form description.
    pub description: String,
    /// List price.
    pub price: Decimal,
    /// Discounted price; wins over `price` for display and checkout when set.
    pub discount_price: Option<Decimal>,
    /// Units on hand (display only; never reserved or decremented here).
    pub inventory: i32,
    /// Primary image URL.
    pub image_url: String,
    /// Whether the product is featured on the home page.
    pub is_featured: bool,
    /// Inactive products are hidden from listings but stay resolvable for
    /// carts that already reference them.
    pub is_active: bool,
    /// Fabric/material composition.
    pub materials: Option<String>,
    /// Sustainability rating, 0 (not rated) to 5 (highly sustainable).
    pub sustainability_rating: i16,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub updated_at: DateTime<Utc>,
}

/// A size/color variant of a product.
///
/// `(product, size, color)` is unique.
#[derive(Debug, Clone, Serialize)]
pub struct ProductVariant {
    /// Unique variant ID.
    pub id: VariantId,
    /// Owning product.
    #[serde(rename = "product")]
    pub product_id: ProductId,
    /// Variant size.
    pub size: Size,
    /// Variant color.
    pub color: String,
    /// Units on hand for this variant.
    pub stock: i32,
    /// Variant-specific image, if any.
    pub image_url: Option<String>,
}

/// Product detail response: the product plus its variants.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<ProductVariant>,
}

/// Filter predicates for product listings.
///
/// All predicates are AND-combined; the free-text search is OR-combined
/// across title, description, and materials (case-insensitive substring).
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Restrict to a category by slug.
    pub category: Option<String>,
    /// Case-insensitive substring search.
    pub search: Option<String>,
    /// Inclusive minimum list price.
    pub min_price: Option<Decimal>,
    /// Inclusive maximum list price.
    pub max_price: Option<Decimal>,
    /// Minimum sustainability rating.
    pub sustainability: Option<i16>,
    /// Only featured products.
    pub featured: bool,
}
