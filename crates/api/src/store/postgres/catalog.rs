//! Catalog queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder};
use tracing::instrument;

use verdant_core::{CategoryId, ProductId, Size, VariantId};

use super::{PgStore, retry_read};
use crate::models::{Category, Product, ProductFilter, ProductVariant};
use crate::store::{CatalogStore, StoreError};

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    name: String,
    slug: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Self {
            id: CategoryId::new(r.id),
            name: r.name,
            slug: r.slug,
            description: r.description,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    title: String,
    slug: String,
    category_id: i32,
    category_name: String,
    description: String,
    price: Decimal,
    discount_price: Option<Decimal>,
    inventory: i32,
    image_url: String,
    is_featured: bool,
    is_active: bool,
    materials: Option<String>,
    sustainability_rating: i16,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Self {
            id: ProductId::new(r.id),
            title: r.title,
            slug: r.slug,
            category_id: CategoryId::new(r.category_id),
            category_name: r.category_name,
            description: r.description,
            price: r.price,
            discount_price: r.discount_price,
            inventory: r.inventory,
            image_url: r.image_url,
            is_featured: r.is_featured,
            is_active: r.is_active,
            materials: r.materials,
            sustainability_rating: r.sustainability_rating,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct VariantRow {
    id: i32,
    product_id: i32,
    size: String,
    color: String,
    stock: i32,
    image_url: Option<String>,
}

impl From<VariantRow> for ProductVariant {
    fn from(r: VariantRow) -> Self {
        Self {
            id: VariantId::new(r.id),
            product_id: ProductId::new(r.product_id),
            size: Size::from(r.size),
            color: r.color,
            stock: r.stock,
            image_url: r.image_url,
        }
    }
}

/// Shared SELECT for product rows joined with the category name.
const PRODUCT_SELECT: &str = "SELECT p.id, p.title, p.slug, p.category_id, c.name AS category_name, \
     p.description, p.price, p.discount_price, p.inventory, p.image_url, \
     p.is_featured, p.is_active, p.materials, p.sustainability_rating, \
     p.created_at, p.updated_at \
     FROM product p JOIN category c ON c.id = p.category_id";

#[async_trait]
impl CatalogStore for PgStore {
    #[instrument(skip(self))]
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows: Vec<CategoryRow> = retry_read(|| async {
            sqlx::query_as(
                "SELECT id, name, slug, description, created_at, updated_at \
                 FROM category ORDER BY name ASC",
            )
            .fetch_all(&self.pool)
            .await
        })
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    #[instrument(skip(self))]
    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError> {
        let row: Option<CategoryRow> = retry_read(|| async {
            sqlx::query_as(
                "SELECT id, name, slug, description, created_at, updated_at \
                 FROM category WHERE slug = $1",
            )
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
        })
        .await?;

        Ok(row.map(Category::from))
    }

    #[instrument(skip(self, filter))]
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let rows: Vec<ProductRow> = retry_read(|| async {
            let mut qb = QueryBuilder::<Postgres>::new(PRODUCT_SELECT);
            qb.push(" WHERE p.is_active = TRUE");

            if let Some(category) = &filter.category {
                qb.push(" AND c.slug = ").push_bind(category);
            }
            if let Some(min_price) = filter.min_price {
                qb.push(" AND p.price >= ").push_bind(min_price);
            }
            if let Some(max_price) = filter.max_price {
                qb.push(" AND p.price <= ").push_bind(max_price);
            }
            if let Some(rating) = filter.sustainability {
                qb.push(" AND p.sustainability_rating >= ").push_bind(rating);
            }
            if let Some(search) = &filter.search {
                let pattern = format!("%{search}%");
                qb.push(" AND (p.title ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR p.description ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR p.materials ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
            if filter.featured {
                qb.push(" AND p.is_featured = TRUE");
            }

            qb.push(" ORDER BY p.created_at DESC");
            qb.build_query_as().fetch_all(&self.pool).await
        })
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    #[instrument(skip(self))]
    async fn find_product_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<(Product, Vec<ProductVariant>)>, StoreError> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.slug = $1 AND p.is_active = TRUE");
        let row: Option<ProductRow> = retry_read(|| async {
            sqlx::query_as(&sql).bind(slug).fetch_optional(&self.pool).await
        })
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let variants: Vec<VariantRow> = retry_read(|| async {
            sqlx::query_as(
                "SELECT id, product_id, size, color, stock, image_url \
                 FROM product_variant WHERE product_id = $1 ORDER BY id ASC",
            )
            .bind(row.id)
            .fetch_all(&self.pool)
            .await
        })
        .await?;

        Ok(Some((
            Product::from(row),
            variants.into_iter().map(ProductVariant::from).collect(),
        )))
    }

    #[instrument(skip(self))]
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        // No is_active filter: carts may reference deactivated products.
        let sql = format!("{PRODUCT_SELECT} WHERE p.id = $1");
        let row: Option<ProductRow> = retry_read(|| async {
            sqlx::query_as(&sql)
                .bind(id.as_i32())
                .fetch_optional(&self.pool)
                .await
        })
        .await?;

        Ok(row.map(Product::from))
    }

    #[instrument(skip(self))]
    async fn find_variant(&self, id: VariantId) -> Result<Option<ProductVariant>, StoreError> {
        let row: Option<VariantRow> = retry_read(|| async {
            sqlx::query_as(
                "SELECT id, product_id, size, color, stock, image_url \
                 FROM product_variant WHERE id = $1",
            )
            .bind(id.as_i32())
            .fetch_optional(&self.pool)
            .await
        })
        .await?;

        Ok(row.map(ProductVariant::from))
    }
}
