//! Product routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{Product, ProductDetail, ProductFilter};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list))
        .route("/products/{slug}", get(detail))
}

/// Query parameters for `GET /products`. All predicates are AND-combined.
#[derive(Debug, Deserialize, Default)]
struct ListQuery {
    category: Option<String>,
    search: Option<String>,
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
    sustainability: Option<i16>,
    featured: Option<bool>,
}

impl From<ListQuery> for ProductFilter {
    fn from(q: ListQuery) -> Self {
        Self {
            category: q.category,
            search: q.search,
            min_price: q.min_price,
            max_price: q.max_price,
            sustainability: q.sustainability,
            featured: q.featured.unwrap_or(false),
        }
    }
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Product>>> {
    let filter = ProductFilter::from(query);
    Ok(Json(state.store().list_products(&filter).await?))
}

async fn detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductDetail>> {
    let (product, variants) = state
        .store()
        .find_product_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product '{slug}' not found")))?;
    Ok(Json(ProductDetail { product, variants }))
}
