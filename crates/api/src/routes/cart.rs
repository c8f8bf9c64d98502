//! Cart routes.
//!
//! All cart routes resolve their owner through [`CartIdentity`]: a bearer
//! token acts on the user's ledger, an anonymous request needs a
//! `session_id` query parameter.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use verdant_core::{CartItemId, ProductId, SessionKey, VariantId};

use crate::error::{AppError, Result};
use crate::middleware::{CartIdentity, CurrentUser};
use crate::models::CartLine;
use crate::services::cart;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart).post(add_item))
        .route("/cart/merge", post(merge))
        .route("/cart/clear", delete(clear))
        .route("/cart/{id}", delete(remove_item))
}

/// The cart with its running total.
#[derive(Debug, Serialize)]
struct CartResponse {
    items: Vec<CartLine>,
    total: Decimal,
}

impl CartResponse {
    fn new(items: Vec<CartLine>) -> Self {
        let total = items.iter().map(|l| l.total_price).sum();
        Self { items, total }
    }
}

async fn get_cart(
    State(state): State<AppState>,
    CartIdentity(owner): CartIdentity,
) -> Result<Json<CartResponse>> {
    let items = state.store().list_items(&owner).await?;
    Ok(Json(CartResponse::new(items)))
}

#[derive(Debug, Deserialize)]
struct AddItemRequest {
    product: ProductId,
    variant: Option<VariantId>,
    #[serde(default = "default_quantity")]
    quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

async fn add_item(
    State(state): State<AppState>,
    CartIdentity(owner): CartIdentity,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartLine>)> {
    let line =
        cart::add_to_cart(state.store(), &owner, req.product, req.variant, req.quantity).await?;
    Ok((StatusCode::CREATED, Json(line)))
}

async fn remove_item(
    State(state): State<AppState>,
    CartIdentity(owner): CartIdentity,
    Path(id): Path<CartItemId>,
) -> Result<StatusCode> {
    cart::remove_from_cart(state.store(), &owner, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear(
    State(state): State<AppState>,
    CartIdentity(owner): CartIdentity,
) -> Result<StatusCode> {
    state.store().clear(&owner).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct MergeRequest {
    session_id: String,
}

/// Fold an anonymous session cart into the authenticated user's cart.
async fn merge(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<MergeRequest>,
) -> Result<Json<CartResponse>> {
    let key = SessionKey::parse(&req.session_id)
        .map_err(|e| AppError::InvalidInput(format!("invalid session_id: {e}")))?;
    let items = state
        .store()
        .merge_session_into_user(&key, user.id)
        .await?;
    Ok(Json(CartResponse::new(items)))
}
