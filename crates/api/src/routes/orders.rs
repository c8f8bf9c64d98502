//! Checkout and order routes. All of them require authentication.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use verdant_core::OrderToken;

use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::models::Order;
use crate::services::checkout;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(place_order))
        .route("/orders", get(list_orders))
        .route("/orders/{token}", get(order_detail))
        .route("/orders/{token}/cancel", post(cancel_order))
}

#[derive(Debug, Deserialize)]
struct CheckoutRequest {
    email: Option<String>,
    shipping_address: String,
}

async fn place_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = checkout::place_order(
        state.store(),
        &user,
        req.email.as_deref(),
        &req.shipping_address,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.store().list_orders(user.id).await?))
}

async fn order_detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(token): Path<OrderToken>,
) -> Result<Json<Order>> {
    let order = state
        .store()
        .find_order(user.id, token)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {token} not found")))?;
    Ok(Json(order))
}

async fn cancel_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(token): Path<OrderToken>,
) -> Result<Json<Order>> {
    let order = checkout::cancel_order(state.store(), &user, token).await?;
    Ok(Json(order))
}
