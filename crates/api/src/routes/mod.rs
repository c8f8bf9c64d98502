//! HTTP surface.
//!
//! Route tree:
//!
//! ```text
//! GET    /health                      liveness probe
//! GET    /health/ready                readiness probe (storage ping)
//! GET    /categories                  list categories
//! GET    /categories/{slug}           category detail
//! GET    /products                    list/filter active products
//! GET    /products/{slug}             product detail with variants
//! GET    /cart                        the owner's cart
//! POST   /cart                        add an item
//! POST   /cart/merge                  fold a session cart into the user's
//! DELETE /cart/clear                  empty the cart
//! DELETE /cart/{id}                   remove one item
//! POST   /checkout                    convert the cart into an order
//! GET    /orders                      the user's orders
//! GET    /orders/{token}              one order by token
//! POST   /orders/{token}/cancel       cancel an order
//! POST   /auth/register               create an account
//! POST   /auth/login                  issue a token
//! POST   /auth/logout                 invalidate the token
//! GET    /auth/user                   the authenticated profile
//! PUT    /auth/user                   update the profile
//! ```

pub mod auth;
pub mod cart;
pub mod categories;
pub mod orders;
pub mod products;

use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .merge(categories::router())
        .merge(products::router())
        .merge(cart::router())
        .merge(orders::router())
        .merge(auth::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn ready(State(state): State<AppState>) -> Result<Json<Value>> {
    state.store().ping().await.map_err(|e| {
        tracing::warn!(error = %e, "readiness check failed");
        AppError::Transient("storage backend unavailable".to_owned())
    })?;
    Ok(Json(json!({ "status": "ready" })))
}
