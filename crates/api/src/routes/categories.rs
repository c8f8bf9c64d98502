//! Category routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::error::{AppError, Result};
use crate::models::Category;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list))
        .route("/categories/{slug}", get(detail))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.store().list_categories().await?))
}

async fn detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Category>> {
    let category = state
        .store()
        .find_category_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("category '{slug}' not found")))?;
    Ok(Json(category))
}
