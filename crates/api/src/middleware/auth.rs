//! Identity resolution for protected and cart routes.
//!
//! Two extractors cover the two identity models:
//!
//! - [`CurrentUser`] requires a valid `Authorization: Bearer` token and
//!   rejects the request with 401 otherwise.
//! - [`CartIdentity`] resolves the cart owner: a bearer token maps to the
//!   user's ledger, otherwise a `session_id` query parameter maps to an
//!   anonymous ledger. A request with neither is rejected with 400.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;

use verdant_core::{CartOwner, SessionKey};

use crate::error::AppError;
use crate::models::User;
use crate::services::auth;
use crate::state::AppState;

/// Pull the token out of an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// The authenticated user, or 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Err(AppError::Unauthorized(
                "missing bearer token".to_owned(),
            ));
        };
        let user = auth::authenticate(state.store(), token).await?;
        Ok(Self(user))
    }
}

#[derive(Deserialize)]
struct SessionQuery {
    session_id: Option<String>,
}

/// The cart owner for this request.
///
/// An authenticated request always acts on the user's ledger, even when a
/// `session_id` parameter is also present.
#[derive(Debug, Clone)]
pub struct CartIdentity(pub CartOwner);

impl FromRequestParts<AppState> for CartIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(token) = bearer_token(parts) {
            let user = auth::authenticate(state.store(), token).await?;
            return Ok(Self(CartOwner::User(user.id)));
        }

        let Query(query) = Query::<SessionQuery>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;
        let Some(raw) = query.session_id else {
            return Err(AppError::InvalidInput(
                "session_id query parameter is required for anonymous carts".to_owned(),
            ));
        };
        let key = SessionKey::parse(&raw)
            .map_err(|e| AppError::InvalidInput(format!("invalid session_id: {e}")))?;
        Ok(Self(CartOwner::Session(key)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    #[test]
    fn bearer_token_parses_the_authorization_header() {
        let (parts, ()) = Request::builder()
            .header("Authorization", "Bearer abc123")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts), Some("abc123"));

        let (parts, ()) = Request::builder()
            .header("Authorization", "Basic abc123")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts), None);

        let (parts, ()) = Request::builder().body(()).unwrap().into_parts();
        assert_eq!(bearer_token(&parts), None);
    }
}
