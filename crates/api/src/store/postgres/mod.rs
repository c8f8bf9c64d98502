//! `PostgreSQL` storage backend.
//!
//! # Tables
//!
//! - `category`, `product`, `product_variant` - catalog
//! - `cart_item` - cart ledger (owner = exactly one of user/session columns,
//!   enforced by a CHECK constraint)
//! - `orders`, `order_item` - immutable orders with frozen prices
//! - `app_user`, `user_password`, `auth_session` - accounts and bearer tokens
//!
//! # Migrations
//!
//! Migrations live in `crates/api/migrations/` and are embedded with
//! `sqlx::migrate!`; the binary runs them at startup.
//!
//! Queries use runtime `query`/`query_as` with explicit binds. Same-owner
//! cart operations take `SELECT ... FOR UPDATE` row locks inside
//! transactions so concurrent adds, merges, and checkouts on one ledger
//! serialize instead of losing updates.

mod cart;
mod catalog;
mod orders;
mod users;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use verdant_core::{CartOwner, UserId};

use super::{MAX_LINE_QUANTITY, Store, StoreError};

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Embedded migrations, run by the binary at startup.
#[must_use]
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// The production storage backend.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Whether an error is worth one internal retry for idempotent reads.
fn is_transient(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut)
}

/// Run an idempotent read, retrying once on a transient failure.
///
/// Writes must NOT go through this: re-running a write risks a double
/// quantity increment, so write failures surface as `Transient` for the
/// caller to resend.
async fn retry_read<T, F, Fut>(op: F) -> Result<T, StoreError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    match op().await {
        Err(e) if is_transient(&e) => {
            tracing::warn!(error = %e, "transient read failure, retrying once");
            Ok(op().await?)
        }
        other => Ok(other?),
    }
}

/// Map a write-path error, surfacing transient failures distinctly.
fn map_write_err(e: sqlx::Error) -> StoreError {
    if is_transient(&e) {
        StoreError::Transient(e.to_string())
    } else {
        StoreError::Database(e)
    }
}

/// Split an owner key into the nullable column pair used by `cart_item`.
///
/// Exactly one side is `Some`; the sum type makes the other combinations
/// unrepresentable before this point.
fn owner_columns(owner: &CartOwner) -> (Option<i32>, Option<&str>) {
    match owner {
        CartOwner::User(id) => (Some(id.as_i32()), None),
        CartOwner::Session(key) => (None, Some(key.as_str())),
    }
}

/// Rebuild an owner key from the nullable column pair.
fn owner_from_columns(
    user_id: Option<i32>,
    session_id: Option<String>,
) -> Result<CartOwner, StoreError> {
    match (user_id, session_id) {
        (Some(id), None) => Ok(CartOwner::User(UserId::new(id))),
        (None, Some(key)) => verdant_core::SessionKey::parse(&key)
            .map(CartOwner::Session)
            .map_err(|e| StoreError::DataCorruption(format!("invalid session id in database: {e}"))),
        (user, session) => Err(StoreError::DataCorruption(format!(
            "cart item owner must be exactly one of user/session (got user={user:?}, session={session:?})"
        ))),
    }
}

/// Convert a stored quantity to the domain's unsigned type.
fn quantity_from_db(quantity: i32) -> Result<u32, StoreError> {
    u32::try_from(quantity)
        .map_err(|_| StoreError::DataCorruption(format!("negative quantity in database: {quantity}")))
}

/// Validate a requested quantity against the per-line cap and convert it
/// to the storage type.
fn line_quantity(quantity: u32) -> Result<i32, StoreError> {
    if quantity > MAX_LINE_QUANTITY {
        return Err(StoreError::InvalidInput(format!(
            "quantity exceeds the per-line maximum of {MAX_LINE_QUANTITY}"
        )));
    }
    i32::try_from(quantity)
        .map_err(|_| StoreError::InvalidInput(format!("quantity out of range: {quantity}")))
}

/// Combine a stored line quantity with a requested increment, enforcing
/// the per-line cap.
fn combined_quantity(current: i32, add: u32) -> Result<i32, StoreError> {
    let combined = quantity_from_db(current)?
        .checked_add(add)
        .filter(|q| *q <= MAX_LINE_QUANTITY)
        .ok_or_else(|| {
            StoreError::InvalidInput(format!(
                "line quantity would exceed the maximum of {MAX_LINE_QUANTITY}"
            ))
        })?;
    line_quantity(combined)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn negative_stored_quantity_is_data_corruption() {
        assert!(matches!(
            quantity_from_db(-1),
            Err(StoreError::DataCorruption(_))
        ));
        assert_eq!(quantity_from_db(3).unwrap(), 3);
    }

    #[test]
    fn line_quantity_enforces_the_cap() {
        assert_eq!(line_quantity(MAX_LINE_QUANTITY).unwrap(), 10_000);
        assert!(matches!(
            line_quantity(MAX_LINE_QUANTITY + 1),
            Err(StoreError::InvalidInput(_))
        ));
        assert!(matches!(
            line_quantity(u32::MAX),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn combined_quantity_never_overflows() {
        assert_eq!(combined_quantity(3, 2).unwrap(), 5);
        assert!(matches!(
            combined_quantity(9_999, 2),
            Err(StoreError::InvalidInput(_))
        ));
        assert!(matches!(
            combined_quantity(i32::MAX, u32::MAX),
            Err(StoreError::InvalidInput(_))
        ));
        assert!(matches!(
            combined_quantity(-5, 1),
            Err(StoreError::DataCorruption(_))
        ));
    }
}
