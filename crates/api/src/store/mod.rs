//! Storage backends.
//!
//! The service and route layers talk to storage exclusively through the
//! traits in this module. Two backends exist:
//!
//! - [`postgres::PgStore`] - the production backend (`PostgreSQL` via sqlx)
//! - [`memory::MemoryStore`] - an in-process backend for tests and local
//!   development
//!
//! Operations on the same cart owner are serialized inside each backend
//! (row locks in Postgres, a single mutex in memory) so quantity
//! accumulation never loses updates and checkout sees a consistent
//! snapshot.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use verdant_core::{
    CartItemId, CartOwner, Email, OrderId, OrderStatus, OrderToken, ProductId, SessionKey, UserId,
    VariantId,
};

use crate::models::{
    CartItem, CartLine, Category, Order, Product, ProductFilter, ProductVariant, ProfileUpdate,
    User,
};

pub use postgres::{PgStore, create_pool};

/// Upper bound on a single cart line's quantity.
///
/// Both backends enforce it, so a line's stored quantity always fits `i32`
/// and repeated adds can never overflow the ledger.
pub const MAX_LINE_QUANTITY: u32 = 10_000;

/// Errors surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("record not found")]
    NotFound,

    /// The request is malformed (for example a quantity past the per-line
    /// maximum).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The record exists but belongs to a different owner.
    #[error("record belongs to a different owner")]
    Forbidden,

    /// Checkout was attempted on an empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// A write race that was not resolved by the internal retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Transient failure (lock timeout, connection loss). Idempotent reads
    /// are retried once internally; writes surface this for the caller to
    /// resend.
    #[error("transient storage failure: {0}")]
    Transient(String),

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored data failed validation on the way out.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Read-only access to categories, products, and variants.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All categories, ordered by name.
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;

    /// Look up a category by slug.
    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError>;

    /// Active products matching the filter, newest first.
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError>;

    /// Look up an active product by slug, with its variants.
    async fn find_product_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<(Product, Vec<ProductVariant>)>, StoreError>;

    /// Look up a product by ID, ignoring the active flag.
    ///
    /// Used by the cart ledger: a cart may legitimately reference a product
    /// that was deactivated after it was added.
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Look up a variant by ID.
    async fn find_variant(&self, id: VariantId) -> Result<Option<ProductVariant>, StoreError>;
}

/// The cart ledger for one owner key.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Add `quantity` of a product (variant) to the owner's cart.
    ///
    /// If an `(owner, product, variant)` row already exists its quantity is
    /// incremented atomically; otherwise a new row is created. An insert
    /// race against a concurrent add for the same triple is retried once
    /// internally.
    ///
    /// Returns `InvalidInput` if the requested quantity, or the line's
    /// accumulated quantity, would exceed [`MAX_LINE_QUANTITY`].
    async fn add_item(
        &self,
        owner: &CartOwner,
        product: ProductId,
        variant: Option<VariantId>,
        quantity: u32,
    ) -> Result<CartItem, StoreError>;

    /// The owner's cart lines, ordered by creation time ascending.
    async fn list_items(&self, owner: &CartOwner) -> Result<Vec<CartLine>, StoreError>;

    /// Delete one cart item.
    ///
    /// Returns `NotFound` if no such item exists and `Forbidden` if it
    /// belongs to a different owner.
    async fn remove_item(&self, owner: &CartOwner, item: CartItemId) -> Result<(), StoreError>;

    /// Delete all items for the owner. Idempotent; a no-op on an empty cart.
    async fn clear(&self, owner: &CartOwner) -> Result<(), StoreError>;

    /// Move every item of the session cart into the user's cart.
    ///
    /// Items with an equivalent `(product, variant)` under the user merge by
    /// quantity, clamped at [`MAX_LINE_QUANTITY`]; the rest are re-keyed to
    /// the user. Afterwards no rows remain under the session. Returns the
    /// user's merged cart.
    async fn merge_session_into_user(
        &self,
        session: &SessionKey,
        user: UserId,
    ) -> Result<Vec<CartLine>, StoreError>;
}

/// Order creation and retrieval.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Convert the user's cart into an order in a single atomic unit.
    ///
    /// Freezes each line's effective unit price, computes the total once,
    /// creates the order (status pending) with one item per cart line, and
    /// clears the cart. Either all of it is persisted or none of it.
    ///
    /// Returns `EmptyCart` if the user's ledger has no items.
    async fn create_order_from_cart(
        &self,
        user: UserId,
        email: &Email,
        shipping_address: &str,
    ) -> Result<Order, StoreError>;

    /// The user's orders, newest first, with items.
    async fn list_orders(&self, user: UserId) -> Result<Vec<Order>, StoreError>;

    /// Look up one of the user's orders by its external token.
    async fn find_order(
        &self,
        user: UserId,
        token: OrderToken,
    ) -> Result<Option<Order>, StoreError>;

    /// Move an order to `to`, but only if its current status permits the
    /// transition.
    ///
    /// The status check and the write are one atomic step, so a concurrent
    /// transition can never be overwritten. Returns `Conflict` when the
    /// order's current status forbids the move and `NotFound` when no such
    /// order exists.
    async fn transition_order_status(
        &self,
        id: OrderId,
        to: OrderStatus,
    ) -> Result<(), StoreError>;

    /// Set an order's status unconditionally. Fulfilment-side updates only;
    /// customer-facing transitions go through [`transition_order_status`].
    ///
    /// [`transition_order_status`]: OrderStore::transition_order_status
    async fn set_order_status(&self, id: OrderId, status: OrderStatus) -> Result<(), StoreError>;
}

/// User accounts and bearer-token sessions.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a user with a password hash.
    ///
    /// Returns `Conflict` if the email is already registered.
    async fn create_user(
        &self,
        email: &Email,
        password_hash: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<User, StoreError>;

    /// Look up a user by ID.
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Get a user and their password hash by email.
    ///
    /// Returns `None` if the user doesn't exist or has no password set.
    async fn find_password_hash(&self, email: &Email)
    -> Result<Option<(User, String)>, StoreError>;

    /// Apply a partial profile update and return the updated user.
    async fn update_profile(&self, id: UserId, update: &ProfileUpdate)
    -> Result<User, StoreError>;

    /// Persist a bearer token for a user.
    async fn create_auth_session(&self, user: UserId, token: &str) -> Result<(), StoreError>;

    /// Resolve a bearer token to its user.
    async fn find_user_by_token(&self, token: &str) -> Result<Option<User>, StoreError>;

    /// Invalidate a bearer token. Idempotent.
    async fn delete_auth_session(&self, token: &str) -> Result<(), StoreError>;
}

/// The full storage backend.
#[async_trait]
pub trait Store: CatalogStore + CartStore + OrderStore + UserStore {
    /// Backend connectivity check for the readiness probe.
    async fn ping(&self) -> Result<(), StoreError>;
}
