//! Checkout and order lifecycle.

use tracing::instrument;

use verdant_core::{Email, OrderStatus, OrderToken};

use crate::error::{AppError, Result};
use crate::models::{Order, User};
use crate::store::{Store, StoreError};

/// Convert the user's cart into an order.
///
/// The contact email defaults to the user's profile email when not
/// supplied. The shipping address must be non-blank. Price freezing,
/// total computation, and cart clearing happen atomically in storage.
#[instrument(skip(store, user, email), fields(user_id = %user.id))]
pub async fn place_order(
    store: &dyn Store,
    user: &User,
    email: Option<&str>,
    shipping_address: &str,
) -> Result<Order> {
    let shipping_address = shipping_address.trim();
    if shipping_address.is_empty() {
        return Err(AppError::InvalidInput(
            "shipping_address must not be blank".to_owned(),
        ));
    }

    let email = match email {
        Some(raw) => Email::parse(raw)
            .map_err(|e| AppError::InvalidInput(format!("invalid email: {e}")))?,
        None => user.email.clone(),
    };

    let order = store
        .create_order_from_cart(user.id, &email, shipping_address)
        .await?;
    tracing::info!(order = %order.token, total = %order.total_amount, "order created");
    Ok(order)
}

/// Cancel one of the user's orders.
///
/// Only orders whose status still permits cancellation (pending or
/// processing) can be cancelled.
#[instrument(skip(store, user), fields(user_id = %user.id, order = %token))]
pub async fn cancel_order(store: &dyn Store, user: &User, token: OrderToken) -> Result<Order> {
    let mut order = store
        .find_order(user.id, token)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {token} not found")))?;

    // The status check lives in the guarded update itself, so a transition
    // committed between the lookup above and here is never overwritten.
    match store
        .transition_order_status(order.id, OrderStatus::Cancelled)
        .await
    {
        Ok(()) => {}
        Err(StoreError::Conflict(msg)) => return Err(AppError::InvalidInput(msg)),
        Err(e) => return Err(e.into()),
    }

    order.status = OrderStatus::Cancelled;
    Ok(order)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use verdant_core::{CartOwner, OrderStatus, Size};

    use super::*;
    use crate::store::{CartStore, OrderStore};
    use crate::store::memory::{MemoryStore, NewProduct};

    async fn user_with_cart(store: &MemoryStore) -> User {
        let user = crate::store::UserStore::create_user(
            store,
            &Email::parse("jo@example.com").unwrap(),
            "hash",
            Some("Jo"),
            None,
        )
        .await
        .unwrap();
        let cat = store.insert_category("Tops").await;
        let product = store
            .insert_product(
                cat.id,
                NewProduct {
                    price: Decimal::new(1000, 2),
                    ..NewProduct::default()
                },
            )
            .await;
        let variant = store.insert_variant(product.id, Size::M, "green").await;
        store
            .add_item(&CartOwner::User(user.id), product.id, Some(variant.id), 2)
            .await
            .unwrap();
        user
    }

    #[tokio::test]
    async fn blank_shipping_address_is_rejected() {
        let store = MemoryStore::new();
        let user = user_with_cart(&store).await;
        let err = place_order(&store, &user, None, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        // The cart is untouched.
        assert_eq!(
            store
                .list_items(&CartOwner::User(user.id))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn email_defaults_to_the_profile() {
        let store = MemoryStore::new();
        let user = user_with_cart(&store).await;
        let order = place_order(&store, &user, None, "1 Green Way").await.unwrap();
        assert_eq!(order.email, "jo@example.com");
        assert_eq!(order.total_amount, Decimal::new(2000, 2));
    }

    #[tokio::test]
    async fn explicit_email_overrides_the_profile() {
        let store = MemoryStore::new();
        let user = user_with_cart(&store).await;
        let order = place_order(&store, &user, Some("gifts@example.com"), "1 Green Way")
            .await
            .unwrap();
        assert_eq!(order.email, "gifts@example.com");
    }

    #[tokio::test]
    async fn cancel_follows_the_status_machine() {
        let store = MemoryStore::new();
        let user = user_with_cart(&store).await;
        let order = place_order(&store, &user, None, "1 Green Way").await.unwrap();

        let cancelled = cancel_order(&store, &user, order.token).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        // Cancelled is terminal.
        let err = cancel_order(&store, &user, order.token).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn shipped_orders_cannot_be_cancelled() {
        let store = MemoryStore::new();
        let user = user_with_cart(&store).await;
        let order = place_order(&store, &user, None, "1 Green Way").await.unwrap();
        store
            .set_order_status(order.id, OrderStatus::Shipped)
            .await
            .unwrap();

        let err = cancel_order(&store, &user, order.token).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
