//! Cart operations with reference validation.
//!
//! The storage layer enforces quantity accumulation and ownership; this
//! layer validates the request against the catalog before touching the
//! ledger.

use tracing::instrument;

use verdant_core::{CartItemId, CartOwner, ProductId, VariantId};

use crate::error::{AppError, Result};
use crate::models::CartLine;
use crate::store::Store;

/// Add a product (variant) to the owner's cart and return the resulting
/// line.
///
/// Rejects a zero quantity, an unknown product, an unknown variant, and a
/// variant that belongs to a different product.
#[instrument(skip(store), fields(owner = %owner))]
pub async fn add_to_cart(
    store: &dyn Store,
    owner: &CartOwner,
    product_id: ProductId,
    variant_id: Option<VariantId>,
    quantity: u32,
) -> Result<CartLine> {
    if quantity == 0 {
        return Err(AppError::InvalidInput(
            "quantity must be at least 1".to_owned(),
        ));
    }

    let product = store
        .find_product(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {product_id} not found")))?;

    let variant = match variant_id {
        Some(id) => {
            let variant = store
                .find_variant(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("variant {id} not found")))?;
            if variant.product_id != product_id {
                // A variant of a different product is as good as absent.
                return Err(AppError::NotFound(format!(
                    "variant {id} does not belong to product {product_id}"
                )));
            }
            Some(variant)
        }
        None => None,
    };

    let item = store
        .add_item(owner, product_id, variant_id, quantity)
        .await?;
    Ok(CartLine::new(&item, &product, variant.as_ref()))
}

/// Delete one item from the owner's cart.
#[instrument(skip(store), fields(owner = %owner))]
pub async fn remove_from_cart(
    store: &dyn Store,
    owner: &CartOwner,
    item: CartItemId,
) -> Result<()> {
    store.remove_item(owner, item).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use verdant_core::{CartOwner, SessionKey, Size, VariantId};

    use super::*;
    use crate::store::CartStore;
    use crate::store::memory::{MemoryStore, NewProduct};

    fn owner() -> CartOwner {
        CartOwner::Session(SessionKey::parse("sess-svc").expect("valid session key"))
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected_before_storage() {
        let store = MemoryStore::new();
        let cat = store.insert_category("Tops").await;
        let product = store.insert_product(cat.id, NewProduct::default()).await;

        let err = add_to_cart(&store, &owner(), product.id, None, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(store.list_items(&owner()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let store = MemoryStore::new();
        let err = add_to_cart(&store, &owner(), verdant_core::ProductId::new(999), None, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn variant_must_belong_to_the_product() {
        let store = MemoryStore::new();
        let cat = store.insert_category("Tops").await;
        let shirt = store.insert_product(cat.id, NewProduct::default()).await;
        let other = store
            .insert_product(
                cat.id,
                NewProduct {
                    title: "Other".to_owned(),
                    ..NewProduct::default()
                },
            )
            .await;
        let variant = store.insert_variant(other.id, Size::M, "green").await;

        let err = add_to_cart(&store, &owner(), shirt.id, Some(variant.id), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let missing = add_to_cart(&store, &owner(), shirt.id, Some(VariantId::new(999)), 1)
            .await
            .unwrap_err();
        assert!(matches!(missing, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn add_returns_the_joined_line() {
        let store = MemoryStore::new();
        let cat = store.insert_category("Tops").await;
        let product = store
            .insert_product(
                cat.id,
                NewProduct {
                    price: Decimal::new(1250, 2),
                    discount_price: Some(Decimal::new(999, 2)),
                    ..NewProduct::default()
                },
            )
            .await;
        let variant = store.insert_variant(product.id, Size::L, "indigo").await;

        let line = add_to_cart(&store, &owner(), product.id, Some(variant.id), 2)
            .await
            .unwrap();
        assert_eq!(line.quantity, 2);
        assert_eq!(line.unit_price, Decimal::new(999, 2));
        assert_eq!(line.total_price, Decimal::new(1998, 2));
        assert_eq!(line.size, Some(Size::L));
        assert_eq!(line.color.as_deref(), Some("indigo"));
    }
}
