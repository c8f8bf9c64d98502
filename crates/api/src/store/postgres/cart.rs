//! Cart ledger queries.
//!
//! All same-owner mutations run inside transactions with `FOR UPDATE` row
//! locks so the read-increment-write of quantity cannot lose updates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::instrument;

use verdant_core::{CartItemId, CartOwner, ProductId, SessionKey, Size, UserId, VariantId, pricing};

use super::{
    MAX_LINE_QUANTITY, PgStore, combined_quantity, line_quantity, map_write_err, owner_columns,
    owner_from_columns, quantity_from_db, retry_read,
};
use crate::models::{CartItem, CartLine};
use crate::store::{CartStore, StoreError};

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: i32,
    user_id: Option<i32>,
    session_id: Option<String>,
    product_id: i32,
    variant_id: Option<i32>,
    quantity: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = StoreError;

    fn try_from(r: CartItemRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: CartItemId::new(r.id),
            owner: owner_from_columns(r.user_id, r.session_id)?,
            product_id: ProductId::new(r.product_id),
            variant_id: r.variant_id.map(VariantId::new),
            quantity: quantity_from_db(r.quantity)?,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: i32,
    product_id: i32,
    variant_id: Option<i32>,
    quantity: i32,
    product_title: String,
    product_image: String,
    price: Decimal,
    discount_price: Option<Decimal>,
    size: Option<String>,
    color: Option<String>,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = StoreError;

    fn try_from(r: CartLineRow) -> Result<Self, StoreError> {
        let quantity = quantity_from_db(r.quantity)?;
        let unit_price = pricing::effective_unit_price(r.price, r.discount_price);
        Ok(Self {
            id: CartItemId::new(r.id),
            product_id: ProductId::new(r.product_id),
            product_title: r.product_title,
            product_image: r.product_image,
            variant_id: r.variant_id.map(VariantId::new),
            size: r.size.map(|s| Size::from(s.as_str())),
            color: r.color,
            quantity,
            unit_price,
            total_price: pricing::line_total(unit_price, quantity),
        })
    }
}

const CART_ITEM_RETURNING: &str =
    "RETURNING id, user_id, session_id, product_id, variant_id, quantity, created_at";

#[async_trait]
impl CartStore for PgStore {
    #[instrument(skip(self), fields(owner = %owner))]
    async fn add_item(
        &self,
        owner: &CartOwner,
        product: ProductId,
        variant: Option<VariantId>,
        quantity: u32,
    ) -> Result<CartItem, StoreError> {
        let (user_id, session_id) = owner_columns(owner);
        let qty = line_quantity(quantity)?;

        // Two attempts: a lost insert race against a concurrent add for the
        // same (owner, product, variant) hits the unique index; the retry
        // then finds the winner's row and increments it instead.
        for attempt in 0..2 {
            let mut tx = self.pool.begin().await.map_err(map_write_err)?;

            let existing: Option<(i32, i32)> = sqlx::query_as(
                "SELECT id, quantity FROM cart_item \
                 WHERE user_id IS NOT DISTINCT FROM $1 \
                   AND session_id IS NOT DISTINCT FROM $2 \
                   AND product_id = $3 \
                   AND variant_id IS NOT DISTINCT FROM $4 \
                 FOR UPDATE",
            )
            .bind(user_id)
            .bind(session_id)
            .bind(product.as_i32())
            .bind(variant.map(|v| v.as_i32()))
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_write_err)?;

            if let Some((item_id, current)) = existing {
                // The row is locked, so read-combine-write is safe. Combining
                // in Rust keeps the per-line cap enforced instead of letting
                // `quantity + $1` run off the end of the column.
                let combined = combined_quantity(current, quantity)?;
                let sql = format!(
                    "UPDATE cart_item SET quantity = $1 WHERE id = $2 {CART_ITEM_RETURNING}"
                );
                let row: CartItemRow = sqlx::query_as(&sql)
                    .bind(combined)
                    .bind(item_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(map_write_err)?;
                tx.commit().await.map_err(map_write_err)?;
                return CartItem::try_from(row);
            }

            let sql = format!(
                "INSERT INTO cart_item (user_id, session_id, product_id, variant_id, quantity) \
                 VALUES ($1, $2, $3, $4, $5) {CART_ITEM_RETURNING}"
            );
            let inserted = sqlx::query_as::<_, CartItemRow>(&sql)
                .bind(user_id)
                .bind(session_id)
                .bind(product.as_i32())
                .bind(variant.map(|v| v.as_i32()))
                .bind(qty)
                .fetch_one(&mut *tx)
                .await;

            match inserted {
                Ok(row) => {
                    tx.commit().await.map_err(map_write_err)?;
                    return CartItem::try_from(row);
                }
                Err(e) => {
                    if let sqlx::Error::Database(ref db_err) = e {
                        if db_err.is_unique_violation() && attempt == 0 {
                            tracing::debug!(owner = %owner, "add_item lost insert race, retrying");
                            continue;
                        }
                        if db_err.is_foreign_key_violation() {
                            return Err(StoreError::NotFound);
                        }
                        if db_err.is_unique_violation() {
                            return Err(StoreError::Conflict(
                                "concurrent cart update lost twice".to_owned(),
                            ));
                        }
                    }
                    return Err(map_write_err(e));
                }
            }
        }

        // Both attempts fell through without inserting or updating.
        Err(StoreError::Conflict("concurrent cart update".to_owned()))
    }

    #[instrument(skip(self), fields(owner = %owner))]
    async fn list_items(&self, owner: &CartOwner) -> Result<Vec<CartLine>, StoreError> {
        let (user_id, session_id) = owner_columns(owner);
        let rows: Vec<CartLineRow> = retry_read(|| async {
            sqlx::query_as(
                "SELECT ci.id, ci.product_id, ci.variant_id, ci.quantity, \
                        p.title AS product_title, p.image_url AS product_image, \
                        p.price, p.discount_price, v.size, v.color \
                 FROM cart_item ci \
                 JOIN product p ON p.id = ci.product_id \
                 LEFT JOIN product_variant v ON v.id = ci.variant_id \
                 WHERE ci.user_id IS NOT DISTINCT FROM $1 \
                   AND ci.session_id IS NOT DISTINCT FROM $2 \
                 ORDER BY ci.created_at ASC",
            )
            .bind(user_id)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
        })
        .await?;

        rows.into_iter().map(CartLine::try_from).collect()
    }

    #[instrument(skip(self), fields(owner = %owner))]
    async fn remove_item(&self, owner: &CartOwner, item: CartItemId) -> Result<(), StoreError> {
        let row: Option<(Option<i32>, Option<String>)> =
            sqlx::query_as("SELECT user_id, session_id FROM cart_item WHERE id = $1")
                .bind(item.as_i32())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_write_err)?;

        let Some((user_id, session_id)) = row else {
            return Err(StoreError::NotFound);
        };

        if owner_from_columns(user_id, session_id)? != *owner {
            return Err(StoreError::Forbidden);
        }

        let (owner_user, owner_session) = owner_columns(owner);
        let result = sqlx::query(
            "DELETE FROM cart_item \
             WHERE id = $1 \
               AND user_id IS NOT DISTINCT FROM $2 \
               AND session_id IS NOT DISTINCT FROM $3",
        )
        .bind(item.as_i32())
        .bind(owner_user)
        .bind(owner_session)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        if result.rows_affected() == 0 {
            // Deleted by a concurrent request between the check and here.
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    #[instrument(skip(self), fields(owner = %owner))]
    async fn clear(&self, owner: &CartOwner) -> Result<(), StoreError> {
        let (user_id, session_id) = owner_columns(owner);
        sqlx::query(
            "DELETE FROM cart_item \
             WHERE user_id IS NOT DISTINCT FROM $1 \
               AND session_id IS NOT DISTINCT FROM $2",
        )
        .bind(user_id)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        Ok(())
    }

    #[instrument(skip(self), fields(session = %session, user = %user))]
    async fn merge_session_into_user(
        &self,
        session: &SessionKey,
        user: UserId,
    ) -> Result<Vec<CartLine>, StoreError> {
        let cap = line_quantity(MAX_LINE_QUANTITY)?;
        let mut tx = self.pool.begin().await.map_err(map_write_err)?;

        // Lock the source rows so a concurrent merge or checkout on the same
        // session/user pair serializes behind this transaction.
        let source: Vec<(i32, i32, Option<i32>, i32)> = sqlx::query_as(
            "SELECT id, product_id, variant_id, quantity FROM cart_item \
             WHERE session_id = $1 ORDER BY created_at ASC FOR UPDATE",
        )
        .bind(session.as_str())
        .fetch_all(&mut *tx)
        .await
        .map_err(map_write_err)?;

        for (item_id, product_id, variant_id, quantity) in source {
            let target: Option<(i32,)> = sqlx::query_as(
                "SELECT id FROM cart_item \
                 WHERE user_id = $1 AND product_id = $2 \
                   AND variant_id IS NOT DISTINCT FROM $3 \
                 FOR UPDATE",
            )
            .bind(user.as_i32())
            .bind(product_id)
            .bind(variant_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_write_err)?;

            if let Some((target_id,)) = target {
                // Equivalent line exists under the user: fold the quantity
                // in, clamped at the per-line cap, and discard the session
                // row. Merging two valid carts must not fail outright.
                sqlx::query(
                    "UPDATE cart_item SET quantity = LEAST(quantity + $1, $3) WHERE id = $2",
                )
                .bind(quantity)
                .bind(target_id)
                .bind(cap)
                .execute(&mut *tx)
                .await
                .map_err(map_write_err)?;
                sqlx::query("DELETE FROM cart_item WHERE id = $1")
                    .bind(item_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_write_err)?;
            } else {
                // Re-key the session row to the user.
                sqlx::query(
                    "UPDATE cart_item SET user_id = $1, session_id = NULL WHERE id = $2",
                )
                .bind(user.as_i32())
                .bind(item_id)
                .execute(&mut *tx)
                .await
                .map_err(map_write_err)?;
            }
        }

        tx.commit().await.map_err(map_write_err)?;

        self.list_items(&CartOwner::User(user)).await
    }
}
