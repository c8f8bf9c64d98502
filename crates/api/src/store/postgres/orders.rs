//! Order queries and the cart-to-order conversion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

use verdant_core::{
    Email, OrderId, OrderStatus, OrderToken, ProductId, Size, UserId, VariantId, pricing,
};

use super::{PgStore, map_write_err, quantity_from_db, retry_read};
use crate::models::{Order, OrderItem};
use crate::store::{OrderStore, StoreError};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_token: Uuid,
    user_id: i32,
    email: String,
    shipping_address: String,
    total_amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, StoreError> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(StoreError::DataCorruption)?;
        Ok(Order {
            id: OrderId::new(self.id),
            token: OrderToken::from_uuid(self.order_token),
            user_id: UserId::new(self.user_id),
            email: self.email,
            shipping_address: self.shipping_address,
            total_amount: self.total_amount,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: i32,
    variant_id: Option<i32>,
    quantity: i32,
    price: Decimal,
    product_title: String,
    product_image: String,
    size: Option<String>,
    color: Option<String>,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = StoreError;

    fn try_from(r: OrderItemRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: r.id,
            product_id: ProductId::new(r.product_id),
            product_title: r.product_title,
            product_image: r.product_image,
            variant_id: r.variant_id.map(VariantId::new),
            size: r.size.map(|s| Size::from(s.as_str())),
            color: r.color,
            quantity: quantity_from_db(r.quantity)?,
            price: r.price,
        })
    }
}

const ORDER_SELECT: &str = "SELECT id, order_token, user_id, email, shipping_address, \
     total_amount, status, created_at, updated_at FROM orders";

const ORDER_ITEM_SELECT: &str = "SELECT oi.id, oi.order_id, oi.product_id, oi.variant_id, oi.quantity, oi.price, \
     p.title AS product_title, p.image_url AS product_image, v.size, v.color \
     FROM order_item oi \
     JOIN product p ON p.id = oi.product_id \
     LEFT JOIN product_variant v ON v.id = oi.variant_id";

impl PgStore {
    /// Load the items for a set of orders, grouped by order id.
    async fn load_items(&self, order_ids: &[i32]) -> Result<Vec<OrderItemRow>, StoreError> {
        let sql = format!("{ORDER_ITEM_SELECT} WHERE oi.order_id = ANY($1) ORDER BY oi.id ASC");
        retry_read(|| async {
            sqlx::query_as(&sql)
                .bind(order_ids)
                .fetch_all(&self.pool)
                .await
        })
        .await
    }

    async fn load_order(&self, id: OrderId) -> Result<Order, StoreError> {
        let sql = format!("{ORDER_SELECT} WHERE id = $1");
        let row: OrderRow = retry_read(|| async {
            sqlx::query_as(&sql).bind(id.as_i32()).fetch_one(&self.pool).await
        })
        .await?;

        let items = self
            .load_items(&[row.id])
            .await?
            .into_iter()
            .map(OrderItem::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        row.into_order(items)
    }
}

#[async_trait]
impl OrderStore for PgStore {
    #[instrument(skip(self, email), fields(user = %user))]
    async fn create_order_from_cart(
        &self,
        user: UserId,
        email: &Email,
        shipping_address: &str,
    ) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_write_err)?;

        // Lock the cart rows: an add or merge racing this checkout waits
        // until the conversion commits, so the snapshot is consistent.
        let lines: Vec<(i32, i32, Option<i32>, i32, Decimal, Option<Decimal>)> = sqlx::query_as(
            "SELECT ci.id, ci.product_id, ci.variant_id, ci.quantity, p.price, p.discount_price \
             FROM cart_item ci \
             JOIN product p ON p.id = ci.product_id \
             WHERE ci.user_id = $1 \
             ORDER BY ci.created_at ASC \
             FOR UPDATE OF ci",
        )
        .bind(user.as_i32())
        .fetch_all(&mut *tx)
        .await
        .map_err(map_write_err)?;

        if lines.is_empty() {
            return Err(StoreError::EmptyCart);
        }

        let snapshot_ids: Vec<i32> = lines.iter().map(|l| l.0).collect();

        // Freeze unit prices at this instant; the stored values are never
        // recomputed from the live product.
        let frozen: Vec<(i32, Option<i32>, i32, Decimal)> = lines
            .into_iter()
            .map(|(_, product_id, variant_id, quantity, price, discount)| {
                let unit = pricing::effective_unit_price(price, discount);
                (product_id, variant_id, quantity, unit)
            })
            .collect();

        let mut totals = Vec::with_capacity(frozen.len());
        for (_, _, qty, unit) in &frozen {
            totals.push((*unit, quantity_from_db(*qty)?));
        }
        let total = pricing::order_total(totals.into_iter());

        let token = OrderToken::generate();
        let (order_id,): (i32,) = sqlx::query_as(
            "INSERT INTO orders (order_token, user_id, email, shipping_address, total_amount, status) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(token.as_uuid())
        .bind(user.as_i32())
        .bind(email.as_str())
        .bind(shipping_address)
        .bind(total)
        .bind(OrderStatus::Pending.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_err)?;

        for (product_id, variant_id, quantity, unit) in &frozen {
            sqlx::query(
                "INSERT INTO order_item (order_id, product_id, variant_id, quantity, price) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(order_id)
            .bind(product_id)
            .bind(variant_id)
            .bind(quantity)
            .bind(unit)
            .execute(&mut *tx)
            .await
            .map_err(map_write_err)?;
        }

        // Delete exactly the rows that were converted. A row committed by a
        // concurrent add or merge after the snapshot's locks were taken is
        // not part of this order and must stay in the cart.
        sqlx::query("DELETE FROM cart_item WHERE id = ANY($1)")
            .bind(&snapshot_ids)
            .execute(&mut *tx)
            .await
            .map_err(map_write_err)?;

        tx.commit().await.map_err(map_write_err)?;

        self.load_order(OrderId::new(order_id)).await
    }

    #[instrument(skip(self), fields(user = %user))]
    async fn list_orders(&self, user: UserId) -> Result<Vec<Order>, StoreError> {
        let sql = format!("{ORDER_SELECT} WHERE user_id = $1 ORDER BY created_at DESC");
        let rows: Vec<OrderRow> = retry_read(|| async {
            sqlx::query_as(&sql)
                .bind(user.as_i32())
                .fetch_all(&self.pool)
                .await
        })
        .await?;

        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let mut items_by_order: std::collections::HashMap<i32, Vec<OrderItem>> =
            std::collections::HashMap::new();
        for item_row in self.load_items(&ids).await? {
            let order_id = item_row.order_id;
            items_by_order
                .entry(order_id)
                .or_default()
                .push(OrderItem::try_from(item_row)?);
        }

        rows.into_iter()
            .map(|row| {
                let items = items_by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }

    #[instrument(skip(self), fields(user = %user, token = %token))]
    async fn find_order(
        &self,
        user: UserId,
        token: OrderToken,
    ) -> Result<Option<Order>, StoreError> {
        let sql = format!("{ORDER_SELECT} WHERE user_id = $1 AND order_token = $2");
        let row: Option<OrderRow> = retry_read(|| async {
            sqlx::query_as(&sql)
                .bind(user.as_i32())
                .bind(token.as_uuid())
                .fetch_optional(&self.pool)
                .await
        })
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = self
            .load_items(&[row.id])
            .await?
            .into_iter()
            .map(OrderItem::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        row.into_order(items).map(Some)
    }

    #[instrument(skip(self))]
    async fn transition_order_status(
        &self,
        id: OrderId,
        to: OrderStatus,
    ) -> Result<(), StoreError> {
        let from: Vec<String> = OrderStatus::ALL
            .iter()
            .filter(|s| s.can_transition_to(to))
            .map(ToString::to_string)
            .collect();

        // Guarded compare-and-set: the WHERE clause re-checks the current
        // status, so a transition committed after the caller's read cannot
        // be overwritten.
        let result = sqlx::query(
            "UPDATE orders SET status = $1, updated_at = NOW() \
             WHERE id = $2 AND status = ANY($3)",
        )
        .bind(to.to_string())
        .bind(id.as_i32())
        .bind(&from)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        if result.rows_affected() == 0 {
            let current: Option<(String,)> =
                sqlx::query_as("SELECT status FROM orders WHERE id = $1")
                    .bind(id.as_i32())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_write_err)?;
            return match current {
                Some((status,)) => Err(StoreError::Conflict(format!(
                    "order in status {status} cannot move to {to}"
                ))),
                None => Err(StoreError::NotFound),
            };
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_order_status(&self, id: OrderId, status: OrderStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.to_string())
            .bind(id.as_i32())
            .execute(&self.pool)
            .await
            .map_err(map_write_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }
}
