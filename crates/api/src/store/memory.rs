//! In-process storage backend.
//!
//! Backs tests and local development without a database. One mutex guards
//! the whole state, so every operation observes and produces a consistent
//! snapshot, matching the transactional behavior of the Postgres backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use verdant_core::{
    CartItemId, CartOwner, CategoryId, Email, OrderId, OrderStatus, OrderToken, ProductId,
    SessionKey, Size, UserId, VariantId, pricing, slugify,
};

use crate::models::{
    CartItem, CartLine, Category, Order, OrderItem, Product, ProductFilter, ProductVariant,
    ProfileUpdate, User,
};

use super::{CartStore, CatalogStore, MAX_LINE_QUANTITY, OrderStore, Store, StoreError, UserStore};

/// Everything a [`MemoryStore`] holds, behind one lock.
#[derive(Default)]
struct Inner {
    categories: Vec<Category>,
    products: Vec<Product>,
    variants: Vec<ProductVariant>,
    cart_items: Vec<CartItem>,
    orders: Vec<Order>,
    users: Vec<User>,
    passwords: HashMap<i32, String>,
    sessions: HashMap<String, i32>,
    next_id: i32,
}

impl Inner {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    fn variant(&self, id: VariantId) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.id == id)
    }

    fn line(&self, item: &CartItem) -> Result<CartLine, StoreError> {
        let product = self.product(item.product_id).ok_or_else(|| {
            StoreError::DataCorruption(format!(
                "cart item {} references missing product {}",
                item.id, item.product_id
            ))
        })?;
        let variant = match item.variant_id {
            Some(id) => Some(self.variant(id).ok_or_else(|| {
                StoreError::DataCorruption(format!(
                    "cart item {} references missing variant {id}",
                    item.id
                ))
            })?),
            None => None,
        };
        Ok(CartLine::new(item, product, variant))
    }

    fn lines_for(&self, owner: &CartOwner) -> Result<Vec<CartLine>, StoreError> {
        self.cart_items
            .iter()
            .filter(|i| &i.owner == owner)
            .map(|i| self.line(i))
            .collect()
    }
}

/// Fields for seeding a product into a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    pub inventory: i32,
    pub image_url: String,
    pub is_featured: bool,
    pub materials: Option<String>,
    pub sustainability_rating: i16,
}

impl Default for NewProduct {
    fn default() -> Self {
        Self {
            title: "Product".to_owned(),
            description: String::new(),
            price: Decimal::new(1000, 2),
            discount_price: None,
            inventory: 10,
            image_url: "https://img.example/placeholder.jpg".to_owned(),
            is_featured: false,
            materials: None,
            sustainability_rating: 0,
        }
    }
}

/// In-memory implementation of every storage trait.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a category.
    pub async fn insert_category(&self, name: &str) -> Category {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let category = Category {
            id: CategoryId::new(inner.next_id()),
            name: name.to_owned(),
            slug: slugify(name),
            description: None,
            created_at: now,
            updated_at: now,
        };
        inner.categories.push(category.clone());
        category
    }

    /// Seed a product under a category.
    pub async fn insert_product(&self, category: CategoryId, spec: NewProduct) -> Product {
        let mut inner = self.inner.lock().await;
        let category_name = inner
            .categories
            .iter()
            .find(|c| c.id == category)
            .map_or_else(String::new, |c| c.name.clone());
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(inner.next_id()),
            title: spec.title.clone(),
            slug: slugify(&spec.title),
            category_id: category,
            category_name,
            description: spec.description,
            price: spec.price,
            discount_price: spec.discount_price,
            inventory: spec.inventory,
            image_url: spec.image_url,
            is_featured: spec.is_featured,
            is_active: true,
            materials: spec.materials,
            sustainability_rating: spec.sustainability_rating,
            created_at: now,
            updated_at: now,
        };
        inner.products.push(product.clone());
        product
    }

    /// Seed a variant of a product.
    pub async fn insert_variant(
        &self,
        product: ProductId,
        size: Size,
        color: &str,
    ) -> ProductVariant {
        let mut inner = self.inner.lock().await;
        let variant = ProductVariant {
            id: VariantId::new(inner.next_id()),
            product_id: product,
            size,
            color: color.to_owned(),
            stock: 10,
            image_url: None,
        };
        inner.variants.push(variant.clone());
        variant
    }

    /// Change a product's list price.
    pub async fn set_product_price(&self, id: ProductId, price: Decimal) {
        let mut inner = self.inner.lock().await;
        if let Some(p) = inner.products.iter_mut().find(|p| p.id == id) {
            p.price = price;
            p.updated_at = Utc::now();
        }
    }

    /// Set or clear a product's discount price.
    pub async fn set_discount(&self, id: ProductId, discount: Option<Decimal>) {
        let mut inner = self.inner.lock().await;
        if let Some(p) = inner.products.iter_mut().find(|p| p.id == id) {
            p.discount_price = discount;
            p.updated_at = Utc::now();
        }
    }

    /// Hide a product from listings.
    pub async fn deactivate_product(&self, id: ProductId) {
        let mut inner = self.inner.lock().await;
        if let Some(p) = inner.products.iter_mut().find(|p| p.id == id) {
            p.is_active = false;
            p.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let inner = self.inner.lock().await;
        let mut categories = inner.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.categories.iter().find(|c| c.slug == slug).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let inner = self.inner.lock().await;
        let category_id = match &filter.category {
            Some(slug) => inner.categories.iter().find(|c| &c.slug == slug).map(|c| c.id),
            None => None,
        };
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut products: Vec<Product> = inner
            .products
            .iter()
            .filter(|p| p.is_active)
            .filter(|p| match (&filter.category, category_id) {
                (None, _) => true,
                (Some(_), Some(id)) => p.category_id == id,
                (Some(_), None) => false,
            })
            .filter(|p| {
                needle.as_ref().is_none_or(|n| {
                    p.title.to_lowercase().contains(n)
                        || p.description.to_lowercase().contains(n)
                        || p.materials
                            .as_ref()
                            .is_some_and(|m| m.to_lowercase().contains(n))
                })
            })
            .filter(|p| filter.min_price.is_none_or(|min| p.price >= min))
            .filter(|p| filter.max_price.is_none_or(|max| p.price <= max))
            .filter(|p| {
                filter
                    .sustainability
                    .is_none_or(|min| p.sustainability_rating >= min)
            })
            .filter(|p| !filter.featured || p.is_featured)
            .cloned()
            .collect();
        products.sort_by(|a, b| b.id.as_i32().cmp(&a.id.as_i32()));
        Ok(products)
    }

    async fn find_product_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<(Product, Vec<ProductVariant>)>, StoreError> {
        let inner = self.inner.lock().await;
        let Some(product) = inner
            .products
            .iter()
            .find(|p| p.slug == slug && p.is_active)
            .cloned()
        else {
            return Ok(None);
        };
        let variants = inner
            .variants
            .iter()
            .filter(|v| v.product_id == product.id)
            .cloned()
            .collect();
        Ok(Some((product, variants)))
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.product(id).cloned())
    }

    async fn find_variant(&self, id: VariantId) -> Result<Option<ProductVariant>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.variant(id).cloned())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn add_item(
        &self,
        owner: &CartOwner,
        product: ProductId,
        variant: Option<VariantId>,
        quantity: u32,
    ) -> Result<CartItem, StoreError> {
        if quantity > MAX_LINE_QUANTITY {
            return Err(StoreError::InvalidInput(format!(
                "quantity exceeds the per-line maximum of {MAX_LINE_QUANTITY}"
            )));
        }
        let mut inner = self.inner.lock().await;
        if inner.product(product).is_none() {
            return Err(StoreError::NotFound);
        }
        if let Some(id) = variant
            && inner.variant(id).is_none()
        {
            return Err(StoreError::NotFound);
        }
        if let Some(existing) = inner
            .cart_items
            .iter_mut()
            .find(|i| &i.owner == owner && i.product_id == product && i.variant_id == variant)
        {
            existing.quantity = existing
                .quantity
                .checked_add(quantity)
                .filter(|q| *q <= MAX_LINE_QUANTITY)
                .ok_or_else(|| {
                    StoreError::InvalidInput(format!(
                        "line quantity would exceed the maximum of {MAX_LINE_QUANTITY}"
                    ))
                })?;
            return Ok(existing.clone());
        }
        let item = CartItem {
            id: CartItemId::new(inner.next_id()),
            owner: owner.clone(),
            product_id: product,
            variant_id: variant,
            quantity,
            created_at: Utc::now(),
        };
        inner.cart_items.push(item.clone());
        Ok(item)
    }

    async fn list_items(&self, owner: &CartOwner) -> Result<Vec<CartLine>, StoreError> {
        let inner = self.inner.lock().await;
        inner.lines_for(owner)
    }

    async fn remove_item(&self, owner: &CartOwner, item: CartItemId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(pos) = inner.cart_items.iter().position(|i| i.id == item) else {
            return Err(StoreError::NotFound);
        };
        if &inner.cart_items[pos].owner != owner {
            return Err(StoreError::Forbidden);
        }
        inner.cart_items.remove(pos);
        Ok(())
    }

    async fn clear(&self, owner: &CartOwner) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.cart_items.retain(|i| &i.owner != owner);
        Ok(())
    }

    async fn merge_session_into_user(
        &self,
        session: &SessionKey,
        user: UserId,
    ) -> Result<Vec<CartLine>, StoreError> {
        let mut inner = self.inner.lock().await;
        let session_owner = CartOwner::Session(session.clone());
        let user_owner = CartOwner::User(user);

        let moved: Vec<CartItem> = inner
            .cart_items
            .iter()
            .filter(|i| i.owner == session_owner)
            .cloned()
            .collect();
        inner.cart_items.retain(|i| i.owner != session_owner);

        for item in moved {
            if let Some(existing) = inner.cart_items.iter_mut().find(|i| {
                i.owner == user_owner
                    && i.product_id == item.product_id
                    && i.variant_id == item.variant_id
            }) {
                // Merging two valid carts never fails; the fold clamps at
                // the per-line cap instead.
                existing.quantity = existing
                    .quantity
                    .saturating_add(item.quantity)
                    .min(MAX_LINE_QUANTITY);
            } else {
                inner.cart_items.push(CartItem {
                    owner: user_owner.clone(),
                    ..item
                });
            }
        }

        inner.lines_for(&user_owner)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_order_from_cart(
        &self,
        user: UserId,
        email: &Email,
        shipping_address: &str,
    ) -> Result<Order, StoreError> {
        let mut inner = self.inner.lock().await;
        let owner = CartOwner::User(user);
        let items: Vec<CartItem> = inner
            .cart_items
            .iter()
            .filter(|i| i.owner == owner)
            .cloned()
            .collect();
        if items.is_empty() {
            return Err(StoreError::EmptyCart);
        }

        let mut order_items = Vec::with_capacity(items.len());
        for item in &items {
            let product = inner.product(item.product_id).ok_or_else(|| {
                StoreError::DataCorruption(format!(
                    "cart item {} references missing product {}",
                    item.id, item.product_id
                ))
            })?;
            let variant = item.variant_id.and_then(|id| inner.variant(id));
            let price = pricing::effective_unit_price(product.price, product.discount_price);
            order_items.push(OrderItem {
                id: 0,
                product_id: item.product_id,
                product_title: product.title.clone(),
                product_image: product.image_url.clone(),
                variant_id: item.variant_id,
                size: variant.map(|v| v.size.clone()),
                color: variant.map(|v| v.color.clone()),
                quantity: item.quantity,
                price,
            });
        }
        for oi in &mut order_items {
            oi.id = inner.next_id();
        }

        let total_amount =
            pricing::order_total(order_items.iter().map(|i| (i.price, i.quantity)));
        let now = Utc::now();
        let order = Order {
            id: OrderId::new(inner.next_id()),
            token: OrderToken::generate(),
            user_id: user,
            email: email.as_str().to_owned(),
            shipping_address: shipping_address.to_owned(),
            total_amount,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            items: order_items,
        };
        // Remove exactly the snapshotted rows, mirroring the id-scoped
        // delete of the database backend.
        let converted: Vec<CartItemId> = items.iter().map(|i| i.id).collect();
        inner.cart_items.retain(|i| !converted.contains(&i.id));
        inner.orders.push(order.clone());
        Ok(order)
    }

    async fn list_orders(&self, user: UserId) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.lock().await;
        let mut orders: Vec<Order> = inner
            .orders
            .iter()
            .filter(|o| o.user_id == user)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.id.as_i32().cmp(&a.id.as_i32()));
        Ok(orders)
    }

    async fn find_order(
        &self,
        user: UserId,
        token: OrderToken,
    ) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .orders
            .iter()
            .find(|o| o.user_id == user && o.token == token)
            .cloned())
    }

    async fn transition_order_status(
        &self,
        id: OrderId,
        to: OrderStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(order) = inner.orders.iter_mut().find(|o| o.id == id) else {
            return Err(StoreError::NotFound);
        };
        if !order.status.can_transition_to(to) {
            return Err(StoreError::Conflict(format!(
                "order in status {} cannot move to {to}",
                order.status
            )));
        }
        order.status = to;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn set_order_status(&self, id: OrderId, status: OrderStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(order) = inner.orders.iter_mut().find(|o| o.id == id) else {
            return Err(StoreError::NotFound);
        };
        order.status = status;
        order.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(
        &self,
        email: &Email,
        password_hash: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.users.iter().any(|u| &u.email == email) {
            return Err(StoreError::Conflict("email already exists".to_owned()));
        }
        let now = Utc::now();
        let user = User {
            id: UserId::new(inner.next_id()),
            email: email.clone(),
            first_name: first_name.map(str::to_owned),
            last_name: last_name.map(str::to_owned),
            created_at: now,
            updated_at: now,
        };
        inner.users.push(user.clone());
        inner
            .passwords
            .insert(user.id.as_i32(), password_hash.to_owned());
        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, StoreError> {
        let inner = self.inner.lock().await;
        let Some(user) = inner.users.iter().find(|u| &u.email == email).cloned() else {
            return Ok(None);
        };
        Ok(inner
            .passwords
            .get(&user.id.as_i32())
            .map(|hash| (user, hash.clone())))
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(email) = &update.email
            && inner.users.iter().any(|u| &u.email == email && u.id != id)
        {
            return Err(StoreError::Conflict("email already exists".to_owned()));
        }
        let Some(user) = inner.users.iter_mut().find(|u| u.id == id) else {
            return Err(StoreError::NotFound);
        };
        if let Some(email) = &update.email {
            user.email = email.clone();
        }
        if let Some(first_name) = &update.first_name {
            user.first_name = Some(first_name.clone());
        }
        if let Some(last_name) = &update.last_name {
            user.last_name = Some(last_name.clone());
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn create_auth_session(&self, user: UserId, token: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.sessions.insert(token.to_owned(), user.as_i32());
        Ok(())
    }

    async fn find_user_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().await;
        let Some(user_id) = inner.sessions.get(token).copied() else {
            return Ok(None);
        };
        Ok(inner
            .users
            .iter()
            .find(|u| u.id.as_i32() == user_id)
            .cloned())
    }

    async fn delete_auth_session(&self, token: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.sessions.remove(token);
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use verdant_core::{CartOwner, Email, OrderId, OrderStatus, SessionKey, Size, UserId};

    use super::{MemoryStore, NewProduct};
    use crate::store::{
        CartStore, CatalogStore, MAX_LINE_QUANTITY, OrderStore, StoreError, UserStore,
    };

    fn dec(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    fn session(key: &str) -> CartOwner {
        CartOwner::Session(SessionKey::parse(key).expect("valid session key"))
    }

    async fn seeded() -> (MemoryStore, verdant_core::ProductId, verdant_core::ProductId) {
        let store = MemoryStore::new();
        let cat = store.insert_category("Outerwear").await;
        let shirt = store
            .insert_product(
                cat.id,
                NewProduct {
                    title: "Hemp Shirt".to_owned(),
                    price: dec(1000),
                    ..NewProduct::default()
                },
            )
            .await;
        let socks = store
            .insert_product(
                cat.id,
                NewProduct {
                    title: "Bamboo Socks".to_owned(),
                    price: dec(500),
                    ..NewProduct::default()
                },
            )
            .await;
        (store, shirt.id, socks.id)
    }

    #[tokio::test]
    async fn repeat_add_accumulates_quantity() {
        let (store, shirt, _) = seeded().await;
        let owner = session("sess-1");

        store.add_item(&owner, shirt, None, 1).await.unwrap();
        store.add_item(&owner, shirt, None, 2).await.unwrap();

        let lines = store.list_items(&owner).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 3);
        assert_eq!(lines[0].total_price, dec(3000));
    }

    #[tokio::test]
    async fn distinct_variants_stay_separate_lines() {
        let (store, shirt, _) = seeded().await;
        let m = store.insert_variant(shirt, Size::M, "green").await;
        let l = store.insert_variant(shirt, Size::L, "green").await;
        let owner = session("sess-2");

        store.add_item(&owner, shirt, Some(m.id), 1).await.unwrap();
        store.add_item(&owner, shirt, Some(l.id), 1).await.unwrap();
        store.add_item(&owner, shirt, None, 1).await.unwrap();

        let lines = store.list_items(&owner).await.unwrap();
        assert_eq!(lines.len(), 3);
    }

    #[tokio::test]
    async fn concurrent_adds_never_lose_an_update() {
        let (store, shirt, _) = seeded().await;
        let store = Arc::new(store);
        let owner = session("sess-race");

        let a = tokio::spawn({
            let store = Arc::clone(&store);
            let owner = owner.clone();
            async move { store.add_item(&owner, shirt, None, 1).await }
        });
        let b = tokio::spawn({
            let store = Arc::clone(&store);
            let owner = owner.clone();
            async move { store.add_item(&owner, shirt, None, 1).await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let lines = store.list_items(&owner).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 2);
    }

    #[tokio::test]
    async fn quantity_past_the_cap_is_rejected_not_wrapped() {
        let (store, shirt, _) = seeded().await;
        let owner = session("sess-cap");

        assert!(matches!(
            store.add_item(&owner, shirt, None, u32::MAX).await,
            Err(StoreError::InvalidInput(_))
        ));

        store
            .add_item(&owner, shirt, None, MAX_LINE_QUANTITY)
            .await
            .unwrap();
        assert!(matches!(
            store.add_item(&owner, shirt, None, 1).await,
            Err(StoreError::InvalidInput(_))
        ));

        // The line keeps its last valid quantity.
        let lines = store.list_items(&owner).await.unwrap();
        assert_eq!(lines[0].quantity, MAX_LINE_QUANTITY);
    }

    #[tokio::test]
    async fn merge_clamps_the_fold_at_the_cap() {
        let (store, shirt, _) = seeded().await;
        let key = SessionKey::parse("sess-clamp").unwrap();
        let anon = CartOwner::Session(key.clone());
        let user = UserId::new(901);

        store
            .add_item(&anon, shirt, None, MAX_LINE_QUANTITY)
            .await
            .unwrap();
        store
            .add_item(&CartOwner::User(user), shirt, None, MAX_LINE_QUANTITY)
            .await
            .unwrap();

        let merged = store.merge_session_into_user(&key, user).await.unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].quantity, MAX_LINE_QUANTITY);
    }

    #[tokio::test]
    async fn remove_item_enforces_ownership() {
        let (store, shirt, _) = seeded().await;
        let owner = session("sess-a");
        let other = session("sess-b");
        let item = store.add_item(&owner, shirt, None, 1).await.unwrap();

        assert!(matches!(
            store.remove_item(&other, item.id).await,
            Err(StoreError::Forbidden)
        ));
        store.remove_item(&owner, item.id).await.unwrap();
        assert!(matches!(
            store.remove_item(&owner, item.id).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn merge_folds_overlap_and_rekeys_the_rest() {
        let (store, shirt, socks) = seeded().await;
        let key = SessionKey::parse("sess-merge").unwrap();
        let anon = CartOwner::Session(key.clone());
        let user = UserId::new(900);
        let owner = CartOwner::User(user);

        store.add_item(&anon, shirt, None, 2).await.unwrap();
        store.add_item(&anon, socks, None, 1).await.unwrap();
        store.add_item(&owner, shirt, None, 3).await.unwrap();

        let merged = store.merge_session_into_user(&key, user).await.unwrap();
        assert_eq!(merged.len(), 2);
        let shirt_line = merged.iter().find(|l| l.product_id == shirt).unwrap();
        assert_eq!(shirt_line.quantity, 5);
        let socks_line = merged.iter().find(|l| l.product_id == socks).unwrap();
        assert_eq!(socks_line.quantity, 1);

        assert!(store.list_items(&anon).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn checkout_freezes_prices_and_clears_the_cart() {
        let (store, shirt, socks) = seeded().await;
        // Socks list at 9.00 but are discounted to 5.00; the discount is
        // what gets frozen.
        store.set_product_price(socks, dec(900)).await;
        store.set_discount(socks, Some(dec(500))).await;
        let user = UserId::new(42);
        let owner = CartOwner::User(user);
        let email = Email::parse("jo@example.com").unwrap();

        store.add_item(&owner, shirt, None, 2).await.unwrap();
        store.add_item(&owner, socks, None, 1).await.unwrap();

        let order = store
            .create_order_from_cart(user, &email, "1 Green Way")
            .await
            .unwrap();
        assert_eq!(order.total_amount, dec(2500));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 2);
        assert!(store.list_items(&owner).await.unwrap().is_empty());

        // A later price change never touches the stored order.
        store.set_product_price(shirt, dec(9900)).await;
        let reread = store.find_order(user, order.token).await.unwrap().unwrap();
        assert_eq!(reread.total_amount, dec(2500));
        let shirt_item = reread.items.iter().find(|i| i.product_id == shirt).unwrap();
        assert_eq!(shirt_item.price, dec(1000));
        let socks_item = reread.items.iter().find(|i| i.product_id == socks).unwrap();
        assert_eq!(socks_item.price, dec(500));
    }

    #[tokio::test]
    async fn item_added_during_checkout_is_never_lost() {
        let (store, shirt, socks) = seeded().await;
        let store = Arc::new(store);
        let user = UserId::new(77);
        let owner = CartOwner::User(user);
        let email = Email::parse("jo@example.com").unwrap();

        store.add_item(&owner, shirt, None, 1).await.unwrap();

        // Checkout deletes only the rows it snapshotted, so whichever side
        // of this race commits second, the socks end up in exactly one
        // place: the order or the cart. Never neither.
        let checkout = tokio::spawn({
            let store = Arc::clone(&store);
            let email = email.clone();
            async move { store.create_order_from_cart(user, &email, "1 Green Way").await }
        });
        let add = tokio::spawn({
            let store = Arc::clone(&store);
            let owner = owner.clone();
            async move { store.add_item(&owner, socks, None, 1).await }
        });

        let order = checkout.await.unwrap().unwrap();
        add.await.unwrap().unwrap();

        let in_order = order.items.iter().any(|i| i.product_id == socks);
        let in_cart = store
            .list_items(&owner)
            .await
            .unwrap()
            .iter()
            .any(|l| l.product_id == socks);
        assert_ne!(in_order, in_cart, "socks must survive in exactly one place");
    }

    #[tokio::test]
    async fn transitions_are_guarded_against_the_current_status() {
        let (store, shirt, _) = seeded().await;
        let user = UserId::new(55);
        let owner = CartOwner::User(user);
        let email = Email::parse("jo@example.com").unwrap();
        store.add_item(&owner, shirt, None, 1).await.unwrap();
        let order = store
            .create_order_from_cart(user, &email, "1 Green Way")
            .await
            .unwrap();

        store
            .set_order_status(order.id, OrderStatus::Shipped)
            .await
            .unwrap();

        // Shipped forbids cancellation; the guarded update refuses instead
        // of overwriting.
        assert!(matches!(
            store
                .transition_order_status(order.id, OrderStatus::Cancelled)
                .await,
            Err(StoreError::Conflict(_))
        ));
        let reread = store.find_order(user, order.token).await.unwrap().unwrap();
        assert_eq!(reread.status, OrderStatus::Shipped);

        store
            .transition_order_status(order.id, OrderStatus::Delivered)
            .await
            .unwrap();
        assert!(matches!(
            store
                .transition_order_status(OrderId::new(9999), OrderStatus::Cancelled)
                .await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn checkout_uses_discount_price_when_set() {
        let (store, shirt, _) = seeded().await;
        store.set_discount(shirt, Some(dec(800))).await;
        let user = UserId::new(7);
        let owner = CartOwner::User(user);
        let email = Email::parse("jo@example.com").unwrap();

        store.add_item(&owner, shirt, None, 2).await.unwrap();
        let order = store
            .create_order_from_cart(user, &email, "1 Green Way")
            .await
            .unwrap();
        assert_eq!(order.total_amount, dec(1600));
    }

    #[tokio::test]
    async fn checkout_on_empty_cart_fails() {
        let (store, _, _) = seeded().await;
        let email = Email::parse("jo@example.com").unwrap();
        assert!(matches!(
            store
                .create_order_from_cart(UserId::new(1), &email, "1 Green Way")
                .await,
            Err(StoreError::EmptyCart)
        ));
    }

    #[tokio::test]
    async fn inactive_products_hide_from_listings_but_stay_in_carts() {
        let (store, shirt, _) = seeded().await;
        let owner = session("sess-x");
        store.add_item(&owner, shirt, None, 1).await.unwrap();
        store.deactivate_product(shirt).await;

        let listed = store
            .list_products(&crate::models::ProductFilter::default())
            .await
            .unwrap();
        assert!(listed.iter().all(|p| p.id != shirt));

        let lines = store.list_items(&owner).await.unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_email_registration_conflicts() {
        let store = MemoryStore::new();
        let email = Email::parse("jo@example.com").unwrap();
        store.create_user(&email, "hash", None, None).await.unwrap();
        assert!(matches!(
            store.create_user(&email, "hash", None, None).await,
            Err(StoreError::Conflict(_))
        ));
    }
}
