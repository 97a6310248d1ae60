use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::CartStore,
    services::catalog::{CatalogApi, Product},
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// A cart line joined with its live catalog product
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub product_retailer_id: String,
    pub quantity: i32,
    pub product: Product,
    pub subtotal: Decimal,
}

/// Cart summary computed from stored lines plus a fresh catalog lookup
#[derive(Debug, Clone, PartialEq)]
pub struct CartSummary {
    pub items: Vec<CartLine>,
    pub total_amount: Decimal,
    pub item_count: i32,
}

impl CartSummary {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Cart engine. The persistent rows hold only (product, quantity); every
/// read joins them against the live catalog and prunes lines whose product
/// vanished or no longer carries a valid price, so reads are self-healing.
#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogApi>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(
        store: Arc<dyn CartStore>,
        catalog: Arc<dyn CatalogApi>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            store,
            catalog,
            event_sender,
        }
    }

    /// Recomputes the cart against the live catalog.
    ///
    /// Lines whose retailer id does not resolve are excluded from the
    /// summary and deleted from storage, so a second read returns the same
    /// valid subset. Products with unparseable or non-positive prices never
    /// make it out of the catalog adapter and are pruned the same way.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartSummary, ServiceError> {
        let rows = self.store.list_by_user(user_id).await?;

        let retailer_ids: Vec<String> = rows
            .iter()
            .map(|row| row.product_retailer_id.clone())
            .collect();
        let products = self.catalog.get_products(&retailer_ids).await?;

        let mut items = Vec::new();
        let mut invalid_ids = Vec::new();
        let mut total_amount = Decimal::ZERO;
        let mut item_count = 0;

        for row in &rows {
            let Some(product) = products.get(&row.product_retailer_id) else {
                warn!(
                    retailer_id = %row.product_retailer_id,
                    "Cart line no longer resolves in catalog, marking for removal"
                );
                invalid_ids.push(row.product_retailer_id.clone());
                continue;
            };

            let subtotal = product.price * Decimal::from(row.quantity);
            total_amount += subtotal;
            item_count += row.quantity;
            items.push(CartLine {
                product_retailer_id: row.product_retailer_id.clone(),
                quantity: row.quantity,
                product: product.clone(),
                subtotal,
            });
        }

        for retailer_id in &invalid_ids {
            if let Err(e) = self.store.remove_item(user_id, retailer_id).await {
                warn!(%retailer_id, "Failed to prune invalid cart line: {}", e);
            } else {
                self.event_sender
                    .send_or_log(Event::CartItemPruned {
                        user_id,
                        product_retailer_id: retailer_id.clone(),
                    })
                    .await;
            }
        }

        if items.is_empty() && !rows.is_empty() {
            warn!(
                %user_id,
                stored = rows.len(),
                "Cart had stored lines but none are valid after catalog check"
            );
        }

        info!(
            %user_id,
            valid_items = items.len(),
            %total_amount,
            item_count,
            "Cart summary computed"
        );

        Ok(CartSummary {
            items,
            total_amount,
            item_count,
        })
    }

    /// Validates the product against the live catalog before writing.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_retailer_id: &str,
        quantity: i32,
    ) -> Result<Product, ServiceError> {
        let product = self
            .catalog
            .get_product(product_retailer_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Product {} not found in catalog",
                    product_retailer_id
                ))
            })?;

        if !product.availability.is_purchasable() {
            return Err(ServiceError::OutOfStock);
        }

        self.store
            .upsert_item(user_id, product_retailer_id, quantity)
            .await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                user_id,
                product_retailer_id: product_retailer_id.to_string(),
                quantity,
            })
            .await;

        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: Uuid,
        product_retailer_id: &str,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        self.store
            .update_quantity(user_id, product_retailer_id, quantity)
            .await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        product_retailer_id: &str,
    ) -> Result<(), ServiceError> {
        self.store.remove_item(user_id, product_retailer_id).await
    }

    #[instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: Uuid) -> Result<(), ServiceError> {
        self.store.clear(user_id).await?;
        self.event_sender
            .send_or_log(Event::CartCleared(user_id))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::cart_item;
    use crate::services::catalog::Availability;
    use async_trait::async_trait;
    use chrono::Utc;
    use dashmap::DashMap;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    struct FakeCartStore {
        lines: DashMap<(Uuid, String), i32>,
    }

    impl FakeCartStore {
        fn new() -> Self {
            Self {
                lines: DashMap::new(),
            }
        }
    }

    #[async_trait]
    impl CartStore for FakeCartStore {
        async fn list_by_user(
            &self,
            user_id: Uuid,
        ) -> Result<Vec<cart_item::Model>, ServiceError> {
            let now = Utc::now();
            let mut rows: Vec<cart_item::Model> = self
                .lines
                .iter()
                .filter(|entry| entry.key().0 == user_id)
                .map(|entry| cart_item::Model {
                    id: Uuid::new_v4(),
                    user_id,
                    product_retailer_id: entry.key().1.clone(),
                    quantity: *entry.value(),
                    created_at: now,
                    updated_at: now,
                })
                .collect();
            rows.sort_by(|a, b| a.product_retailer_id.cmp(&b.product_retailer_id));
            Ok(rows)
        }

        async fn upsert_item(
            &self,
            user_id: Uuid,
            retailer_id: &str,
            quantity: i32,
        ) -> Result<(), ServiceError> {
            *self
                .lines
                .entry((user_id, retailer_id.to_string()))
                .or_insert(0) += quantity;
            Ok(())
        }

        async fn update_quantity(
            &self,
            user_id: Uuid,
            retailer_id: &str,
            quantity: i32,
        ) -> Result<(), ServiceError> {
            self.lines
                .insert((user_id, retailer_id.to_string()), quantity);
            Ok(())
        }

        async fn remove_item(&self, user_id: Uuid, retailer_id: &str) -> Result<(), ServiceError> {
            self.lines.remove(&(user_id, retailer_id.to_string()));
            Ok(())
        }

        async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError> {
            self.lines.retain(|key, _| key.0 != user_id);
            Ok(())
        }
    }

    struct FakeCatalog {
        products: HashMap<String, Product>,
    }

    fn product(retailer_id: &str, price: Decimal, availability: Availability) -> Product {
        Product {
            id: format!("id-{}", retailer_id),
            retailer_id: retailer_id.to_string(),
            name: format!("Product {}", retailer_id),
            description: None,
            price,
            currency: "NGN".to_string(),
            image_url: None,
            availability,
            category: None,
        }
    }

    #[async_trait]
    impl CatalogApi for FakeCatalog {
        async fn get_product(&self, retailer_id: &str) -> Result<Option<Product>, ServiceError> {
            Ok(self.products.get(retailer_id).cloned())
        }

        async fn get_products(
            &self,
            retailer_ids: &[String],
        ) -> Result<HashMap<String, Product>, ServiceError> {
            Ok(retailer_ids
                .iter()
                .filter_map(|id| self.products.get(id).map(|p| (id.clone(), p.clone())))
                .collect())
        }

        async fn list_products(&self) -> Result<Vec<Product>, ServiceError> {
            Ok(self.products.values().cloned().collect())
        }
    }

    fn build_service(
        store: Arc<FakeCartStore>,
        products: Vec<Product>,
    ) -> CartService {
        let catalog = FakeCatalog {
            products: products
                .into_iter()
                .map(|p| (p.retailer_id.clone(), p))
                .collect(),
        };
        let (tx, _rx) = mpsc::channel(32);
        CartService::new(store, Arc::new(catalog), Arc::new(EventSender::new(tx)))
    }

    #[tokio::test]
    async fn totals_are_price_times_quantity() {
        let store = Arc::new(FakeCartStore::new());
        let user_id = Uuid::new_v4();
        let service = build_service(
            store.clone(),
            vec![
                product("sku-1", dec!(100.50), Availability::InStock),
                product("sku-2", dec!(20), Availability::InStock),
            ],
        );

        service.add_item(user_id, "sku-1", 2).await.unwrap();
        service.add_item(user_id, "sku-2", 3).await.unwrap();

        let summary = service.get_cart(user_id).await.unwrap();
        assert_eq!(summary.items.len(), 2);
        assert_eq!(summary.total_amount, dec!(261.00));
        assert_eq!(summary.item_count, 5);
    }

    #[tokio::test]
    async fn missing_product_is_pruned_and_prune_is_idempotent() {
        let store = Arc::new(FakeCartStore::new());
        let user_id = Uuid::new_v4();

        // Seed a line directly, bypassing catalog validation
        store.upsert_item(user_id, "gone-sku", 1).await.unwrap();
        store.upsert_item(user_id, "sku-1", 2).await.unwrap();

        let service = build_service(
            store.clone(),
            vec![product("sku-1", dec!(10), Availability::InStock)],
        );

        let summary = service.get_cart(user_id).await.unwrap();
        assert_eq!(summary.items.len(), 1);
        assert_eq!(summary.items[0].product_retailer_id, "sku-1");
        assert_eq!(summary.total_amount, dec!(20));

        // The invalid line is gone from storage; a re-read is stable
        let again = service.get_cart(user_id).await.unwrap();
        assert_eq!(again, summary);
        assert!(store
            .lines
            .get(&(user_id, "gone-sku".to_string()))
            .is_none());
    }

    #[tokio::test]
    async fn add_item_rejects_unknown_product() {
        let store = Arc::new(FakeCartStore::new());
        let service = build_service(store, vec![]);

        let err = service
            .add_item(Uuid::new_v4(), "nope", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn add_item_rejects_out_of_stock_product() {
        let store = Arc::new(FakeCartStore::new());
        let service = build_service(
            store.clone(),
            vec![product("sku-1", dec!(10), Availability::OutOfStock)],
        );

        let err = service
            .add_item(Uuid::new_v4(), "sku-1", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::OutOfStock));
        assert!(store.lines.is_empty());
    }

    #[tokio::test]
    async fn adding_same_product_merges_quantities() {
        let store = Arc::new(FakeCartStore::new());
        let user_id = Uuid::new_v4();
        let service = build_service(
            store,
            vec![product("sku-1", dec!(5), Availability::InStock)],
        );

        service.add_item(user_id, "sku-1", 1).await.unwrap();
        service.add_item(user_id, "sku-1", 4).await.unwrap();

        let summary = service.get_cart(user_id).await.unwrap();
        assert_eq!(summary.items.len(), 1);
        assert_eq!(summary.items[0].quantity, 5);
        assert_eq!(summary.item_count, 5);
    }

    #[tokio::test]
    async fn clear_cart_empties_the_summary() {
        let store = Arc::new(FakeCartStore::new());
        let user_id = Uuid::new_v4();
        let service = build_service(
            store,
            vec![product("sku-1", dec!(5), Availability::InStock)],
        );

        service.add_item(user_id, "sku-1", 2).await.unwrap();
        service.clear_cart(user_id).await.unwrap();

        let summary = service.get_cart(user_id).await.unwrap();
        assert!(summary.is_empty());
        assert_eq!(summary.total_amount, Decimal::ZERO);
    }
}
