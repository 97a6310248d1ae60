use crate::{
    entities::{
        order::{self, OrderStatus, PaymentStatus},
        order_item,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::OrderStore,
    services::cart::CartService,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// An order together with its snapshotted line items
#[derive(Debug, Clone)]
pub struct OrderWithItems {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Order engine. Converts a cart summary into an immutable order snapshot;
/// afterwards only status, payment status and payment link may change.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    cart_service: CartService,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        cart_service: CartService,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            store,
            cart_service,
            event_sender,
        }
    }

    /// Snapshots the current cart into a new order.
    ///
    /// The cart read itself prunes invalid lines, so an order can only be
    /// built from products that resolved in the catalog moments before.
    /// The cart is cleared once the snapshot is persisted.
    #[instrument(skip(self))]
    pub async fn create_order_from_cart(
        &self,
        user_id: Uuid,
        delivery_address: &str,
    ) -> Result<OrderWithItems, ServiceError> {
        let cart = self.cart_service.get_cart(user_id).await?;

        if cart.is_empty() {
            return Err(ServiceError::EmptyCart);
        }
        if cart.total_amount <= Decimal::ZERO {
            return Err(ServiceError::InvalidCartTotal);
        }

        let order = self
            .store
            .create(user_id, cart.total_amount, delivery_address, None)
            .await?;

        for line in &cart.items {
            self.store
                .add_item(
                    order.id,
                    &line.product_retailer_id,
                    &line.product.name,
                    line.product.price,
                    line.quantity,
                    line.subtotal,
                )
                .await?;
        }

        self.cart_service.clear_cart(user_id).await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order.id))
            .await;
        info!(order_id = %order.id, total = %order.total_amount, "Order created from cart");

        let items = self.store.list_items(order.id).await?;
        Ok(OrderWithItems { order, items })
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<OrderWithItems>, ServiceError> {
        let Some(order) = self.store.find_by_id(id).await? else {
            return Ok(None);
        };
        let items = self.store.list_items(id).await?;
        Ok(Some(OrderWithItems { order, items }))
    }

    #[instrument(skip(self))]
    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<order::Model>, ServiceError> {
        self.store.find_by_user(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<(), ServiceError> {
        self.store.update_status(id, status).await?;
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id: id,
                new_status: format!("{:?}", status),
            })
            .await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), ServiceError> {
        self.store.update_payment_status(id, status).await
    }

    #[instrument(skip(self))]
    pub async fn update_payment_link(&self, id: Uuid, link: &str) -> Result<(), ServiceError> {
        self.store.update_payment_link(id, link).await?;
        self.event_sender
            .send_or_log(Event::PaymentLinkGenerated(id))
            .await;
        Ok(())
    }

    /// Marks an order paid and confirmed after gateway verification.
    #[instrument(skip(self))]
    pub async fn mark_paid(&self, id: Uuid) -> Result<(), ServiceError> {
        self.store
            .update_payment_status(id, PaymentStatus::Paid)
            .await?;
        self.store.update_status(id, OrderStatus::Confirmed).await?;
        self.event_sender
            .send_or_log(Event::PaymentConfirmed(id))
            .await;
        Ok(())
    }
}
