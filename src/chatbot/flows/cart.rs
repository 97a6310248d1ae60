use crate::{
    chatbot::buttons::ButtonAction,
    models::outbound::{Interactive, ListRow, ListSection, OutboundMessage, ReplyButton},
    services::{cart::CartService, catalog::CatalogApi},
};
use std::sync::Arc;
use tracing::{error, instrument};
use uuid::Uuid;

/// Catalogs up to this size render as a tappable in-chat layout; anything
/// larger falls back to the native catalog browser.
const LIST_LAYOUT_MAX: usize = 10;
/// WhatsApp allows at most three reply buttons per message.
const BUTTON_LAYOUT_MAX: usize = 3;

/// Cart flow: browse, view cart, add to cart. Every entry point resolves to
/// a message; failures become apologetic replies rather than errors.
#[derive(Clone)]
pub struct CartFlow {
    catalog: Arc<dyn CatalogApi>,
    cart_service: CartService,
}

impl CartFlow {
    pub fn new(catalog: Arc<dyn CatalogApi>, cart_service: CartService) -> Self {
        Self {
            catalog,
            cart_service,
        }
    }

    /// Picks a layout by catalog size: reply buttons for up to three
    /// products, a scrollable list for up to ten, otherwise the native
    /// catalog browser (also the fallback when listing fails).
    #[instrument(skip(self))]
    pub async fn show_product_catalog(&self, phone_number: &str) -> OutboundMessage {
        let native_catalog = OutboundMessage::Catalog {
            to: phone_number.to_string(),
            body: "Browse our products:".to_string(),
            thumbnail_product_retailer_id: None,
        };

        let mut products = match self.catalog.list_products().await {
            Ok(products) => products,
            Err(e) => {
                error!("Failed to list catalog products: {}", e);
                return native_catalog;
            }
        };
        products.retain(|p| p.availability.is_purchasable());

        match products.len() {
            0 => native_catalog,
            n if n <= BUTTON_LAYOUT_MAX => {
                let buttons = products
                    .iter()
                    .map(|p| {
                        ReplyButton::new(
                            ButtonAction::AddProduct(p.retailer_id.clone()).encode(),
                            &p.name,
                        )
                    })
                    .collect();
                OutboundMessage::buttons(
                    phone_number,
                    "Browse our products and tap one to add it to your cart:",
                    buttons,
                )
            }
            n if n <= LIST_LAYOUT_MAX => {
                let rows = products
                    .iter()
                    .map(|p| {
                        ListRow::new(
                            ButtonAction::AddProduct(p.retailer_id.clone()).encode(),
                            &p.name,
                            Some(format!("₦{:.2}", p.price)),
                        )
                    })
                    .collect();
                OutboundMessage::Interactive {
                    to: phone_number.to_string(),
                    interactive: Interactive::List {
                        body: "Browse our products and pick one to add it to your cart:"
                            .to_string(),
                        button: "View products".to_string(),
                        sections: vec![ListSection {
                            title: Some("Products".to_string()),
                            rows,
                        }],
                    },
                }
            }
            _ => native_catalog,
        }
    }

    #[instrument(skip(self))]
    pub async fn show_cart(&self, phone_number: &str, user_id: Uuid) -> OutboundMessage {
        let cart = match self.cart_service.get_cart(user_id).await {
            Ok(cart) => cart,
            Err(e) => {
                error!("Failed to show cart: {}", e);
                return OutboundMessage::text(
                    phone_number,
                    "Sorry, we encountered an error loading your cart. Please try again later.",
                );
            }
        };

        if cart.is_empty() {
            return OutboundMessage::buttons(
                phone_number,
                "Your cart is empty. Would you like to browse products?",
                vec![
                    ReplyButton::new(ButtonAction::BrowseProducts.encode(), "Browse Products"),
                    ReplyButton::new(ButtonAction::BackToMenu.encode(), "Back to Menu"),
                ],
            );
        }

        let mut body = String::from("🛒 *Your Cart*\n\n");
        for line in &cart.items {
            body.push_str(&format!(
                "{}\nQty: {} × ₦{:.2} = ₦{:.2}\n\n",
                line.product.name, line.quantity, line.product.price, line.subtotal
            ));
        }
        body.push_str(&format!(
            "*Total: ₦{:.2}*\nItems: {}",
            cart.total_amount, cart.item_count
        ));

        OutboundMessage::buttons(
            phone_number,
            body,
            vec![
                ReplyButton::new(ButtonAction::PlaceOrder.encode(), "Place Order"),
                ReplyButton::new(ButtonAction::EditCart.encode(), "Edit Cart"),
                ReplyButton::new(ButtonAction::BrowseProducts.encode(), "Add More Items"),
            ],
        )
    }

    /// Validates against the live catalog, writes the line, and confirms
    /// with follow-up choices. Any failure becomes an apology reply.
    #[instrument(skip(self))]
    pub async fn handle_add_to_cart(
        &self,
        phone_number: &str,
        user_id: Uuid,
        product_retailer_id: &str,
        quantity: i32,
    ) -> OutboundMessage {
        match self
            .cart_service
            .add_item(user_id, product_retailer_id, quantity)
            .await
        {
            Ok(product) => OutboundMessage::buttons(
                phone_number,
                format!(
                    "✅ {}x {} added to cart!\n\nWhat would you like to do next?",
                    quantity, product.name
                ),
                vec![
                    ReplyButton::new(ButtonAction::ViewCart.encode(), "View Cart"),
                    ReplyButton::new(ButtonAction::BrowseProducts.encode(), "Continue Shopping"),
                ],
            ),
            Err(e) => {
                error!("Failed to add item to cart: {}", e);
                OutboundMessage::text(
                    phone_number,
                    format!("Sorry, we couldn't add the item to your cart. {}", e),
                )
            }
        }
    }
}
