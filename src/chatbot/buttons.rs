//! Structured button-id encoding.
//!
//! Every tappable id the bot emits is produced by [`ButtonAction::encode`]
//! and parsed back with [`ButtonAction::decode`], so dispatch is a pattern
//! match instead of scattered string surgery. Ids the bot never issued
//! decode to `Unknown` and are ignored upstream.

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    ViewCart,
    EditCart,
    BrowseProducts,
    ViewAllProducts,
    /// Add one unit of a catalog product to the cart
    AddProduct(String),
    PlaceOrder,
    /// Main-menu entry point into ordering
    PlaceOrderMain,
    UseExistingAddress,
    ProvideNewAddress,
    /// Re-send the payment link for an order
    PayOrder(Uuid),
    RetryOnboarding,
    BackToMenu,
    Unknown(String),
}

impl ButtonAction {
    pub fn encode(&self) -> String {
        match self {
            Self::ViewCart => "view_cart".to_string(),
            Self::EditCart => "edit_cart".to_string(),
            Self::BrowseProducts => "browse_products".to_string(),
            Self::ViewAllProducts => "view_all_products".to_string(),
            Self::AddProduct(retailer_id) => format!("product_{}", retailer_id),
            Self::PlaceOrder => "place_order".to_string(),
            Self::PlaceOrderMain => "place_order_main".to_string(),
            Self::UseExistingAddress => "use_existing_address".to_string(),
            Self::ProvideNewAddress => "provide_new_address".to_string(),
            Self::PayOrder(order_id) => format!("payment_{}", order_id),
            Self::RetryOnboarding => "retry_onboarding".to_string(),
            Self::BackToMenu => "back_to_menu".to_string(),
            Self::Unknown(id) => id.clone(),
        }
    }

    pub fn decode(id: &str) -> Self {
        match id {
            "view_cart" => Self::ViewCart,
            "edit_cart" => Self::EditCart,
            "browse_products" => Self::BrowseProducts,
            "view_all_products" => Self::ViewAllProducts,
            "place_order" => Self::PlaceOrder,
            "place_order_main" => Self::PlaceOrderMain,
            "use_existing_address" => Self::UseExistingAddress,
            "provide_new_address" => Self::ProvideNewAddress,
            "retry_onboarding" => Self::RetryOnboarding,
            "back_to_menu" => Self::BackToMenu,
            _ => {
                if let Some(retailer_id) = id.strip_prefix("product_") {
                    if !retailer_id.is_empty() {
                        return Self::AddProduct(retailer_id.to_string());
                    }
                }
                if let Some(order_id) = id.strip_prefix("payment_") {
                    if let Ok(order_id) = order_id.parse::<Uuid>() {
                        return Self::PayOrder(order_id);
                    }
                }
                Self::Unknown(id.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_ids_roundtrip() {
        let actions = [
            ButtonAction::ViewCart,
            ButtonAction::EditCart,
            ButtonAction::BrowseProducts,
            ButtonAction::ViewAllProducts,
            ButtonAction::PlaceOrder,
            ButtonAction::PlaceOrderMain,
            ButtonAction::UseExistingAddress,
            ButtonAction::ProvideNewAddress,
            ButtonAction::RetryOnboarding,
            ButtonAction::BackToMenu,
        ];
        for action in actions {
            assert_eq!(ButtonAction::decode(&action.encode()), action);
        }
    }

    #[test]
    fn product_ids_carry_the_retailer_id() {
        let action = ButtonAction::AddProduct("sku-42".into());
        assert_eq!(action.encode(), "product_sku-42");
        assert_eq!(ButtonAction::decode("product_sku-42"), action);
    }

    #[test]
    fn payment_ids_carry_the_order_uuid() {
        let order_id = Uuid::new_v4();
        let action = ButtonAction::PayOrder(order_id);
        assert_eq!(action.encode(), format!("payment_{}", order_id));
        assert_eq!(ButtonAction::decode(&action.encode()), action);
    }

    #[test]
    fn malformed_payment_id_is_unknown() {
        assert_eq!(
            ButtonAction::decode("payment_not-a-uuid"),
            ButtonAction::Unknown("payment_not-a-uuid".into())
        );
    }

    #[test]
    fn empty_product_suffix_is_unknown() {
        assert_eq!(
            ButtonAction::decode("product_"),
            ButtonAction::Unknown("product_".into())
        );
    }

    #[test]
    fn foreign_ids_are_unknown() {
        assert_eq!(
            ButtonAction::decode("some_future_button"),
            ButtonAction::Unknown("some_future_button".into())
        );
    }
}
