pub mod cart;
pub mod catalog;
pub mod documents;
pub mod orders;
pub mod payments;
pub mod users;
pub mod whatsapp;

pub use cart::{CartLine, CartService, CartSummary};
pub use catalog::{Availability, CatalogApi, MetaCatalogClient, Product};
pub use documents::{CustomerDetails, DocumentService};
pub use orders::{OrderService, OrderWithItems};
pub use payments::{PaymentGateway, PaymentMetadata, PaymentVerification, PaystackClient};
pub use users::UserService;
pub use whatsapp::{FlowLaunchOptions, MessagingApi, WhatsAppClient};
