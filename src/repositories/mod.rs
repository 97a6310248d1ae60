//! Persistence contracts and their sea-orm implementations.
//!
//! The dialogue and flow layers depend on these traits only; the concrete
//! stores are wired in at startup.

pub mod cart_repository;
pub mod order_repository;
pub mod user_repository;

pub use cart_repository::{CartStore, SeaOrmCartStore};
pub use order_repository::{OrderStore, SeaOrmOrderStore};
pub use user_repository::{NewUser, SeaOrmUserStore, UserStore};
