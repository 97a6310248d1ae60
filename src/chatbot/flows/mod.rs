pub mod cart;
pub mod onboarding;
pub mod order;

pub use cart::CartFlow;
pub use onboarding::{OnboardingFlow, WELCOME_MENU};
pub use order::OrderFlow;
