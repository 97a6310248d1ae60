pub mod outbound;
pub mod webhook;

pub use outbound::{Interactive, ListRow, ListSection, OutboundMessage, ReplyButton};
pub use webhook::{
    InboundInteractive, InboundMessage, InboundOrder, InteractiveKind, MessageContext,
    MessageKind, OrderProductItem, WebhookPayload,
};
