//! Outbound message descriptors.
//!
//! One enum variant per wire shape, so an interactive payload on a text
//! message (and similar invalid combinations) cannot be constructed. The
//! messaging adapter owns the mapping to Graph API JSON.

use serde::{Deserialize, Serialize};

/// WhatsApp caps reply button titles at 20 characters
pub const BUTTON_TITLE_MAX: usize = 20;
/// WhatsApp caps list row titles at 24 characters
pub const LIST_ROW_TITLE_MAX: usize = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Text {
        to: String,
        body: String,
        preview_url: bool,
    },
    Interactive {
        to: String,
        interactive: Interactive,
    },
    Template {
        to: String,
        template: serde_json::Value,
    },
    /// Native catalog message, optionally with a thumbnail product
    Catalog {
        to: String,
        body: String,
        thumbnail_product_retailer_id: Option<String>,
    },
    /// Document by previously uploaded media id
    Document {
        to: String,
        media_id: String,
        filename: String,
        caption: Option<String>,
    },
}

impl OutboundMessage {
    pub fn text(to: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Text {
            to: to.into(),
            body: body.into(),
            preview_url: false,
        }
    }

    pub fn text_with_preview(to: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Text {
            to: to.into(),
            body: body.into(),
            preview_url: true,
        }
    }

    pub fn buttons(
        to: impl Into<String>,
        body: impl Into<String>,
        buttons: Vec<ReplyButton>,
    ) -> Self {
        Self::Interactive {
            to: to.into(),
            interactive: Interactive::Buttons {
                body: body.into(),
                buttons,
            },
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Self::Text { to, .. }
            | Self::Interactive { to, .. }
            | Self::Template { to, .. }
            | Self::Catalog { to, .. }
            | Self::Document { to, .. } => to,
        }
    }
}

/// Interactive message payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interactive {
    /// Up to three tappable reply buttons
    Buttons {
        body: String,
        buttons: Vec<ReplyButton>,
    },
    /// Scrollable list, up to ten rows
    List {
        body: String,
        button: String,
        sections: Vec<ListSection>,
    },
    /// Call-to-action URL button
    CtaUrl {
        header: Option<String>,
        body: String,
        footer: Option<String>,
        display_text: String,
        url: String,
    },
    /// Launches a published WhatsApp Flow
    Flow {
        header: Option<String>,
        body: String,
        footer: Option<String>,
        cta: String,
        flow_id: String,
        flow_token: String,
        screen: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyButton {
    pub id: String,
    pub title: String,
}

impl ReplyButton {
    pub fn new(id: impl Into<String>, title: &str) -> Self {
        Self {
            id: id.into(),
            title: truncated(title, BUTTON_TITLE_MAX),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSection {
    pub title: Option<String>,
    pub rows: Vec<ListRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
}

impl ListRow {
    pub fn new(id: impl Into<String>, title: &str, description: Option<String>) -> Self {
        Self {
            id: id.into(),
            title: truncated(title, LIST_ROW_TITLE_MAX),
            description,
        }
    }
}

/// Truncates on a character boundary, appending an ellipsis when cut.
fn truncated(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
