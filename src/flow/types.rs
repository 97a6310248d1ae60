//! Wire types for the encrypted Flow exchange.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Encrypted envelope posted by WhatsApp (all fields base64)
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct FlowEnvelope {
    pub encrypted_aes_key: String,
    pub encrypted_flow_data: String,
    pub initial_vector: String,
}

/// Decrypted request payload
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FlowRequest {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub screen: Option<String>,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub flow_token: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

/// What a request is asking for. The protocol gives no explicit signal, so
/// this is derived once at the boundary instead of re-inferred per handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenAction {
    /// Screen opened with no action and no data
    InitialLoad,
    /// Form submission (`data_exchange`)
    DataExchange,
    /// Anything else (unknown actions, data without an action)
    Other,
}

impl FlowRequest {
    pub fn screen_action(&self) -> ScreenAction {
        match self.action.as_deref() {
            Some("data_exchange") => ScreenAction::DataExchange,
            Some(_) => ScreenAction::Other,
            None => {
                if self.data_is_empty() {
                    ScreenAction::InitialLoad
                } else {
                    ScreenAction::Other
                }
            }
        }
    }

    pub fn data_is_empty(&self) -> bool {
        self.data.as_ref().map(Map::is_empty).unwrap_or(true)
    }

    pub fn screen_is_empty(&self) -> bool {
        self.screen.as_deref().map(str::is_empty).unwrap_or(true)
    }

    pub fn version_or_default(&self) -> String {
        self.version.clone().unwrap_or_else(|| "3.0".to_string())
    }

    /// Field accessor: trimmed string value or empty
    pub fn field(&self, key: &str) -> String {
        self.data
            .as_ref()
            .and_then(|data| data.get(key))
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("")
            .to_string()
    }
}

/// Plaintext response, encrypted before leaving the endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowResponse {
    pub version: String,
    pub screen: String,
    pub data: Map<String, Value>,
}

impl FlowResponse {
    pub fn new(version: String, screen: impl Into<String>) -> Self {
        Self {
            version,
            screen: screen.into(),
            data: Map::new(),
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(action: Option<&str>, data: Option<Value>) -> FlowRequest {
        FlowRequest {
            version: Some("3.0".into()),
            screen: Some("BASIC_INFO".into()),
            data: data.map(|v| v.as_object().unwrap().clone()),
            flow_token: None,
            action: action.map(str::to_string),
        }
    }

    #[test]
    fn no_action_no_data_is_initial_load() {
        assert_eq!(request(None, None).screen_action(), ScreenAction::InitialLoad);
        assert_eq!(
            request(None, Some(json!({}))).screen_action(),
            ScreenAction::InitialLoad
        );
    }

    #[test]
    fn data_exchange_action_is_submission() {
        assert_eq!(
            request(Some("data_exchange"), Some(json!({"email": "a@b.c"}))).screen_action(),
            ScreenAction::DataExchange
        );
        // Even with empty data the action wins
        assert_eq!(
            request(Some("data_exchange"), None).screen_action(),
            ScreenAction::DataExchange
        );
    }

    #[test]
    fn other_shapes_are_other() {
        assert_eq!(
            request(Some("ping"), None).screen_action(),
            ScreenAction::Other
        );
        assert_eq!(
            request(None, Some(json!({"email": "a@b.c"}))).screen_action(),
            ScreenAction::Other
        );
    }

    #[test]
    fn field_accessor_trims_and_defaults() {
        let req = request(None, Some(json!({"business_name": "  Acme  ", "n": 5})));
        assert_eq!(req.field("business_name"), "Acme");
        assert_eq!(req.field("missing"), "");
        // Non-string values read as empty
        assert_eq!(req.field("n"), "");
    }

    #[test]
    fn flow_request_tolerates_unknown_fields() {
        let req: FlowRequest = serde_json::from_value(json!({
            "version": "3.0",
            "screen": "BASIC_INFO",
            "action": "data_exchange",
            "flow_token": "abc",
            "data": {"email": "a@b.c"},
            "something_new": true
        }))
        .unwrap();
        assert_eq!(req.screen.as_deref(), Some("BASIC_INFO"));
        assert_eq!(req.screen_action(), ScreenAction::DataExchange);
    }
}
