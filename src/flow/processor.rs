//! Flow request dispatch.
//!
//! Routes decrypted requests to the screen handlers. Health probes (empty
//! screen and empty data) short-circuit to an `active` acknowledgment
//! without touching any handler; unknown screens echo back unchanged.

use crate::flow::{
    screens::{FlowScreens, SCREEN_ADDITIONAL_INFO, SCREEN_BASIC_INFO},
    types::{FlowRequest, FlowResponse},
};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

#[derive(Clone)]
pub struct FlowScreenProcessor {
    screens: FlowScreens,
}

impl FlowScreenProcessor {
    pub fn new(screens: FlowScreens) -> Self {
        Self { screens }
    }

    #[instrument(skip(self, request), fields(screen = ?request.screen))]
    pub async fn process(&self, request: &FlowRequest) -> FlowResponse {
        info!("Processing Flow request");

        if is_health_check(request) {
            return health_check_response(request);
        }

        match request.screen.as_deref() {
            Some(SCREEN_BASIC_INFO) => self.screens.handle_basic_info(request).await,
            Some(SCREEN_ADDITIONAL_INFO) => self.screens.handle_additional_info(request).await,
            _ => {
                debug!("Unknown screen, echoing request");
                FlowResponse {
                    version: request.version_or_default(),
                    screen: request.screen.clone().unwrap_or_default(),
                    data: request.data.clone().unwrap_or_default(),
                }
            }
        }
    }
}

/// A health probe carries no screen and no data. Named screens are never
/// health checks, whatever else the request looks like.
fn is_health_check(request: &FlowRequest) -> bool {
    request.screen_is_empty() && request.data_is_empty()
}

fn health_check_response(request: &FlowRequest) -> FlowResponse {
    let mut data = Map::new();
    data.insert("status".into(), Value::String("active".into()));
    FlowResponse {
        version: request.version.clone().unwrap_or_else(|| "1.0".to_string()),
        screen: request.screen.clone().unwrap_or_default(),
        data,
    }
}
