//! Flow token encode/decode.
//!
//! The Flow HTTP endpoint is stateless; the only way to know which user a
//! screen submission belongs to is the token we issued when launching the
//! Flow. It is a reversible base64 wrapper around the phone number, not a
//! credential.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::warn;

const TOKEN_PREFIX: &str = "onboarding_flow";

pub fn encode_phone_number(phone_number: &str) -> String {
    BASE64.encode(format!("{}:{}", TOKEN_PREFIX, phone_number))
}

pub fn extract_phone_number(flow_token: Option<&str>) -> Option<String> {
    let token = flow_token?;

    let decoded = match BASE64.decode(token) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Flow token is not valid base64: {}", e);
            return None;
        }
    };
    let decoded = match String::from_utf8(decoded) {
        Ok(text) => text,
        Err(_) => {
            warn!("Flow token is not valid UTF-8");
            return None;
        }
    };

    match decoded.split_once(':') {
        Some((TOKEN_PREFIX, phone)) if !phone.is_empty() => Some(phone.to_string()),
        _ => None,
    }
}
