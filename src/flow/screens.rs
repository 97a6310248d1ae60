//! Flow screen handlers: the onboarding form state machine.
//!
//! `BASIC_INFO` → `ADDITIONAL_INFO` → `SUCCESS`. Validation failures stay
//! on the current screen with a field-keyed `errors` map merged into the
//! submitted data, so the client renders them inline. All failures for a
//! submission are collected in one pass, not first-error-only.

use crate::{
    errors::ServiceError,
    flow::{
        messaging::FlowMessaging,
        token,
        types::{FlowRequest, FlowResponse, ScreenAction},
    },
    repositories::NewUser,
    services::users::UserService,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};

pub const SCREEN_BASIC_INFO: &str = "BASIC_INFO";
pub const SCREEN_ADDITIONAL_INFO: &str = "ADDITIONAL_INFO";
pub const SCREEN_SUCCESS: &str = "SUCCESS";

/// Key for errors not attributable to a single field
const GENERAL_ERROR_KEY: &str = "_general";

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

#[derive(Clone)]
pub struct FlowScreens {
    user_service: UserService,
    messaging: FlowMessaging,
}

#[derive(Debug)]
struct BasicFields {
    business_name: String,
    contact_person: String,
    email: String,
}

impl FlowScreens {
    pub fn new(user_service: UserService, messaging: FlowMessaging) -> Self {
        Self {
            user_service,
            messaging,
        }
    }

    #[instrument(skip(self, request))]
    pub async fn handle_basic_info(&self, request: &FlowRequest) -> FlowResponse {
        let version = request.version_or_default();

        if request.screen_action() == ScreenAction::InitialLoad {
            // Idempotent re-entry: a phone that already onboarded jumps
            // straight to the terminal screen.
            if let Some(phone) = token::extract_phone_number(request.flow_token.as_deref()) {
                if self.user_service.check_user_exists(&phone).await {
                    info!(%phone, "Already onboarded, jumping to SUCCESS");
                    return FlowResponse::new(version, SCREEN_SUCCESS);
                }
            }
            debug!("Initial screen load, returning empty screen");
            return FlowResponse::new(version, SCREEN_BASIC_INFO);
        }

        if request.screen_action() == ScreenAction::DataExchange && request.data_is_empty() {
            warn!("data_exchange with empty data; form fields may not have been wired up");
        }

        let (fields, errors) = match self.validate_basic_fields(request).await {
            Ok(result) => result,
            Err(e) => {
                error!("Validation lookup failed: {}", e);
                return stay_with_general_error(
                    request,
                    version,
                    SCREEN_BASIC_INFO,
                    "Unable to verify your details right now. Please try again.",
                );
            }
        };

        if !errors.is_empty() {
            debug!(?errors, "Validation errors found");
            return stay_with_errors(request, version, SCREEN_BASIC_INFO, errors);
        }

        info!("Basic info validated, navigating to ADDITIONAL_INFO");
        let mut data = Map::new();
        data.insert("business_name".into(), Value::String(fields.business_name));
        data.insert("contact_person".into(), Value::String(fields.contact_person));
        data.insert("email".into(), Value::String(fields.email));
        FlowResponse::new(version, SCREEN_ADDITIONAL_INFO).with_data(data)
    }

    #[instrument(skip(self, request))]
    pub async fn handle_additional_info(&self, request: &FlowRequest) -> FlowResponse {
        let version = request.version_or_default();

        match request.screen_action() {
            // Initial load echoes whatever BASIC_INFO forwarded
            ScreenAction::InitialLoad | ScreenAction::Other => {
                debug!("Echoing ADDITIONAL_INFO screen");
                return FlowResponse::new(version, SCREEN_ADDITIONAL_INFO)
                    .with_data(request.data.clone().unwrap_or_default());
            }
            ScreenAction::DataExchange => {}
        }

        // Without identity the submission cannot proceed at all
        let Some(phone_number) = token::extract_phone_number(request.flow_token.as_deref())
        else {
            error!("Cannot extract phone number from flow token");
            return stay_with_general_error(
                request,
                version,
                SCREEN_ADDITIONAL_INFO,
                "Unable to identify user. Please try again.",
            );
        };

        let (fields, mut errors) = match self.validate_basic_fields(request).await {
            Ok(result) => result,
            Err(e) => {
                error!("Validation lookup failed: {}", e);
                return stay_with_general_error(
                    request,
                    version,
                    SCREEN_ADDITIONAL_INFO,
                    "Unable to verify your details right now. Please try again.",
                );
            }
        };

        let business_address = request.field("business_address");
        let nature_of_business = request.field("nature_of_business");
        let registration_number = request.field("registration_number");

        if business_address.is_empty() {
            errors.insert(
                "business_address".into(),
                Value::String("Business address is required".into()),
            );
        }
        if nature_of_business.is_empty() {
            errors.insert(
                "nature_of_business".into(),
                Value::String("Nature of business is required".into()),
            );
        }
        if registration_number.is_empty() {
            errors.insert(
                "registration_number".into(),
                Value::String("Registration number is required".into()),
            );
        }

        if !errors.is_empty() {
            debug!(?errors, "Validation errors found");
            return stay_with_errors(request, version, SCREEN_ADDITIONAL_INFO, errors);
        }

        info!(%phone_number, "All data validated, creating user");
        let created = self
            .user_service
            .create_user(NewUser {
                phone_number: phone_number.clone(),
                business_name: fields.business_name,
                contact_person: fields.contact_person,
                email: fields.email,
                address: Some(business_address),
                nature_of_business,
                registration_number,
            })
            .await;

        if let Err(e) = created {
            error!("Failed to create user: {}", e);
            return stay_with_general_error(
                request,
                version,
                SCREEN_ADDITIONAL_INFO,
                "An error occurred while saving your details. Please try again.",
            );
        }

        // The record exists; the congratulation messages are detached and
        // logged-only on failure.
        let messaging = self.messaging.clone();
        tokio::spawn(async move {
            messaging
                .send_onboarding_success_messages(&phone_number)
                .await;
        });

        FlowResponse::new(version, SCREEN_SUCCESS)
    }

    /// Validates the three BASIC_INFO fields, collecting every failure.
    /// The email uniqueness check hits the user store; its failure is the
    /// only hard error.
    async fn validate_basic_fields(
        &self,
        request: &FlowRequest,
    ) -> Result<(BasicFields, Map<String, Value>), ServiceError> {
        let mut errors = Map::new();

        let business_name = request.field("business_name");
        if business_name.is_empty() {
            errors.insert(
                "business_name".into(),
                Value::String("Business name is required".into()),
            );
        } else if business_name.chars().count() < 2 {
            errors.insert(
                "business_name".into(),
                Value::String("Business name must be at least 2 characters".into()),
            );
        }

        let contact_person = request.field("contact_person");
        if contact_person.is_empty() {
            errors.insert(
                "contact_person".into(),
                Value::String("Contact person name is required".into()),
            );
        } else if contact_person.chars().count() < 2 {
            errors.insert(
                "contact_person".into(),
                Value::String("Name must be at least 2 characters".into()),
            );
        }

        let email = request.field("email");
        if email.is_empty() {
            errors.insert(
                "email".into(),
                Value::String("Email address is required".into()),
            );
        } else if !EMAIL_REGEX.is_match(&email) {
            errors.insert(
                "email".into(),
                Value::String("Please enter a valid email address".into()),
            );
        } else if self.user_service.find_by_email(&email).await?.is_some() {
            errors.insert(
                "email".into(),
                Value::String("This email is already registered".into()),
            );
        }

        Ok((
            BasicFields {
                business_name,
                contact_person,
                email,
            },
            errors,
        ))
    }
}

/// Stays on the given screen, merging the error map into the submitted data.
fn stay_with_errors(
    request: &FlowRequest,
    version: String,
    screen: &str,
    errors: Map<String, Value>,
) -> FlowResponse {
    let mut data = request.data.clone().unwrap_or_default();
    data.insert("errors".into(), Value::Object(errors));
    FlowResponse::new(version, screen).with_data(data)
}

fn stay_with_general_error(
    request: &FlowRequest,
    version: String,
    screen: &str,
    message: &str,
) -> FlowResponse {
    let mut errors = Map::new();
    errors.insert(GENERAL_ERROR_KEY.into(), Value::String(message.into()));
    stay_with_errors(request, version, screen, errors)
}
