//! DTO definitions used by the admin REST API and documentation layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dao::models::AppId,
    dto::{
        snapshot::AdminSnapshot,
        validation::{validate_address, validate_addresses},
    },
};

/// Ban request targeting either one address or a batch.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BanRequest {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub ips: Option<Vec<String>>,
}

impl BanRequest {
    /// Addresses to ban, preferring the batch form when both are present.
    pub fn targets(self) -> Vec<String> {
        match (self.ips, self.ip) {
            (Some(ips), _) => ips,
            (None, Some(ip)) => vec![ip],
            (None, None) => Vec::new(),
        }
    }
}

impl Validate for BanRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        match (&self.ip, &self.ips) {
            (None, None) => {
                let mut err = ValidationError::new("missing_target");
                err.message = Some("either `ip` or `ips` is required".into());
                errors.add("ip", err);
            }
            (_, Some(ips)) => {
                if let Err(e) = validate_addresses(ips) {
                    errors.add("ips", e);
                }
            }
            (Some(ip), None) => {
                if let Err(e) = validate_address(ip) {
                    errors.add("ip", e);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Request naming a single address.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AddressRequest {
    #[validate(custom(function = "validate_address"))]
    pub ip: String,
}

/// Request naming a client serial.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SerialRequest {
    #[validate(length(min = 1, max = 128))]
    pub serial: String,
}

/// Request naming an application.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AppIdRequest {
    #[schema(value_type = String)]
    pub app_id: AppId,
}

/// Request adding an application to the library.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddGameRequest {
    #[schema(value_type = String)]
    pub app_id: AppId,
    /// Defaults to 1 when omitted.
    #[serde(default)]
    #[validate(range(max = 1))]
    pub mode: Option<u8>,
}

/// Generic action acknowledgement used by admin endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub ok: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }
}

/// Dashboard state returned to administrators.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminStateResponse {
    pub ok: bool,
    #[schema(value_type = AdminSnapshot)]
    pub state: Arc<AdminSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ban_request_requires_a_target() {
        let request: BanRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn ban_request_prefers_batch() {
        let request: BanRequest = serde_json::from_value(serde_json::json!({
            "ip": "9.9.9.9",
            "ips": ["1.2.3.4", "5.6.7.8"]
        }))
        .unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.targets(), vec!["1.2.3.4", "5.6.7.8"]);
    }

    #[test]
    fn add_game_rejects_unknown_modes() {
        let request: AddGameRequest =
            serde_json::from_value(serde_json::json!({"appId": "10", "mode": 3})).unwrap();
        assert!(request.validate().is_err());
    }
}
