//! Wire types shared by the device HTTP server and the host CLI.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, Result};
use crate::firmware::{StagedImage, UpdateState, UpdateStatus};

pub mod routes {
    pub const INDEX: &str = "/";
    pub const WIFI_STATUS: &str = "/api/wifi/status";
    pub const WIFI_CONNECT: &str = "/api/wifi/connect";
    pub const WIFI_SCAN: &str = "/api/wifi/scan";
    pub const WIFI_DISCONNECT: &str = "/api/wifi/disconnect";
    pub const WIFI_FORGET: &str = "/api/wifi/forget";
    pub const WIFI_AP_START: &str = "/api/wifi/ap/start";
    pub const WIFI_AP_STOP: &str = "/api/wifi/ap/stop";
    pub const OTA_UPLOAD: &str = "/api/ota/upload";
    pub const OTA_STATUS: &str = "/api/ota/status";
    pub const OTA_ABORT: &str = "/api/ota/abort";
    pub const SYSTEM_INFO: &str = "/api/system/info";
    pub const SYSTEM_REBOOT: &str = "/api/system/reboot";

    pub const API: &[&str] = &[
        WIFI_STATUS,
        WIFI_CONNECT,
        WIFI_SCAN,
        WIFI_DISCONNECT,
        WIFI_FORGET,
        WIFI_AP_START,
        WIFI_AP_STOP,
        OTA_UPLOAD,
        OTA_STATUS,
        OTA_ABORT,
        SYSTEM_INFO,
        SYSTEM_REBOOT,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiConnectRequest {
    pub ssid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Body of every mutating route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
        }
    }

    pub fn failure(error: ProvisionError, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error.as_str().to_string()),
        }
    }

    pub fn staged(image: &StagedImage) -> Self {
        Self::ok(format!(
            "Update staged: {} bytes, sha256 {}. Restarting...",
            image.size,
            image.sha256_hex()
        ))
    }
}

pub fn http_status(error: ProvisionError) -> u16 {
    match error {
        ProvisionError::AlreadyInProgress | ProvisionError::NotInProgress => 409,
        ProvisionError::CapacityExceeded => 413,
        ProvisionError::EmptyImage | ProvisionError::InvalidArgument => 400,
        ProvisionError::NotFound => 404,
        ProvisionError::DeviceUnavailable => 503,
        ProvisionError::StorageFault => 500,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OtaStatusBody {
    Ready,
    Updating { bytes_written: usize },
    /// The device has no inactive firmware slot.
    Unavailable,
}

impl From<UpdateStatus> for OtaStatusBody {
    fn from(status: UpdateStatus) -> Self {
        match status.state {
            UpdateState::Idle => OtaStatusBody::Ready,
            UpdateState::Updating => OtaStatusBody::Updating {
                bytes_written: status.bytes_written,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub version: String,
    pub uptime_seconds: u64,
    pub free_heap: u32,
    pub running_partition: String,
    pub reset_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_slot_size: Option<usize>,
}

/// Decode a JSON request body no larger than `max_len` bytes.
pub fn parse_json_body<T: DeserializeOwned>(body: &[u8], max_len: usize) -> Result<T> {
    if body.len() > max_len {
        log::warn!("Request body too large: {} > {}", body.len(), max_len);
        return Err(ProvisionError::InvalidArgument);
    }
    serde_json::from_slice(body).map_err(|e| {
        log::warn!("Malformed request body: {}", e);
        ProvisionError::InvalidArgument
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_request_password_optional() {
        let req: WifiConnectRequest = parse_json_body(br#"{"ssid":"Home"}"#, 512).unwrap();
        assert_eq!(req.ssid, "Home");
        assert_eq!(req.password, None);

        let req: WifiConnectRequest =
            parse_json_body(br#"{"ssid":"Home","password":"secret123"}"#, 512).unwrap();
        assert_eq!(req.password.as_deref(), Some("secret123"));
    }

    #[test]
    fn test_body_limits() {
        let body = format!(r#"{{"ssid":"{}"}}"#, "a".repeat(600));
        assert_eq!(
            parse_json_body::<WifiConnectRequest>(body.as_bytes(), 512),
            Err(ProvisionError::InvalidArgument)
        );
        assert_eq!(
            parse_json_body::<WifiConnectRequest>(b"{not json", 512),
            Err(ProvisionError::InvalidArgument)
        );
    }

    #[test]
    fn test_response_shapes() {
        let ok = serde_json::to_string(&ApiResponse::ok("Connecting")).unwrap();
        assert_eq!(ok, r#"{"success":true,"message":"Connecting"}"#);

        let err = serde_json::to_value(ApiResponse::failure(
            ProvisionError::CapacityExceeded,
            "too big",
        ))
        .unwrap();
        assert_eq!(err["success"], false);
        assert_eq!(err["error"], "CAPACITY_EXCEEDED");
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(http_status(ProvisionError::AlreadyInProgress), 409);
        assert_eq!(http_status(ProvisionError::CapacityExceeded), 413);
        assert_eq!(http_status(ProvisionError::EmptyImage), 400);
        assert_eq!(http_status(ProvisionError::DeviceUnavailable), 503);
        assert_eq!(http_status(ProvisionError::StorageFault), 500);
    }

    #[test]
    fn test_ota_status_wire_format() {
        let idle = OtaStatusBody::from(UpdateStatus {
            state: UpdateState::Idle,
            bytes_written: 12,
        });
        assert_eq!(serde_json::to_string(&idle).unwrap(), r#"{"status":"ready"}"#);

        let busy = OtaStatusBody::from(UpdateStatus {
            state: UpdateState::Updating,
            bytes_written: 8192,
        });
        assert_eq!(
            serde_json::to_string(&busy).unwrap(),
            r#"{"status":"updating","bytes_written":8192}"#
        );
    }

    #[test]
    fn test_routes_are_unique() {
        let mut seen = std::collections::HashSet::new();
        assert!(routes::API.iter().all(|r| seen.insert(*r)));
    }
}
