/// Configuration structures that can be tested independently
use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, Result};
use crate::validators::{self, MAX_PASSPHRASE_LEN, MAX_SSID_LEN};

/// Provisioning access point identity. Fixed at build time, never changed at runtime.
pub const PROVISIONING_AP_SSID: &str = "ESP32-Config";
pub const PROVISIONING_AP_PASSPHRASE: &str = "12345678";
pub const PROVISIONING_AP_CHANNEL: u8 = 6;

/// Log update progress each time the written total crosses a multiple of this.
pub const PROGRESS_LOG_INTERVAL: usize = 4096;

/// WPA2 refuses shorter pre-shared keys.
const MIN_AP_PASSPHRASE_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPointConfig {
    ssid: heapless::String<MAX_SSID_LEN>,
    passphrase: heapless::String<MAX_PASSPHRASE_LEN>,
    channel: u8,
}

impl AccessPointConfig {
    pub fn new(ssid: &str, passphrase: &str, channel: u8) -> Result<Self> {
        validators::validate_ssid(ssid)?;
        validators::validate_passphrase(passphrase)?;
        if passphrase.len() < MIN_AP_PASSPHRASE_LEN {
            log::warn!(
                "Access point passphrase must be at least {} bytes",
                MIN_AP_PASSPHRASE_LEN
            );
            return Err(ProvisionError::InvalidArgument);
        }
        if !(1..=13).contains(&channel) {
            log::warn!("Access point channel {} outside 1..=13", channel);
            return Err(ProvisionError::InvalidArgument);
        }

        Ok(Self {
            ssid: ssid.try_into().map_err(|_| ProvisionError::InvalidArgument)?,
            passphrase: passphrase
                .try_into()
                .map_err(|_| ProvisionError::InvalidArgument)?,
            channel,
        })
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }
}

impl Default for AccessPointConfig {
    fn default() -> Self {
        Self {
            ssid: heapless::String::try_from(PROVISIONING_AP_SSID).unwrap_or_default(),
            passphrase: heapless::String::try_from(PROVISIONING_AP_PASSPHRASE).unwrap_or_default(),
            channel: PROVISIONING_AP_CHANNEL,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    pub http_port: u16,
    /// Buffer size used when streaming an upload into the update slot.
    pub upload_chunk_size: usize,
    pub max_json_body: usize,
    /// Delay between answering a request and restarting the device.
    pub restart_delay_ms: u32,
    pub log_level: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            http_port: 80,
            upload_chunk_size: 4096,
            max_json_body: 512,
            restart_delay_ms: 1000,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_point_defaults() {
        let ap = AccessPointConfig::default();
        assert_eq!(ap.ssid(), "ESP32-Config");
        assert_eq!(ap.passphrase(), "12345678");
        assert_eq!(ap.channel(), 6);
    }

    #[test]
    fn test_default_identity_passes_validation() {
        let ap = AccessPointConfig::new(
            PROVISIONING_AP_SSID,
            PROVISIONING_AP_PASSPHRASE,
            PROVISIONING_AP_CHANNEL,
        )
        .unwrap();
        assert_eq!(ap, AccessPointConfig::default());
    }

    #[test]
    fn test_access_point_rejects_weak_identity() {
        assert!(AccessPointConfig::new("Setup", "short", 6).is_err());
        assert!(AccessPointConfig::new("", "12345678", 6).is_err());
        assert!(AccessPointConfig::new("Setup", "12345678", 0).is_err());
        assert!(AccessPointConfig::new("Setup", "12345678", 14).is_err());
    }

    #[test]
    fn test_device_config_serialization() {
        let config = DeviceConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: DeviceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
        assert_eq!(config.upload_chunk_size, PROGRESS_LOG_INTERVAL);
    }
}
