// NVS keys are only read by the device build
#![cfg_attr(not(target_os = "espidf"), allow(dead_code))]

use provision_core::config::{AccessPointConfig, PROVISIONING_AP_CHANNEL};

// NVS layout
pub const NVS_NAMESPACE: &str = "provision";
pub const CREDENTIALS_KEY: &str = "wifi_creds";
pub const DEVICE_CONFIG_KEY: &str = "device_cfg";

// Set by build.rs from ap_config.h, or the built-in defaults
const AP_SSID: &str = env!("PROVISION_AP_SSID");
const AP_PASSWORD: &str = env!("PROVISION_AP_PASSWORD");

/// Provisioning access point identity compiled into this firmware.
pub fn access_point_config() -> AccessPointConfig {
    match AccessPointConfig::new(AP_SSID, AP_PASSWORD, PROVISIONING_AP_CHANNEL) {
        Ok(ap) => ap,
        Err(e) => {
            log::warn!(
                "Build-time AP identity '{}' rejected ({}), using defaults",
                AP_SSID,
                e
            );
            AccessPointConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_time_identity_is_usable() {
        let ap = access_point_config();
        assert!(!ap.ssid().is_empty());
        assert!(ap.passphrase().len() >= 8);
        assert_eq!(ap.channel(), PROVISIONING_AP_CHANNEL);
    }

    #[test]
    fn test_nvs_keys_fit_idf_limit() {
        // NVS keys and namespaces are limited to 15 characters
        for key in [NVS_NAMESPACE, CREDENTIALS_KEY, DEVICE_CONFIG_KEY] {
            assert!(key.len() <= 15);
        }
    }
}
