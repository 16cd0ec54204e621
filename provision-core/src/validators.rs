use crate::error::{ProvisionError, Result};

pub const MAX_SSID_LEN: usize = 32;
pub const MAX_PASSPHRASE_LEN: usize = 64;

pub fn validate_ssid(ssid: &str) -> Result<()> {
    if ssid.is_empty() {
        log::warn!("WiFi SSID cannot be empty");
        return Err(ProvisionError::InvalidArgument);
    }
    if ssid.len() > MAX_SSID_LEN {
        log::warn!("WiFi SSID must be {} bytes or less", MAX_SSID_LEN);
        return Err(ProvisionError::InvalidArgument);
    }
    if ssid.chars().any(|c| c.is_control()) {
        log::warn!("WiFi SSID cannot contain control characters");
        return Err(ProvisionError::InvalidArgument);
    }
    Ok(())
}

/// An empty passphrase is allowed and means an open network.
pub fn validate_passphrase(passphrase: &str) -> Result<()> {
    if passphrase.len() > MAX_PASSPHRASE_LEN {
        log::warn!("WiFi passphrase must be {} bytes or less", MAX_PASSPHRASE_LEN);
        return Err(ProvisionError::InvalidArgument);
    }
    if passphrase.chars().any(|c| c.is_control()) {
        log::warn!("WiFi passphrase cannot contain control characters");
        return Err(ProvisionError::InvalidArgument);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ssid() {
        assert!(validate_ssid("MyNetwork").is_ok());
        assert!(validate_ssid(&"a".repeat(32)).is_ok());
        assert_eq!(validate_ssid(""), Err(ProvisionError::InvalidArgument));
        assert!(validate_ssid(&"a".repeat(33)).is_err());
        assert!(validate_ssid("Network\0").is_err());
    }

    #[test]
    fn test_ssid_limit_counts_bytes() {
        // 11 three-byte characters = 33 bytes
        assert!(validate_ssid(&"€".repeat(11)).is_err());
        assert!(validate_ssid(&"€".repeat(10)).is_ok());
    }

    #[test]
    fn test_validate_passphrase() {
        assert!(validate_passphrase("").is_ok());
        assert!(validate_passphrase("secret123").is_ok());
        assert!(validate_passphrase(&"p".repeat(64)).is_ok());
        assert!(validate_passphrase(&"p".repeat(65)).is_err());
        assert!(validate_passphrase("line\nbreak").is_err());
    }
}
