use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ProvisionError, Result};
use crate::network::SecurityMode;
use crate::validators::{self, MAX_PASSPHRASE_LEN, MAX_SSID_LEN};

/// A named-network identity as persisted by the credential store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    ssid: heapless::String<MAX_SSID_LEN>,
    #[serde(default)]
    passphrase: heapless::String<MAX_PASSPHRASE_LEN>,
    valid: bool,
}

impl Credentials {
    /// Build a record for a connect request. The result is marked valid.
    pub fn new(ssid: &str, passphrase: &str) -> Result<Self> {
        validators::validate_ssid(ssid)?;
        validators::validate_passphrase(passphrase)?;

        Ok(Self {
            ssid: ssid.try_into().map_err(|_| ProvisionError::InvalidArgument)?,
            passphrase: passphrase
                .try_into()
                .map_err(|_| ProvisionError::InvalidArgument)?,
            valid: true,
        })
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    /// A record with an empty SSID is never valid, whatever its flag says.
    pub fn is_valid(&self) -> bool {
        self.valid && !self.ssid.is_empty()
    }

    pub fn security(&self) -> SecurityMode {
        SecurityMode::for_passphrase(Some(self.passphrase()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid.as_str())
            .field(
                "passphrase",
                &if self.passphrase.is_empty() { "<empty>" } else { "<set>" },
            )
            .field("valid", &self.valid)
            .finish()
    }
}

/// Persistent key/value storage for the single credentials record.
pub trait CredentialStore {
    /// `Err(NotFound)` when nothing has been saved.
    fn load(&self) -> Result<Credentials>;
    fn save(&mut self, credentials: &Credentials) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

/// RAM-backed store for the host build and tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    record: Option<Credentials>,
    fail_saves: bool,
    fail_loads: bool,
    saves: usize,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: Credentials) -> Self {
        Self {
            record: Some(record),
            ..Self::default()
        }
    }

    /// Make every subsequent `save` fail with `StorageFault`.
    pub fn fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }

    /// Make every subsequent `load` fail with `StorageFault`.
    pub fn fail_loads(&mut self, fail: bool) {
        self.fail_loads = fail;
    }

    pub fn record(&self) -> Option<&Credentials> {
        self.record.as_ref()
    }

    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Credentials> {
        if self.fail_loads {
            log::error!("Failed to read WiFi credentials");
            return Err(ProvisionError::StorageFault);
        }
        self.record.clone().ok_or(ProvisionError::NotFound)
    }

    fn save(&mut self, credentials: &Credentials) -> Result<()> {
        if self.fail_saves {
            log::error!("Failed to save WiFi credentials");
            return Err(ProvisionError::StorageFault);
        }
        self.record = Some(credentials.clone());
        self.saves += 1;
        log::info!("WiFi credentials saved");
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.record = None;
        log::info!("WiFi credentials cleared");
        Ok(())
    }
}
