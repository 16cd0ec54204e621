use anyhow::Result;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use provision_core::config::DeviceConfig;
use provision_core::{CredentialStore, Credentials, ProvisionError};

use crate::config::{CREDENTIALS_KEY, DEVICE_CONFIG_KEY, NVS_NAMESPACE};

// Fits the JSON form of the largest credentials record
const RECORD_BUF_LEN: usize = 512;

pub struct NvsCredentialStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsCredentialStore {
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)?;
        Ok(Self { nvs })
    }

    /// Device settings stored next to the credentials, or defaults.
    pub fn load_device_config(&self) -> DeviceConfig {
        let mut buf = [0u8; RECORD_BUF_LEN];
        match self.nvs.get_blob(DEVICE_CONFIG_KEY, &mut buf) {
            Ok(Some(data)) => match serde_json::from_slice(data) {
                Ok(config) => {
                    log::info!("Loaded device configuration from NVS");
                    config
                }
                Err(e) => {
                    log::warn!("Stored device configuration unreadable: {}", e);
                    DeviceConfig::default()
                }
            },
            Ok(None) => DeviceConfig::default(),
            Err(e) => {
                log::warn!("Failed to read device configuration: {}", e);
                DeviceConfig::default()
            }
        }
    }
}

impl CredentialStore for NvsCredentialStore {
    fn load(&self) -> provision_core::Result<Credentials> {
        let mut buf = [0u8; RECORD_BUF_LEN];
        match self.nvs.get_blob(CREDENTIALS_KEY, &mut buf) {
            Ok(Some(data)) => serde_json::from_slice(data).map_err(|e| {
                log::warn!("Stored credentials unreadable: {}", e);
                ProvisionError::StorageFault
            }),
            Ok(None) => Err(ProvisionError::NotFound),
            Err(e) => {
                log::error!("NVS read of {} failed: {}", CREDENTIALS_KEY, e);
                Err(ProvisionError::StorageFault)
            }
        }
    }

    fn save(&mut self, credentials: &Credentials) -> provision_core::Result<()> {
        let data = serde_json::to_vec(credentials).map_err(|e| {
            log::error!("Failed to encode credentials: {}", e);
            ProvisionError::StorageFault
        })?;
        self.nvs.set_blob(CREDENTIALS_KEY, &data).map_err(|e| {
            log::error!("NVS write of {} failed: {}", CREDENTIALS_KEY, e);
            ProvisionError::StorageFault
        })?;
        log::info!("WiFi credentials saved for {}", credentials.ssid());
        Ok(())
    }

    fn clear(&mut self) -> provision_core::Result<()> {
        match self.nvs.remove(CREDENTIALS_KEY) {
            Ok(true) => log::info!("WiFi credentials cleared"),
            Ok(false) => log::info!("No WiFi credentials to clear"),
            Err(e) => {
                log::error!("NVS remove of {} failed: {}", CREDENTIALS_KEY, e);
                return Err(ProvisionError::StorageFault);
            }
        }
        Ok(())
    }
}
