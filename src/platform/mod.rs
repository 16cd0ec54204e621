// ESP-IDF implementations of the collaborator contracts

pub mod events;
pub mod nvs_store;
pub mod ota_slot;
pub mod system;
pub mod wifi_radio;

use provision_core::{ConnectionManager, FirmwareUpdateManager};

pub use nvs_store::NvsCredentialStore;
pub use ota_slot::{OtaBootControl, PartitionSlot};
pub use wifi_radio::EspWifiRadio;

pub type DeviceConnection = ConnectionManager<EspWifiRadio, NvsCredentialStore>;
pub type DeviceUpdater = FirmwareUpdateManager<PartitionSlot, OtaBootControl>;
