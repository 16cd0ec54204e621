//! Provision Core - Hardware-independent logic for the ESP32 provisioner
//!
//! This crate contains the firmware update and connection state machines,
//! the collaborator contracts they drive, and the wire types shared with the
//! HTTP layer. Everything here can be tested on the host platform without
//! requiring ESP32 hardware.

pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod firmware;
pub mod network;
pub mod validators;

#[cfg(test)]
mod tests;

pub use credentials::{CredentialStore, Credentials, MemoryCredentialStore};
pub use error::{ProvisionError, Result};
pub use firmware::{
    BootControl, FirmwareUpdateManager, MemoryBootControl, MemorySlot, SlotWriter, StagedImage,
    UpdateState, UpdateStatus,
};
pub use network::{
    ConnectionManager, ConnectionState, ConnectionStatus, NetworkEvent, Radio, SecurityMode,
    SimulatedRadio, StationConfig,
};
