use std::net::Ipv4Addr;
use std::sync::mpsc::Sender;

use super::events::NetworkEvent;
use crate::config::AccessPointConfig;
use crate::credentials::Credentials;
use crate::error::{ProvisionError, Result};
use crate::validators::{MAX_PASSPHRASE_LEN, MAX_SSID_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityMode {
    Open,
    PreSharedKey,
}

impl SecurityMode {
    /// A present, non-empty passphrase selects a pre-shared key; anything else is an open network.
    pub fn for_passphrase(passphrase: Option<&str>) -> Self {
        match passphrase {
            Some(p) if !p.is_empty() => SecurityMode::PreSharedKey,
            _ => SecurityMode::Open,
        }
    }
}

/// What the radio is asked to join.
#[derive(Clone, PartialEq, Eq)]
pub struct StationConfig {
    pub ssid: heapless::String<MAX_SSID_LEN>,
    pub passphrase: heapless::String<MAX_PASSPHRASE_LEN>,
    pub security: SecurityMode,
}

impl From<&Credentials> for StationConfig {
    fn from(creds: &Credentials) -> Self {
        let mut ssid = heapless::String::new();
        let mut passphrase = heapless::String::new();
        // Both fit: Credentials carries the same bounds.
        let _ = ssid.push_str(creds.ssid());
        let _ = passphrase.push_str(creds.passphrase());

        Self {
            ssid,
            passphrase,
            security: creds.security(),
        }
    }
}

impl std::fmt::Debug for StationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StationConfig")
            .field("ssid", &self.ssid.as_str())
            .field("security", &self.security)
            .finish()
    }
}

/// Requests the Connection Manager issues to the network interface.
///
/// Every call returns once the request is accepted. Outcomes arrive later as
/// [`NetworkEvent`]s.
pub trait Radio {
    fn request_connect(&mut self, config: &StationConfig) -> Result<()>;
    fn request_disconnect(&mut self) -> Result<()>;
    fn enable_access_point(&mut self, config: &AccessPointConfig) -> Result<()>;
    fn disable_access_point(&mut self) -> Result<()>;
    fn request_scan(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    Connect {
        ssid: String,
        security: SecurityMode,
        passphrase_len: usize,
    },
    Disconnect,
    EnableAccessPoint { ssid: String, channel: u8 },
    DisableAccessPoint,
    Scan,
}

/// Records requests instead of driving hardware.
///
/// When given an event sender it also plays the network stack's part and
/// reports association plus an address for every accepted connect.
#[derive(Debug, Default)]
pub struct SimulatedRadio {
    calls: Vec<RadioCall>,
    reject_connects: bool,
    auto_associate: Option<(Sender<NetworkEvent>, Ipv4Addr)>,
}

impl SimulatedRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_connects(&mut self, reject: bool) {
        self.reject_connects = reject;
    }

    pub fn auto_associate(&mut self, events: Sender<NetworkEvent>, address: Ipv4Addr) {
        self.auto_associate = Some((events, address));
    }

    pub fn calls(&self) -> &[RadioCall] {
        &self.calls
    }

    pub fn count(&self, call: &RadioCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }
}

impl Radio for SimulatedRadio {
    fn request_connect(&mut self, config: &StationConfig) -> Result<()> {
        if self.reject_connects {
            return Err(ProvisionError::DeviceUnavailable);
        }
        self.calls.push(RadioCall::Connect {
            ssid: config.ssid.to_string(),
            security: config.security,
            passphrase_len: config.passphrase.len(),
        });

        if let Some((events, address)) = &self.auto_associate {
            // The receiver may already be gone when the manager was dropped.
            let _ = events.send(NetworkEvent::ConnectSucceeded);
            let _ = events.send(NetworkEvent::AddressAssigned(*address));
        }
        Ok(())
    }

    fn request_disconnect(&mut self) -> Result<()> {
        self.calls.push(RadioCall::Disconnect);
        if let Some((events, _)) = &self.auto_associate {
            let _ = events.send(NetworkEvent::Disconnected { reason: 8 });
        }
        Ok(())
    }

    fn enable_access_point(&mut self, config: &AccessPointConfig) -> Result<()> {
        self.calls.push(RadioCall::EnableAccessPoint {
            ssid: config.ssid().to_string(),
            channel: config.channel(),
        });
        Ok(())
    }

    fn disable_access_point(&mut self) -> Result<()> {
        self.calls.push(RadioCall::DisableAccessPoint);
        Ok(())
    }

    fn request_scan(&mut self) -> Result<()> {
        self.calls.push(RadioCall::Scan);
        Ok(())
    }
}
