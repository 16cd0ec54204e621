// Connection Manager - station connect from saved credentials with provisioning AP fallback

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::mpsc::{self, Receiver, Sender};

use super::events::NetworkEvent;
use super::radio::{Radio, StationConfig};
use crate::config::AccessPointConfig;
use crate::credentials::{CredentialStore, Credentials};
use crate::error::{ProvisionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    AccessPointMode,
}

/// Summary handed to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connected {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ip: Option<Ipv4Addr>,
    },
    ApMode {
        ssid: String,
    },
}

pub struct ConnectionManager<R, S> {
    radio: Option<R>,
    store: S,
    access_point: AccessPointConfig,
    state: ConnectionState,
    ip: Option<Ipv4Addr>,
    events_tx: Sender<NetworkEvent>,
    events_rx: Receiver<NetworkEvent>,
}

impl<R: Radio, S: CredentialStore> ConnectionManager<R, S> {
    /// `radio` is `None` when the device has no usable network interface.
    pub fn new(radio: Option<R>, store: S, access_point: AccessPointConfig) -> Self {
        if radio.is_none() {
            log::error!("No network interface available");
        }
        let (events_tx, events_rx) = mpsc::channel();

        Self {
            radio,
            store,
            access_point,
            state: ConnectionState::Disconnected,
            ip: None,
            events_tx,
            events_rx,
        }
    }

    /// Request association with `ssid`.
    ///
    /// Returns once the radio accepted the request. The credentials are saved
    /// at that point, before association is confirmed.
    pub fn connect(&mut self, ssid: &str, passphrase: Option<&str>) -> Result<()> {
        self.poll_events();
        if ssid.is_empty() {
            log::warn!("Connect rejected: empty SSID");
            return Err(ProvisionError::InvalidArgument);
        }
        let radio = self.radio.as_mut().ok_or_else(|| {
            log::warn!("Connect rejected: no network interface");
            ProvisionError::InvalidArgument
        })?;

        let creds = Credentials::new(ssid, passphrase.unwrap_or(""))?;
        let config = StationConfig::from(&creds);

        log::info!("Connecting to WiFi SSID: {} ({:?})", ssid, config.security);
        radio.request_connect(&config).map_err(|e| {
            log::error!("Connect request for {} refused: {}", ssid, e);
            e
        })?;

        self.set_state(ConnectionState::Connecting);
        self.ip = None;

        self.store.save(&creds).map_err(|e| {
            log::error!("Failed to persist credentials for {}: {}", ssid, e);
            ProvisionError::StorageFault
        })
    }

    /// Boot entry point: join the saved network, or open the provisioning AP.
    pub fn connect_with_saved(&mut self) -> Result<()> {
        match self.store.load() {
            Ok(creds) if creds.is_valid() => {
                log::info!("Connecting with saved credentials");
                self.connect(creds.ssid(), Some(creds.passphrase()))
            }
            Ok(_) => {
                log::info!("Saved credentials are not valid, starting AP mode");
                self.start_access_point()
            }
            Err(ProvisionError::NotFound) => {
                log::info!("No saved credentials, starting AP mode");
                self.start_access_point()
            }
            Err(e) => {
                log::warn!("Could not load saved credentials ({}), starting AP mode", e);
                self.start_access_point()
            }
        }
    }

    pub fn start_access_point(&mut self) -> Result<()> {
        self.poll_events();
        let radio = self.radio.as_mut().ok_or(ProvisionError::DeviceUnavailable)?;

        log::info!(
            "Starting AP mode: {} (channel {})",
            self.access_point.ssid(),
            self.access_point.channel()
        );
        radio.enable_access_point(&self.access_point).map_err(|e| {
            log::error!("Failed to start access point: {}", e);
            e
        })?;

        self.ip = None;
        self.set_state(ConnectionState::AccessPointMode);
        Ok(())
    }

    pub fn stop_access_point(&mut self) -> Result<()> {
        self.poll_events();
        let radio = self.radio.as_mut().ok_or(ProvisionError::DeviceUnavailable)?;

        radio.disable_access_point().map_err(|e| {
            log::error!("Failed to stop access point: {}", e);
            e
        })?;

        if self.state == ConnectionState::AccessPointMode {
            self.set_state(ConnectionState::Disconnected);
        }
        log::info!("Access point stopped");
        Ok(())
    }

    /// Drop the station association. A no-op while the provisioning AP is up.
    pub fn disconnect(&mut self) -> Result<()> {
        self.poll_events();
        if self.radio.is_none() {
            return Err(ProvisionError::DeviceUnavailable);
        }

        if self.state == ConnectionState::AccessPointMode {
            log::debug!("Disconnect ignored in AP mode");
            return Ok(());
        }

        self.ip = None;
        self.set_state(ConnectionState::Disconnected);
        match self.radio.as_mut() {
            Some(radio) => radio.request_disconnect(),
            None => Err(ProvisionError::DeviceUnavailable),
        }
    }

    /// Fire-and-forget scan; results are not collected.
    pub fn scan(&mut self) -> Result<()> {
        let radio = self.radio.as_mut().ok_or(ProvisionError::DeviceUnavailable)?;
        log::info!("Starting WiFi scan");
        radio.request_scan()
    }

    pub fn forget_credentials(&mut self) -> Result<()> {
        self.store.clear()
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn ip_address(&self) -> Option<Ipv4Addr> {
        self.ip
    }

    pub fn status(&self) -> ConnectionStatus {
        match self.state {
            ConnectionState::AccessPointMode => ConnectionStatus::ApMode {
                ssid: self.access_point.ssid().to_string(),
            },
            ConnectionState::Connected => ConnectionStatus::Connected { ip: self.ip },
            ConnectionState::Connecting | ConnectionState::Disconnected => {
                ConnectionStatus::Disconnected
            }
        }
    }

    pub fn access_point(&self) -> &AccessPointConfig {
        &self.access_point
    }

    /// Sender for the platform's event forwarder.
    pub fn event_sender(&self) -> Sender<NetworkEvent> {
        self.events_tx.clone()
    }

    /// Apply every queued network event. Returns how many were taken off the queue.
    ///
    /// Requests drain the queue before they act, so an event reported before a
    /// request never overrides the state that request sets.
    pub fn poll_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            applied += 1;
        }
        applied
    }

    pub fn handle_event(&mut self, event: NetworkEvent) {
        if self.state == ConnectionState::AccessPointMode {
            log::debug!("Ignoring station event in AP mode: {:?}", event);
            return;
        }

        match event {
            NetworkEvent::ConnectSucceeded => {
                log::info!("WiFi associated");
                self.set_state(ConnectionState::Connected);
            }
            NetworkEvent::AddressAssigned(ip) => {
                log::info!("IP address assigned: {}", ip);
                self.ip = Some(ip);
                self.set_state(ConnectionState::Connected);
            }
            NetworkEvent::Disconnected { reason } => {
                if self.state != ConnectionState::Disconnected {
                    log::warn!("WiFi disconnected (reason {})", reason);
                }
                self.ip = None;
                self.set_state(ConnectionState::Disconnected);
            }
        }
    }

    pub fn radio(&self) -> Option<&R> {
        self.radio.as_ref()
    }

    pub fn radio_mut(&mut self) -> Option<&mut R> {
        self.radio.as_mut()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state != next {
            log::info!("Connection state: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::network::radio::{RadioCall, SecurityMode, SimulatedRadio};

    type Manager = ConnectionManager<SimulatedRadio, MemoryCredentialStore>;

    fn manager() -> Manager {
        ConnectionManager::new(
            Some(SimulatedRadio::new()),
            MemoryCredentialStore::new(),
            AccessPointConfig::default(),
        )
    }

    fn connect_calls(m: &Manager) -> Vec<RadioCall> {
        m.radio()
            .unwrap()
            .calls()
            .iter()
            .filter(|c| matches!(c, RadioCall::Connect { .. }))
            .cloned()
            .collect()
    }

    #[test]
    fn test_initial_state() {
        let m = manager();
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(!m.is_connected());
        assert_eq!(m.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_connect_persists_optimistically() {
        let mut m = manager();
        m.connect("Home", Some("secret123")).unwrap();

        assert_eq!(m.state(), ConnectionState::Connecting);
        assert!(!m.is_connected());
        let saved = m.store().record().unwrap();
        assert_eq!(saved.ssid(), "Home");
        assert_eq!(saved.passphrase(), "secret123");
        assert!(saved.is_valid());
    }

    #[test]
    fn test_security_follows_passphrase() {
        let mut m = manager();
        m.connect("Home", Some("")).unwrap();
        m.connect("Home", None).unwrap();
        m.connect("Home", Some("secret123")).unwrap();

        let securities: Vec<_> = connect_calls(&m)
            .into_iter()
            .map(|c| match c {
                RadioCall::Connect { security, .. } => security,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(
            securities,
            vec![SecurityMode::Open, SecurityMode::Open, SecurityMode::PreSharedKey]
        );
    }

    #[test]
    fn test_open_network_sends_no_key() {
        let mut m = manager();
        m.connect("Home", Some("")).unwrap();
        assert_eq!(
            connect_calls(&m),
            vec![RadioCall::Connect {
                ssid: "Home".to_string(),
                security: SecurityMode::Open,
                passphrase_len: 0,
            }]
        );
    }

    #[test]
    fn test_connect_without_radio() {
        let mut m: Manager =
            ConnectionManager::new(None, MemoryCredentialStore::new(), AccessPointConfig::default());
        assert_eq!(m.connect("Home", None), Err(ProvisionError::InvalidArgument));
        assert_eq!(m.start_access_point(), Err(ProvisionError::DeviceUnavailable));
        assert_eq!(m.stop_access_point(), Err(ProvisionError::DeviceUnavailable));
        assert_eq!(m.disconnect(), Err(ProvisionError::DeviceUnavailable));
        assert_eq!(m.scan(), Err(ProvisionError::DeviceUnavailable));
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.store().save_count(), 0);
    }

    #[test]
    fn test_refused_connect_saves_nothing() {
        let mut m = manager();
        m.radio_mut().unwrap().reject_connects(true);
        assert_eq!(
            m.connect("Home", Some("secret123")),
            Err(ProvisionError::DeviceUnavailable)
        );
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(m.store().record().is_none());
    }

    #[test]
    fn test_refused_connect_keeps_access_point() {
        let mut m = manager();
        m.start_access_point().unwrap();
        m.radio_mut().unwrap().reject_connects(true);

        assert_eq!(m.connect("Home", None), Err(ProvisionError::DeviceUnavailable));
        assert_eq!(m.state(), ConnectionState::AccessPointMode);
        assert!(matches!(m.status(), ConnectionStatus::ApMode { .. }));
        assert_eq!(m.radio().unwrap().count(&RadioCall::DisableAccessPoint), 0);
    }

    #[test]
    fn test_save_failure_reports_storage_fault() {
        let mut m = manager();
        m.store_mut().fail_saves(true);
        assert_eq!(m.connect("Home", None), Err(ProvisionError::StorageFault));
        assert_eq!(m.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_events_drive_state() {
        let mut m = manager();
        m.connect("Home", None).unwrap();

        let tx = m.event_sender();
        tx.send(NetworkEvent::ConnectSucceeded).unwrap();
        tx.send(NetworkEvent::AddressAssigned(Ipv4Addr::new(10, 0, 0, 7)))
            .unwrap();
        assert_eq!(m.poll_events(), 2);
        assert!(m.is_connected());
        assert_eq!(
            m.status(),
            ConnectionStatus::Connected {
                ip: Some(Ipv4Addr::new(10, 0, 0, 7))
            }
        );

        tx.send(NetworkEvent::Disconnected { reason: 201 }).unwrap();
        assert_eq!(m.poll_events(), 1);
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.ip_address(), None);
        assert_eq!(m.poll_events(), 0);
    }

    #[test]
    fn test_station_events_ignored_in_ap_mode() {
        let mut m = manager();
        m.start_access_point().unwrap();
        m.handle_event(NetworkEvent::ConnectSucceeded);
        m.handle_event(NetworkEvent::AddressAssigned(Ipv4Addr::new(10, 0, 0, 9)));
        m.handle_event(NetworkEvent::Disconnected { reason: 8 });
        assert_eq!(m.state(), ConnectionState::AccessPointMode);
        assert!(!m.is_connected());
        assert_eq!(m.ip_address(), None);
    }

    #[test]
    fn test_connect_with_invalid_saved_record_starts_ap() {
        let stored: Credentials =
            serde_json::from_str(r#"{"ssid":"Home","passphrase":"","valid":false}"#).unwrap();
        let mut m = ConnectionManager::new(
            Some(SimulatedRadio::new()),
            MemoryCredentialStore::with_record(stored),
            AccessPointConfig::default(),
        );
        m.connect_with_saved().unwrap();
        assert_eq!(m.state(), ConnectionState::AccessPointMode);
        assert!(connect_calls(&m).is_empty());
    }

    #[test]
    fn test_unreadable_saved_record_starts_ap() {
        let mut store = MemoryCredentialStore::with_record(Credentials::new("Home", "secret123").unwrap());
        store.fail_loads(true);
        let mut m = ConnectionManager::new(Some(SimulatedRadio::new()), store, AccessPointConfig::default());

        m.connect_with_saved().unwrap();
        assert_eq!(m.state(), ConnectionState::AccessPointMode);
        let radio = m.radio().unwrap();
        assert_eq!(
            radio.count(&RadioCall::EnableAccessPoint {
                ssid: AccessPointConfig::default().ssid().to_string(),
                channel: AccessPointConfig::default().channel(),
            }),
            1
        );
        assert!(connect_calls(&m).is_empty());
    }

    #[test]
    fn test_disconnect_not_undone_by_earlier_association() {
        let mut m = manager();
        m.connect("Home", None).unwrap();
        m.event_sender().send(NetworkEvent::ConnectSucceeded).unwrap();

        m.disconnect().unwrap();
        m.poll_events();
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(!m.is_connected());
    }

    #[test]
    fn test_connect_not_undone_by_earlier_disconnect() {
        let mut m = manager();
        m.event_sender()
            .send(NetworkEvent::Disconnected { reason: 8 })
            .unwrap();

        m.connect("Home", None).unwrap();
        m.poll_events();
        assert_eq!(m.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_access_point_not_undone_by_earlier_events() {
        let mut m = manager();
        m.connect("Home", None).unwrap();
        let tx = m.event_sender();
        tx.send(NetworkEvent::ConnectSucceeded).unwrap();

        m.start_access_point().unwrap();
        assert_eq!(m.poll_events(), 0);
        assert_eq!(m.state(), ConnectionState::AccessPointMode);

        tx.send(NetworkEvent::Disconnected { reason: 8 }).unwrap();
        m.stop_access_point().unwrap();
        assert_eq!(m.poll_events(), 0);
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connect_with_saved_uses_stored_pair() {
        let mut m = ConnectionManager::new(
            Some(SimulatedRadio::new()),
            MemoryCredentialStore::with_record(Credentials::new("Home", "secret123").unwrap()),
            AccessPointConfig::default(),
        );
        m.connect_with_saved().unwrap();
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert_eq!(
            connect_calls(&m),
            vec![RadioCall::Connect {
                ssid: "Home".to_string(),
                security: SecurityMode::PreSharedKey,
                passphrase_len: 9,
            }]
        );
    }

    #[test]
    fn test_stop_access_point() {
        let mut m = manager();
        m.start_access_point().unwrap();
        m.stop_access_point().unwrap();
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_disconnect_is_noop_in_ap_mode() {
        let mut m = manager();
        m.start_access_point().unwrap();
        m.disconnect().unwrap();
        assert_eq!(m.state(), ConnectionState::AccessPointMode);
        assert_eq!(m.radio().unwrap().count(&RadioCall::Disconnect), 0);
    }

    #[test]
    fn test_disconnect_marks_disconnected() {
        let mut m = manager();
        m.connect("Home", None).unwrap();
        m.handle_event(NetworkEvent::ConnectSucceeded);
        m.disconnect().unwrap();
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.radio().unwrap().count(&RadioCall::Disconnect), 1);
    }

    #[test]
    fn test_forget_credentials() {
        let mut m = manager();
        m.connect("Home", None).unwrap();
        m.forget_credentials().unwrap();
        assert!(m.store().record().is_none());
    }

    #[test]
    fn test_status_wire_format() {
        let json = |s: ConnectionStatus| serde_json::to_string(&s).unwrap();
        assert_eq!(json(ConnectionStatus::Disconnected), r#"{"status":"disconnected"}"#);
        assert_eq!(json(ConnectionStatus::Connected { ip: None }), r#"{"status":"connected"}"#);
        assert_eq!(
            json(ConnectionStatus::Connected {
                ip: Some(Ipv4Addr::new(192, 168, 4, 2))
            }),
            r#"{"status":"connected","ip":"192.168.4.2"}"#
        );
        assert_eq!(
            json(ConnectionStatus::ApMode {
                ssid: "ESP32-Config".to_string()
            }),
            r#"{"status":"ap_mode","ssid":"ESP32-Config"}"#
        );
    }
}
