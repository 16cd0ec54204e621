use anyhow::Result;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    nvs::EspDefaultNvsPartition,
    wifi::{
        config::ScanConfig, AccessPointConfiguration, AuthMethod, ClientConfiguration,
        Configuration, EspWifi,
    },
};
use provision_core::config::AccessPointConfig;
use provision_core::{ProvisionError, Radio, SecurityMode, StationConfig};

/// Non-blocking radio requests over `EspWifi`. Outcomes arrive through the
/// event forwarder, never as return values.
pub struct EspWifiRadio {
    wifi: EspWifi<'static>,
    station: Option<ClientConfiguration>,
    access_point: Option<AccessPointConfiguration>,
}

fn driver_error(what: &str, e: impl core::fmt::Display) -> ProvisionError {
    log::error!("WiFi {} failed: {}", what, e);
    ProvisionError::DeviceUnavailable
}

impl EspWifiRadio {
    pub fn new(
        modem: Modem,
        sys_loop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> Result<Self> {
        let wifi = EspWifi::new(modem, sys_loop, Some(nvs))?;
        log::info!("WiFi driver initialized");

        Ok(Self {
            wifi,
            station: None,
            access_point: None,
        })
    }

    fn apply(&mut self) -> provision_core::Result<()> {
        let config = match (&self.station, &self.access_point) {
            (Some(sta), Some(ap)) => Configuration::Mixed(sta.clone(), ap.clone()),
            (Some(sta), None) => Configuration::Client(sta.clone()),
            (None, Some(ap)) => Configuration::AccessPoint(ap.clone()),
            (None, None) => {
                if self.wifi.is_started().unwrap_or(false) {
                    self.wifi.stop().map_err(|e| driver_error("stop", e))?;
                }
                return Ok(());
            }
        };

        self.wifi
            .set_configuration(&config)
            .map_err(|e| driver_error("configuration", e))?;

        if !self.wifi.is_started().map_err(|e| driver_error("state query", e))? {
            self.wifi.start().map_err(|e| driver_error("start", e))?;
        }
        Ok(())
    }
}

impl Radio for EspWifiRadio {
    fn request_connect(&mut self, config: &StationConfig) -> provision_core::Result<()> {
        let client = ClientConfiguration {
            ssid: config
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| ProvisionError::InvalidArgument)?,
            password: config
                .passphrase
                .as_str()
                .try_into()
                .map_err(|_| ProvisionError::InvalidArgument)?,
            auth_method: match config.security {
                SecurityMode::Open => AuthMethod::None,
                SecurityMode::PreSharedKey => AuthMethod::WPA2Personal,
            },
            ..Default::default()
        };

        // Joining a network replaces the provisioning AP
        let previous_station = self.station.replace(client);
        let previous_access_point = self.access_point.take();

        let result = self
            .apply()
            .and_then(|()| self.wifi.connect().map_err(|e| driver_error("connect", e)));
        if result.is_err() {
            // Put the radio back the way the manager still believes it is
            self.station = previous_station;
            self.access_point = previous_access_point;
            if let Err(e) = self.apply() {
                log::error!("Failed to restore WiFi configuration: {}", e);
            }
        }
        result
    }

    fn request_disconnect(&mut self) -> provision_core::Result<()> {
        self.wifi
            .disconnect()
            .map_err(|e| driver_error("disconnect", e))
    }

    fn enable_access_point(&mut self, config: &AccessPointConfig) -> provision_core::Result<()> {
        let ap = AccessPointConfiguration {
            ssid: config
                .ssid()
                .try_into()
                .map_err(|_| ProvisionError::InvalidArgument)?,
            password: config
                .passphrase()
                .try_into()
                .map_err(|_| ProvisionError::InvalidArgument)?,
            auth_method: AuthMethod::WPA2Personal,
            channel: config.channel(),
            ..Default::default()
        };

        // Idle station side keeps scanning available while provisioning
        self.station = Some(ClientConfiguration::default());
        self.access_point = Some(ap);
        self.apply()
    }

    fn disable_access_point(&mut self) -> provision_core::Result<()> {
        self.access_point = None;
        self.apply()
    }

    fn request_scan(&mut self) -> provision_core::Result<()> {
        self.wifi
            .start_scan(&ScanConfig::default(), false)
            .map_err(|e| driver_error("scan", e))
    }
}
