use anyhow::Result;

mod config;
mod logging;
mod version;

#[cfg(any(target_os = "espidf", test))]
mod templates;

#[cfg(target_os = "espidf")]
mod platform;
#[cfg(target_os = "espidf")]
mod web_server;

#[cfg(not(target_os = "espidf"))]
mod host;

// Generate ESP-IDF app descriptor
#[cfg(target_os = "espidf")]
#[allow(unexpected_cfgs)]
mod app_desc {
    esp_idf_sys::esp_app_desc!();
}

#[cfg(target_os = "espidf")]
fn main() -> Result<()> {
    use esp_idf_hal::delay::FreeRtos;
    use esp_idf_hal::prelude::*;
    use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs::EspDefaultNvsPartition};
    use provision_core::{ConnectionManager, FirmwareUpdateManager};
    use std::sync::{Arc, Mutex};

    use crate::platform::{
        events, system, EspWifiRadio, NvsCredentialStore, PartitionSlot,
    };

    // Initialize ESP-IDF
    esp_idf_svc::sys::link_patches();

    logging::init_logger(log::LevelFilter::Info)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;
    log::info!("ESP32 Provisioner {}", version::full_version());
    log::info!("Boot reason: {}", system::reset_reason());
    log::info!("Running from {}", platform::ota_slot::running_partition_label());

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let store = NvsCredentialStore::new(nvs.clone())?;
    let device_config = store.load_device_config();
    if !logging::set_max_level_from_str(&device_config.log_level) {
        log::warn!("Unknown log level '{}', keeping info", device_config.log_level);
    }

    let radio = match EspWifiRadio::new(peripherals.modem, sys_loop.clone(), nvs) {
        Ok(radio) => Some(radio),
        Err(e) => {
            log::error!("WiFi driver unavailable: {:?}", e);
            None
        }
    };

    let mut connection = ConnectionManager::new(radio, store, config::access_point_config());
    if let Err(e) = events::register_event_forwarding(connection.event_sender()) {
        log::error!("Network events will not be tracked: {:?}", e);
    }
    if let Err(e) = connection.connect_with_saved() {
        log::error!("Boot connect failed: {}", e);
    }
    let connection = Arc::new(Mutex::new(connection));

    let updates = PartitionSlot::next_update().map(|slot| {
        let boot = slot.boot_control();
        Arc::new(Mutex::new(FirmwareUpdateManager::new(slot, boot)))
    });

    let _server =
        web_server::ProvisionServer::new(connection.clone(), updates.clone(), &device_config)?;

    // The server is up, so this image is good enough to keep
    if let Some(updates) = &updates {
        match updates.lock() {
            Ok(mut manager) => {
                if let Err(e) = manager.confirm_running_image() {
                    log::warn!("Could not confirm running image: {}", e);
                }
            }
            Err(_) => log::error!("Update manager lock poisoned"),
        }
    }

    log::info!("Boot complete");

    loop {
        FreeRtos::delay_ms(1000);
        if let Ok(mut manager) = connection.lock() {
            manager.poll_events();
        }
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() -> Result<()> {
    host::run(std::env::args().nth(1))
}
