// Host bring-up: the device boot sequence against in-memory collaborators

use anyhow::{bail, Context, Result};
use std::net::Ipv4Addr;

use provision_core::api::OtaStatusBody;
use provision_core::config::DeviceConfig;
use provision_core::{
    BootControl, ConnectionManager, FirmwareUpdateManager, MemoryBootControl,
    MemoryCredentialStore, MemorySlot, SimulatedRadio, SlotWriter, StagedImage,
};

use crate::{config, logging, version};

/// Matches the 1.5 MiB app slots of the default two-OTA partition table.
const HOST_SLOT_CAPACITY: usize = 0x18_0000;
const HOST_STATION_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 100);

pub fn run(firmware_path: Option<String>) -> Result<()> {
    let device_config = DeviceConfig::default();
    let level = logging::parse_level(&device_config.log_level).unwrap_or(log::LevelFilter::Info);
    logging::init_logger(level)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;
    log::info!("ESP32 Provisioner {} (host simulation)", version::full_version());

    let mut connection = ConnectionManager::new(
        Some(SimulatedRadio::new()),
        MemoryCredentialStore::new(),
        config::access_point_config(),
    );
    let events = connection.event_sender();
    if let Some(radio) = connection.radio_mut() {
        radio.auto_associate(events, HOST_STATION_ADDRESS);
    }

    if let Err(e) = connection.connect_with_saved() {
        log::error!("Boot connect failed: {}", e);
    }
    connection.poll_events();
    println!("wifi: {}", serde_json::to_string(&connection.status())?);

    let mut updates =
        FirmwareUpdateManager::new(MemorySlot::new(HOST_SLOT_CAPACITY), MemoryBootControl::new());
    updates.confirm_running_image()?;

    if let Some(path) = firmware_path {
        let image = std::fs::read(&path).with_context(|| format!("reading {}", path))?;
        let staged = stage_image(&mut updates, &image, device_config.upload_chunk_size)?;
        println!("staged {} bytes, sha256 {}", staged.size, staged.sha256_hex());
    }
    println!(
        "ota: {}",
        serde_json::to_string(&OtaStatusBody::from(updates.status()))?
    );

    Ok(())
}

/// Stream `image` through the update manager the way the upload route does.
pub fn stage_image<W: SlotWriter, B: BootControl>(
    updates: &mut FirmwareUpdateManager<W, B>,
    image: &[u8],
    chunk_size: usize,
) -> Result<StagedImage> {
    updates.start()?;

    for chunk in image.chunks(chunk_size.max(1)) {
        if let Err(e) = updates.write(chunk) {
            if updates.is_updating() {
                let _ = updates.abort();
            }
            bail!("image rejected after {} bytes: {}", updates.status().bytes_written, e);
        }
    }

    Ok(updates.finish()?)
}
