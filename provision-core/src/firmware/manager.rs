// Firmware Update Manager - stages an image into the inactive slot and hands it to the bootloader

use sha2::{Digest, Sha256};

use super::slot::{BootControl, SlotWriter};
use crate::config::PROGRESS_LOG_INTERVAL;
use crate::error::{ProvisionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    Updating,
}

/// Read-only snapshot returned by [`FirmwareUpdateManager::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateStatus {
    pub state: UpdateState,
    pub bytes_written: usize,
}

/// Result of a successful `finish`: what was handed to the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedImage {
    pub size: usize,
    pub sha256: [u8; 32],
}

impl StagedImage {
    pub fn sha256_hex(&self) -> String {
        self.sha256.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

pub struct FirmwareUpdateManager<W, B> {
    slot: W,
    boot: B,
    state: UpdateState,
    bytes_written: usize,
    slot_capacity: usize,
    digest: Sha256,
    last_staged: Option<StagedImage>,
}

impl<W: SlotWriter, B: BootControl> FirmwareUpdateManager<W, B> {
    pub fn new(slot: W, boot: B) -> Self {
        let slot_capacity = slot.capacity();
        log::info!("Update manager initialized, slot capacity {} bytes", slot_capacity);

        Self {
            slot,
            boot,
            state: UpdateState::Idle,
            bytes_written: 0,
            slot_capacity,
            digest: Sha256::new(),
            last_staged: None,
        }
    }

    /// Erase the whole inactive slot and open a session.
    ///
    /// An erase failure leaves the manager `Idle` so `start` can be retried.
    pub fn start(&mut self) -> Result<()> {
        if self.state == UpdateState::Updating {
            log::warn!("Update already in progress");
            return Err(ProvisionError::AlreadyInProgress);
        }

        let capacity = self.slot.capacity();
        if let Err(e) = self.slot.erase(0, capacity) {
            log::error!("Failed to erase update slot: {}", e);
            return Err(ProvisionError::StorageFault);
        }

        self.slot_capacity = capacity;
        self.bytes_written = 0;
        self.digest = Sha256::new();
        self.state = UpdateState::Updating;

        log::info!("Update started, {} bytes available", capacity);
        Ok(())
    }

    /// Append `data` at the current offset.
    ///
    /// A chunk that does not fit is rejected whole and the session stays open.
    /// A flash failure closes the session; the caller must `start` again.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.state != UpdateState::Updating {
            log::error!("No update in progress");
            return Err(ProvisionError::NotInProgress);
        }

        let end = self
            .bytes_written
            .checked_add(data.len())
            .filter(|end| *end <= self.slot_capacity)
            .ok_or_else(|| {
                log::error!(
                    "Data too large for update slot: {} + {} > {}",
                    self.bytes_written,
                    data.len(),
                    self.slot_capacity
                );
                ProvisionError::CapacityExceeded
            })?;

        if data.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.slot.write(self.bytes_written, data) {
            log::error!(
                "Failed to write {} bytes at offset {}: {}",
                data.len(),
                self.bytes_written,
                e
            );
            self.state = UpdateState::Idle;
            return Err(ProvisionError::StorageFault);
        }

        self.digest.update(data);
        let previous = self.bytes_written;
        self.bytes_written = end;

        if previous / PROGRESS_LOG_INTERVAL != end / PROGRESS_LOG_INTERVAL {
            log::info!("Written {} bytes", end);
        }

        Ok(())
    }

    /// Close the session and request a test boot of the staged image.
    pub fn finish(&mut self) -> Result<StagedImage> {
        if self.state != UpdateState::Updating {
            log::error!("No update in progress");
            return Err(ProvisionError::NotInProgress);
        }

        self.state = UpdateState::Idle;

        if self.bytes_written == 0 {
            log::error!("No data written");
            return Err(ProvisionError::EmptyImage);
        }

        let digest = std::mem::replace(&mut self.digest, Sha256::new());
        let staged = StagedImage {
            size: self.bytes_written,
            sha256: digest.finalize().into(),
        };

        if let Err(e) = self.boot.request_test_boot() {
            log::error!("Failed to request test boot: {}", e);
            return Err(ProvisionError::StorageFault);
        }

        log::info!(
            "Update finished, {} bytes written, sha256 {}",
            staged.size,
            staged.sha256_hex()
        );
        self.last_staged = Some(staged);
        Ok(staged)
    }

    /// Drop the open session without touching the bootloader.
    ///
    /// The slot keeps whatever was written; the next `start` erases it.
    pub fn abort(&mut self) -> Result<()> {
        if self.state != UpdateState::Updating {
            return Err(ProvisionError::NotInProgress);
        }

        self.state = UpdateState::Idle;
        log::warn!("Update aborted after {} bytes", self.bytes_written);
        Ok(())
    }

    pub fn status(&self) -> UpdateStatus {
        UpdateStatus {
            state: self.state,
            bytes_written: self.bytes_written,
        }
    }

    pub fn is_updating(&self) -> bool {
        self.state == UpdateState::Updating
    }

    pub fn slot_capacity(&self) -> usize {
        self.slot_capacity
    }

    pub fn last_staged(&self) -> Option<StagedImage> {
        self.last_staged
    }

    /// Make the running image permanent after a healthy boot.
    pub fn confirm_running_image(&mut self) -> Result<()> {
        self.boot.confirm_running_image().map_err(|e| {
            log::error!("Failed to confirm running image: {}", e);
            ProvisionError::StorageFault
        })
    }

    pub fn slot(&self) -> &W {
        &self.slot
    }

    pub fn slot_mut(&mut self) -> &mut W {
        &mut self.slot
    }

    pub fn boot(&self) -> &B {
        &self.boot
    }

    pub fn boot_mut(&mut self) -> &mut B {
        &mut self.boot
    }
}
