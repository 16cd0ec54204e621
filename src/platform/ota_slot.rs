// Inactive OTA partition access using the raw ESP-IDF partition API

use core::ffi::{c_void, CStr};
use esp_idf_sys::{
    esp, esp_ota_get_next_update_partition, esp_ota_get_running_partition,
    esp_ota_mark_app_valid_cancel_rollback, esp_ota_set_boot_partition,
    esp_partition_erase_range, esp_partition_t, esp_partition_write,
};
use provision_core::{BootControl, ProvisionError, SlotWriter};

fn partition_label(partition: *const esp_partition_t) -> String {
    if partition.is_null() {
        return "unknown".to_string();
    }
    unsafe { CStr::from_ptr((*partition).label.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// Label of the partition the running image was loaded from.
pub fn running_partition_label() -> String {
    partition_label(unsafe { esp_ota_get_running_partition() })
}

pub struct PartitionSlot {
    partition: *const esp_partition_t,
}

// The partition table entry is static for the lifetime of the program.
unsafe impl Send for PartitionSlot {}

impl PartitionSlot {
    /// The OTA slot the next update goes into, if the partition table has one.
    pub fn next_update() -> Option<Self> {
        let partition = unsafe { esp_ota_get_next_update_partition(core::ptr::null()) };
        if partition.is_null() {
            log::warn!("No OTA update partition - running from factory layout?");
            return None;
        }

        let slot = Self { partition };
        log::info!(
            "Update slot: {} ({} bytes)",
            slot.label(),
            slot.capacity()
        );
        Some(slot)
    }

    pub fn label(&self) -> String {
        partition_label(self.partition)
    }

    pub fn boot_control(&self) -> OtaBootControl {
        OtaBootControl {
            partition: self.partition,
        }
    }
}

impl SlotWriter for PartitionSlot {
    fn capacity(&self) -> usize {
        unsafe { (*self.partition).size as usize }
    }

    fn erase(&mut self, offset: usize, len: usize) -> provision_core::Result<()> {
        esp!(unsafe { esp_partition_erase_range(self.partition, offset as _, len as _) }).map_err(
            |e| {
                log::error!("esp_partition_erase_range({}, {}) failed: {}", offset, len, e);
                ProvisionError::StorageFault
            },
        )
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> provision_core::Result<()> {
        esp!(unsafe {
            esp_partition_write(
                self.partition,
                offset as _,
                data.as_ptr() as *const c_void,
                data.len() as _,
            )
        })
        .map_err(|e| {
            log::error!("esp_partition_write at {} failed: {}", offset, e);
            ProvisionError::StorageFault
        })
    }
}

/// Bootloader handoff. With app rollback enabled the staged image boots once
/// in pending-verify state and is reverted unless confirmed.
pub struct OtaBootControl {
    partition: *const esp_partition_t,
}

unsafe impl Send for OtaBootControl {}

impl BootControl for OtaBootControl {
    fn request_test_boot(&mut self) -> provision_core::Result<()> {
        esp!(unsafe { esp_ota_set_boot_partition(self.partition) }).map_err(|e| {
            log::error!(
                "esp_ota_set_boot_partition({}) failed: {}",
                partition_label(self.partition),
                e
            );
            ProvisionError::StorageFault
        })?;
        log::info!("Next boot: {}", partition_label(self.partition));
        Ok(())
    }

    fn confirm_running_image(&mut self) -> provision_core::Result<()> {
        esp!(unsafe { esp_ota_mark_app_valid_cancel_rollback() }).map_err(|e| {
            log::error!("esp_ota_mark_app_valid_cancel_rollback failed: {}", e);
            ProvisionError::StorageFault
        })?;
        log::info!("Running image {} confirmed", running_partition_label());
        Ok(())
    }
}
