// Firmware update module

pub mod manager;
pub mod slot;

pub use manager::{FirmwareUpdateManager, StagedImage, UpdateState, UpdateStatus};
pub use slot::{BootControl, MemoryBootControl, MemorySlot, SlotWriter};

// Update flow:
// 1. start: erase the whole inactive slot
// 2. write: append chunks in arrival order, bounds-checked against slot capacity
// 3. finish: hand the staged image to the bootloader for a one-shot test boot
// 4. restart (caller's job); the bootloader verifies and either keeps or rolls back
// 5. confirm_running_image after a healthy boot makes the new image permanent
