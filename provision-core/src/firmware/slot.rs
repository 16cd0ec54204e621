use crate::error::{ProvisionError, Result};

/// Erase/write access to the inactive, fixed-size firmware slot.
pub trait SlotWriter {
    fn capacity(&self) -> usize;
    fn erase(&mut self, offset: usize, len: usize) -> Result<()>;
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()>;
}

/// Bootloader handoff for a staged image.
pub trait BootControl {
    /// Mark the staged image for a one-shot test boot on the next reset.
    fn request_test_boot(&mut self) -> Result<()>;
    /// Keep the currently running image; cancels a pending rollback.
    fn confirm_running_image(&mut self) -> Result<()>;
}

const ERASED: u8 = 0xFF;

/// RAM-backed slot with fault injection, used by the host build and tests.
#[derive(Debug, Clone)]
pub struct MemorySlot {
    data: Vec<u8>,
    erase_count: usize,
    write_count: usize,
    fail_erase: bool,
    fail_write_after: Option<usize>,
}

impl MemorySlot {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![ERASED; capacity],
            erase_count: 0,
            write_count: 0,
            fail_erase: false,
            fail_write_after: None,
        }
    }

    /// Every erase fails until cleared.
    pub fn fail_erase(&mut self, fail: bool) {
        self.fail_erase = fail;
    }

    /// Allow `writes` more successful writes, then fail.
    pub fn fail_write_after(&mut self, writes: Option<usize>) {
        self.fail_write_after = writes;
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    pub fn erase_count(&self) -> usize {
        self.erase_count
    }

    pub fn write_count(&self) -> usize {
        self.write_count
    }
}

impl SlotWriter for MemorySlot {
    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn erase(&mut self, offset: usize, len: usize) -> Result<()> {
        if self.fail_erase {
            return Err(ProvisionError::StorageFault);
        }
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(ProvisionError::StorageFault)?;
        self.data[offset..end].fill(ERASED);
        self.erase_count += 1;
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        if let Some(remaining) = self.fail_write_after {
            if remaining == 0 {
                return Err(ProvisionError::StorageFault);
            }
            self.fail_write_after = Some(remaining - 1);
        }
        let end = offset
            .checked_add(data.len())
            .filter(|end| *end <= self.data.len())
            .ok_or(ProvisionError::StorageFault)?;
        self.data[offset..end].copy_from_slice(data);
        self.write_count += 1;
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryBootControl {
    test_boot_requests: usize,
    confirmed: bool,
    reject_requests: bool,
}

impl MemoryBootControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_requests(&mut self, reject: bool) {
        self.reject_requests = reject;
    }

    pub fn test_boot_requests(&self) -> usize {
        self.test_boot_requests
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }
}

impl BootControl for MemoryBootControl {
    fn request_test_boot(&mut self) -> Result<()> {
        if self.reject_requests {
            return Err(ProvisionError::StorageFault);
        }
        self.test_boot_requests += 1;
        self.confirmed = false;
        Ok(())
    }

    fn confirm_running_image(&mut self) -> Result<()> {
        self.confirmed = true;
        Ok(())
    }
}
