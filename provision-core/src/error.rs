use std::fmt;

/// Failure kinds shared by the update and connection managers.
///
/// Every kind is returned to the immediate caller; neither manager retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvisionError {
    /// `start` while a session is already active.
    AlreadyInProgress,
    /// `write`, `finish` or `abort` without an active session.
    NotInProgress,
    /// The chunk would run past the end of the slot.
    CapacityExceeded,
    /// `finish` with nothing written.
    EmptyImage,
    /// Flash or persistent storage failed underneath us.
    StorageFault,
    /// Missing, empty or oversized argument.
    InvalidArgument,
    /// No usable radio interface.
    DeviceUnavailable,
    /// Nothing persisted under the requested key.
    NotFound,
}

impl ProvisionError {
    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionError::AlreadyInProgress => "ALREADY_IN_PROGRESS",
            ProvisionError::NotInProgress => "NOT_IN_PROGRESS",
            ProvisionError::CapacityExceeded => "CAPACITY_EXCEEDED",
            ProvisionError::EmptyImage => "EMPTY_IMAGE",
            ProvisionError::StorageFault => "STORAGE_FAULT",
            ProvisionError::InvalidArgument => "INVALID_ARGUMENT",
            ProvisionError::DeviceUnavailable => "DEVICE_UNAVAILABLE",
            ProvisionError::NotFound => "NOT_FOUND",
        }
    }

    /// Short human-readable description.
    pub fn describe(&self) -> &'static str {
        match self {
            ProvisionError::AlreadyInProgress => "update already in progress",
            ProvisionError::NotInProgress => "no update in progress",
            ProvisionError::CapacityExceeded => "data too large for update slot",
            ProvisionError::EmptyImage => "no data written",
            ProvisionError::StorageFault => "storage operation failed",
            ProvisionError::InvalidArgument => "invalid argument",
            ProvisionError::DeviceUnavailable => "device unavailable",
            ProvisionError::NotFound => "not found",
        }
    }
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.as_str(), self.describe())
    }
}

impl std::error::Error for ProvisionError {}

pub type Result<T> = core::result::Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let msg = ProvisionError::CapacityExceeded.to_string();
        assert!(msg.starts_with("CAPACITY_EXCEEDED"));
        assert!(msg.contains("too large"));
    }

    #[test]
    fn test_codes_are_distinct() {
        let all = [
            ProvisionError::AlreadyInProgress,
            ProvisionError::NotInProgress,
            ProvisionError::CapacityExceeded,
            ProvisionError::EmptyImage,
            ProvisionError::StorageFault,
            ProvisionError::InvalidArgument,
            ProvisionError::DeviceUnavailable,
            ProvisionError::NotFound,
        ];
        let codes: std::collections::HashSet<_> = all.iter().map(|e| e.as_str()).collect();
        assert_eq!(codes.len(), all.len());
    }
}
