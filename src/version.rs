// Centralized version information

// Firmware release tag reported by /api/system/info
pub const FIRMWARE_VERSION: &str = "v1.2-provisioner";

// Cargo package version from Cargo.toml
pub const CARGO_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn full_version() -> String {
    format!("{} ({})", FIRMWARE_VERSION, CARGO_VERSION)
}
