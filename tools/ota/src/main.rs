use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::{Body, Client, Response};
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::time::Duration;

use provision_core::api::{routes, ApiResponse, OtaStatusBody, SystemInfo, WifiConnectRequest};
use provision_core::ConnectionStatus;

#[derive(Parser)]
#[command(name = "provision")]
#[command(about = "ESP32 provisioning and OTA client", long_about = None)]
struct Cli {
    /// Port number (default: 80)
    #[arg(short, long, default_value = "80", global = true)]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show WiFi, update and system status
    Status {
        /// Device IP address
        ip: String,
    },
    /// Ask the device to join a network
    Wifi {
        ip: String,
        #[arg(long)]
        ssid: String,
        /// Leave out for an open network
        #[arg(long)]
        password: Option<String>,
    },
    /// Clear the saved network
    Forget { ip: String },
    /// Stream a firmware image to the device
    Upload {
        ip: String,
        /// Firmware file to upload (defaults to release build)
        #[arg(short, long)]
        firmware: Option<PathBuf>,
    },
    /// Restart the device
    Reboot { ip: String },
}

/// Advances a progress bar as the request body is read.
struct ProgressReader<R> {
    inner: R,
    progress: ProgressBar,
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.progress.inc(n as u64);
        Ok(n)
    }
}

struct Device {
    base: String,
    client: Client,
}

impl Device {
    fn new(ip: &str, port: u16, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base: format!("http://{}:{}", ip, port),
            client,
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base, route)
    }

    fn get<T: DeserializeOwned>(&self, route: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(route))
            .send()
            .with_context(|| format!("device not reachable at {}", self.base))?;
        if !response.status().is_success() {
            bail!("GET {} failed: HTTP {}", route, response.status());
        }
        Ok(response.json()?)
    }

    fn post(&self, route: &str) -> Result<ApiResponse> {
        let response = self
            .client
            .post(self.url(route))
            .send()
            .with_context(|| format!("device not reachable at {}", self.base))?;
        api_result(response)
    }
}

/// Decode `{success, message, error?}` and turn a failure into an error.
fn api_result(response: Response) -> Result<ApiResponse> {
    let status = response.status();
    let body: ApiResponse = response
        .json()
        .with_context(|| format!("unexpected response (HTTP {})", status))?;
    if !body.success {
        bail!(
            "{} ({}, HTTP {})",
            body.message,
            body.error.as_deref().unwrap_or("UNKNOWN"),
            status
        );
    }
    Ok(body)
}

fn show_status(device: &Device) -> Result<()> {
    let wifi: ConnectionStatus = device.get(routes::WIFI_STATUS)?;
    match wifi {
        ConnectionStatus::Connected { ip } => println!(
            "{} WiFi connected{}",
            "📶".green(),
            ip.map(|ip| format!(" ({})", ip)).unwrap_or_default()
        ),
        ConnectionStatus::ApMode { ssid } => {
            println!("{} Setup access point active: {}", "📡".yellow(), ssid)
        }
        ConnectionStatus::Disconnected => println!("{} WiFi disconnected", "⚠️".yellow()),
    }

    let ota: OtaStatusBody = device.get(routes::OTA_STATUS)?;
    match ota {
        OtaStatusBody::Ready => println!("   Update: ready"),
        OtaStatusBody::Updating { bytes_written } => {
            println!("   Update: in progress, {} bytes written", bytes_written)
        }
        OtaStatusBody::Unavailable => println!("   Update: unavailable (no OTA partition)"),
    }

    let info: SystemInfo = device.get(routes::SYSTEM_INFO)?;
    println!("   Version: {}", info.version);
    println!("   Partition: {}", info.running_partition);
    println!("   Uptime: {}s, free heap {} bytes", info.uptime_seconds, info.free_heap);
    println!("   Last reset: {}", info.reset_reason);
    Ok(())
}

fn connect_wifi(device: &Device, ssid: String, password: Option<String>) -> Result<()> {
    let request = WifiConnectRequest { ssid, password };
    let response = device
        .client
        .post(device.url(routes::WIFI_CONNECT))
        .json(&request)
        .send()
        .with_context(|| format!("device not reachable at {}", device.base))?;
    let body = api_result(response)?;
    println!("{} {}", "✅".green(), body.message);
    Ok(())
}

fn upload(device: &Device, firmware: Option<PathBuf>) -> Result<()> {
    let firmware_path = firmware.unwrap_or_else(|| {
        PathBuf::from("target/xtensa-esp32-espidf/release/esp32-provisioner.bin")
    });
    if !firmware_path.exists() {
        bail!("Firmware not found: {}", firmware_path.display());
    }
    let firmware_data = fs::read(&firmware_path)
        .with_context(|| format!("failed to read {}", firmware_path.display()))?;

    let file_size = firmware_data.len();
    println!("{} ESP32 OTA Update", "🚀".blue());
    println!("{}Device: {}", "   ".dimmed(), device.base);
    println!(
        "{}Firmware: {} bytes ({:.2} MB)",
        "   ".dimmed(),
        file_size,
        file_size as f64 / 1024.0 / 1024.0
    );

    // Refuse early if the device has nowhere to stage the image
    if let OtaStatusBody::Unavailable = device.get::<OtaStatusBody>(routes::OTA_STATUS)? {
        bail!("Device has no OTA partition");
    }

    let pb = ProgressBar::new(file_size as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes}")?
            .progress_chars("#>-"),
    );

    let reader = ProgressReader {
        inner: Cursor::new(firmware_data),
        progress: pb.clone(),
    };
    let result = device
        .client
        .post(device.url(routes::OTA_UPLOAD))
        .header("Content-Type", "application/octet-stream")
        .body(Body::sized(reader, file_size as u64))
        .send();
    pb.finish_and_clear();

    let body = api_result(result.context("upload failed")?)?;
    println!("{} {}", "✅".green(), body.message);
    println!("\n{} OTA update completed successfully!", "✨".green());
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let quick = Duration::from_secs(5);
    match cli.command {
        Command::Status { ip } => show_status(&Device::new(&ip, cli.port, quick)?),
        Command::Wifi { ip, ssid, password } => {
            connect_wifi(&Device::new(&ip, cli.port, quick)?, ssid, password)
        }
        Command::Forget { ip } => {
            let body = Device::new(&ip, cli.port, quick)?.post(routes::WIFI_FORGET)?;
            println!("{} {}", "✅".green(), body.message);
            Ok(())
        }
        Command::Upload { ip, firmware } => upload(
            &Device::new(&ip, cli.port, Duration::from_secs(120))?,
            firmware,
        ),
        Command::Reboot { ip } => {
            let body = Device::new(&ip, cli.port, quick)?.post(routes::SYSTEM_REBOOT)?;
            println!("{} {}", "🔄".blue(), body.message);
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "❌".red(), e);
        std::process::exit(1);
    }
}
