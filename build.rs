use std::fs;
use std::path::Path;

const DEFAULT_AP_SSID: &str = "ESP32-Config";
const DEFAULT_AP_PASSWORD: &str = "12345678";

fn define_value<'a>(contents: &'a str, name: &str) -> Option<&'a str> {
    contents
        .lines()
        .find(|l| l.trim_start().starts_with("#define") && l.split_whitespace().nth(1) == Some(name))
        .and_then(|l| l.split('"').nth(1))
}

fn main() -> anyhow::Result<()> {
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        // Necessary for ESP-IDF
        embuild::espidf::sysenv::output();

        // Add crash log helper for better panic diagnostics
        println!("cargo:rustc-link-arg=-Wl,--undefined=esp_backtrace_print_app_description");
    }

    // Provisioning access point identity, optionally overridden by ap_config.h
    let ap_config_path = "ap_config.h";
    println!("cargo:rerun-if-changed={}", ap_config_path);

    let (ssid, password) = if Path::new(ap_config_path).exists() {
        let contents = fs::read_to_string(ap_config_path)?;
        (
            define_value(&contents, "AP_SSID").unwrap_or(DEFAULT_AP_SSID).to_string(),
            define_value(&contents, "AP_PASSWORD").unwrap_or(DEFAULT_AP_PASSWORD).to_string(),
        )
    } else {
        (DEFAULT_AP_SSID.to_string(), DEFAULT_AP_PASSWORD.to_string())
    };

    if password.len() < 8 {
        println!("cargo:warning=AP_PASSWORD in ap_config.h is shorter than 8 characters; the default will be used at runtime");
    }

    println!("cargo:rustc-env=PROVISION_AP_SSID={}", ssid);
    println!("cargo:rustc-env=PROVISION_AP_PASSWORD={}", password);

    Ok(())
}
