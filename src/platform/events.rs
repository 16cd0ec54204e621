// Forwards raw ESP-IDF WiFi/IP events into the Connection Manager's queue

use anyhow::{bail, Result};
use provision_core::NetworkEvent;
use std::net::Ipv4Addr;
use std::sync::mpsc::Sender;
use std::sync::{Mutex, OnceLock};

static EVENT_SINK: OnceLock<Mutex<Sender<NetworkEvent>>> = OnceLock::new();

fn forward(event: NetworkEvent) {
    if let Some(sink) = EVENT_SINK.get() {
        if let Ok(tx) = sink.lock() {
            if tx.send(event).is_err() {
                log::warn!("Network event dropped, no receiver: {:?}", event);
            }
        }
    }
}

unsafe extern "C" fn wifi_event_handler(
    _handler_arg: *mut core::ffi::c_void,
    event_base: esp_idf_sys::esp_event_base_t,
    event_id: i32,
    event_data: *mut core::ffi::c_void,
) {
    use esp_idf_sys::*;

    if event_base == WIFI_EVENT {
        match event_id as u32 {
            wifi_event_t_WIFI_EVENT_STA_CONNECTED => forward(NetworkEvent::ConnectSucceeded),
            wifi_event_t_WIFI_EVENT_STA_DISCONNECTED => {
                let reason = if event_data.is_null() {
                    0
                } else {
                    let disc = &*(event_data as *const wifi_event_sta_disconnected_t);
                    disc.reason as u16
                };
                forward(NetworkEvent::Disconnected { reason });
            }
            _ => {}
        }
    } else if event_base == IP_EVENT
        && event_id as u32 == ip_event_t_IP_EVENT_STA_GOT_IP
        && !event_data.is_null()
    {
        let got_ip = &*(event_data as *const ip_event_got_ip_t);
        // esp_ip4_addr_t holds the address in network byte order
        let ip = Ipv4Addr::from(got_ip.ip_info.ip.addr.to_le_bytes());
        forward(NetworkEvent::AddressAssigned(ip));
    }
}

/// Route station events to `sender`. Only the first registration takes effect.
pub fn register_event_forwarding(sender: Sender<NetworkEvent>) -> Result<()> {
    if EVENT_SINK.set(Mutex::new(sender)).is_err() {
        bail!("Network event forwarding already registered");
    }

    unsafe {
        use esp_idf_sys::*;

        let err = esp_event_handler_register(
            WIFI_EVENT,
            ESP_EVENT_ANY_ID,
            Some(wifi_event_handler),
            core::ptr::null_mut(),
        );
        if err != ESP_OK as esp_err_t {
            bail!("Failed to register WiFi event handler: {}", err);
        }

        let err = esp_event_handler_register(
            IP_EVENT,
            ip_event_t_IP_EVENT_STA_GOT_IP as i32,
            Some(wifi_event_handler),
            core::ptr::null_mut(),
        );
        if err != ESP_OK as esp_err_t {
            bail!("Failed to register IP event handler: {}", err);
        }
    }

    log::info!("Network event forwarding registered");
    Ok(())
}
