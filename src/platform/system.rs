use std::time::Duration;

/// Get the last reset reason as a string
pub fn reset_reason() -> &'static str {
    let reason = unsafe { esp_idf_sys::esp_reset_reason() };

    match reason {
        esp_idf_sys::esp_reset_reason_t_ESP_RST_POWERON => "Power-on",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_EXT => "External pin",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_SW => "Software reset",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_PANIC => "Panic",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_INT_WDT => "Interrupt watchdog",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_TASK_WDT => "Task watchdog",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_WDT => "Other watchdog",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_DEEPSLEEP => "Deep sleep",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_BROWNOUT => "Brownout",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_SDIO => "SDIO",
        _ => "Unknown",
    }
}

pub fn free_heap() -> u32 {
    unsafe { esp_idf_sys::esp_get_free_heap_size() }
}

pub fn uptime_seconds() -> u64 {
    unsafe { esp_idf_sys::esp_timer_get_time() as u64 / 1_000_000 }
}

/// Restart after `delay_ms` so the pending HTTP response can go out first.
pub fn schedule_restart(delay_ms: u32) {
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(delay_ms as u64));
        log::info!("Restarting device...");
        log::logger().flush();
        unsafe { esp_idf_sys::esp_restart() };
    });
}
