use anyhow::Result;
use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer, Request};
use esp_idf_svc::http::Method;
use esp_idf_svc::io::{Read, Write};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

use provision_core::api::{
    self, routes, ApiResponse, OtaStatusBody, SystemInfo, WifiConnectRequest,
};
use provision_core::config::DeviceConfig;
use provision_core::ProvisionError;

use crate::platform::{system, DeviceConnection, DeviceUpdater};

pub struct ProvisionServer {
    _server: EspHttpServer<'static>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| anyhow::anyhow!("manager lock poisoned"))
}

fn send_json<T: Serialize>(
    req: Request<&mut EspHttpConnection<'_>>,
    status: u16,
    body: &T,
) -> Result<()> {
    let json = serde_json::to_string(body)?;
    let mut response = req.into_response(status, None, &[("Content-Type", "application/json")])?;
    response.write_all(json.as_bytes())?;
    Ok(())
}

/// Answer a mutating route with `{success, message, error?}`.
fn send_outcome(
    req: Request<&mut EspHttpConnection<'_>>,
    outcome: provision_core::Result<()>,
    message: &str,
) -> Result<()> {
    match outcome {
        Ok(()) => send_json(req, 200, &ApiResponse::ok(message)),
        Err(e) => send_json(req, api::http_status(e), &ApiResponse::failure(e, e.describe())),
    }
}

/// Read a request body, stopping one byte past `max_len` so oversize is detectable.
fn read_body(req: &mut Request<&mut EspHttpConnection<'_>>, max_len: usize) -> Result<Vec<u8>> {
    let mut body = vec![0u8; max_len + 1];
    let mut len = 0;
    while len < body.len() {
        let n = req.read(&mut body[len..])?;
        if n == 0 {
            break;
        }
        len += n;
    }
    body.truncate(len);
    Ok(body)
}

impl ProvisionServer {
    pub fn new(
        connection: Arc<Mutex<DeviceConnection>>,
        updates: Option<Arc<Mutex<DeviceUpdater>>>,
        config: &DeviceConfig,
    ) -> Result<Self> {
        let server_config = Configuration {
            http_port: config.http_port,
            stack_size: 10240,
            ..Default::default()
        };
        let mut server = EspHttpServer::new(&server_config)?;

        server.fn_handler(routes::INDEX, Method::Get, move |req| {
            let mut response =
                req.into_response(200, None, &[("Content-Type", "text/html; charset=utf-8")])?;
            response.write_all(crate::templates::PROVISION_PAGE.as_bytes())?;
            Ok::<(), anyhow::Error>(())
        })?;

        // WiFi
        let conn = connection.clone();
        server.fn_handler(routes::WIFI_STATUS, Method::Get, move |req| {
            let status = {
                let mut manager = lock(&conn)?;
                manager.poll_events();
                manager.status()
            };
            send_json(req, 200, &status)
        })?;

        let conn = connection.clone();
        let max_json_body = config.max_json_body;
        server.fn_handler(routes::WIFI_CONNECT, Method::Post, move |mut req| {
            let body = read_body(&mut req, max_json_body)?;
            let request: WifiConnectRequest = match api::parse_json_body(&body, max_json_body) {
                Ok(request) => request,
                Err(e) => return send_outcome(req, Err(e), ""),
            };

            let outcome = lock(&conn)?.connect(&request.ssid, request.password.as_deref());
            let message = format!("Connecting to {}", request.ssid);
            send_outcome(req, outcome, &message)
        })?;

        let conn = connection.clone();
        server.fn_handler(routes::WIFI_SCAN, Method::Post, move |req| {
            let outcome = lock(&conn)?.scan();
            send_outcome(req, outcome, "Scan started")
        })?;

        let conn = connection.clone();
        server.fn_handler(routes::WIFI_DISCONNECT, Method::Post, move |req| {
            let outcome = lock(&conn)?.disconnect();
            send_outcome(req, outcome, "Disconnected")
        })?;

        let conn = connection.clone();
        server.fn_handler(routes::WIFI_FORGET, Method::Post, move |req| {
            let outcome = lock(&conn)?.forget_credentials();
            send_outcome(req, outcome, "Saved network forgotten")
        })?;

        let conn = connection.clone();
        server.fn_handler(routes::WIFI_AP_START, Method::Post, move |req| {
            let outcome = lock(&conn)?.start_access_point();
            send_outcome(req, outcome, "Access point started")
        })?;

        let conn = connection.clone();
        server.fn_handler(routes::WIFI_AP_STOP, Method::Post, move |req| {
            let outcome = lock(&conn)?.stop_access_point();
            send_outcome(req, outcome, "Access point stopped")
        })?;

        // Firmware update
        let ota = updates.clone();
        let chunk_size = config.upload_chunk_size.max(512);
        let restart_delay_ms = config.restart_delay_ms;
        server.fn_handler(routes::OTA_UPLOAD, Method::Post, move |mut req| {
            let Some(ota) = ota.as_ref() else {
                return send_outcome(req, Err(ProvisionError::DeviceUnavailable), "");
            };

            if let Err(e) = lock(ota)?.start() {
                return send_outcome(req, Err(e), "");
            }

            let mut buffer = vec![0u8; chunk_size];
            let outcome = loop {
                match req.read(&mut buffer) {
                    Ok(0) => break lock(ota)?.finish(),
                    Ok(n) => {
                        if let Err(e) = lock(ota)?.write(&buffer[..n]) {
                            break Err(e);
                        }
                    }
                    Err(e) => {
                        log::error!("Upload interrupted: {:?}", e);
                        break Err(ProvisionError::InvalidArgument);
                    }
                }
            };

            match outcome {
                Ok(image) => {
                    send_json(req, 200, &ApiResponse::staged(&image))?;
                    system::schedule_restart(restart_delay_ms);
                    Ok(())
                }
                Err(e) => {
                    {
                        let mut manager = lock(ota)?;
                        if manager.is_updating() {
                            let _ = manager.abort();
                        }
                    }
                    send_outcome(req, Err(e), "")
                }
            }
        })?;

        let ota = updates.clone();
        server.fn_handler(routes::OTA_STATUS, Method::Get, move |req| {
            let body = match ota.as_ref() {
                Some(ota) => OtaStatusBody::from(lock(ota)?.status()),
                None => OtaStatusBody::Unavailable,
            };
            send_json(req, 200, &body)
        })?;

        let ota = updates.clone();
        server.fn_handler(routes::OTA_ABORT, Method::Post, move |req| {
            let outcome = match ota.as_ref() {
                Some(ota) => lock(ota)?.abort(),
                None => Err(ProvisionError::DeviceUnavailable),
            };
            send_outcome(req, outcome, "Update aborted")
        })?;

        // System
        let ota = updates.clone();
        server.fn_handler(routes::SYSTEM_INFO, Method::Get, move |req| {
            let update_slot_size = match ota.as_ref() {
                Some(ota) => Some(lock(ota)?.slot_capacity()),
                None => None,
            };
            let info = SystemInfo {
                version: crate::version::full_version(),
                uptime_seconds: system::uptime_seconds(),
                free_heap: system::free_heap(),
                running_partition: crate::platform::ota_slot::running_partition_label(),
                reset_reason: system::reset_reason().to_string(),
                update_slot_size,
            };
            send_json(req, 200, &info)
        })?;

        server.fn_handler(routes::SYSTEM_REBOOT, Method::Post, move |req| {
            log::warn!("Device restart requested via web interface");
            send_json(req, 200, &ApiResponse::ok("Restarting"))?;
            system::schedule_restart(restart_delay_ms);
            Ok::<(), anyhow::Error>(())
        })?;

        log::info!("HTTP server listening on port {}", config.http_port);
        Ok(Self { _server: server })
    }
}
