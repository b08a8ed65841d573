//! Scan task management for the bluest transport.
//!
//! Owns the background task that drives the advertisement stream and
//! forwards discovery events to the caller's callbacks. Stopping the
//! scan awaits the task, so no callback fires after `stop` returns.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use bluest::{Adapter, Device};
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::transport::{DeviceCallback, ErrorCallback};
use crate::core::bluetooth::types::DiscoveredDevice;

pub(crate) struct ScanTask {
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ScanTask {
    pub(crate) fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            handle: None,
        }
    }

    pub(crate) async fn start(
        &mut self,
        adapter: Adapter,
        devices: Arc<StdMutex<HashMap<String, Device>>>,
        min_rssi: Option<i16>,
        on_device: DeviceCallback,
        on_error: ErrorCallback,
    ) {
        // Stop any scan already in progress first
        if self.handle.is_some() {
            self.stop().await;
        }

        self.cancel_token = CancellationToken::new();
        let cancel_token = self.cancel_token.clone();

        let handle = tokio::spawn(async move {
            Self::run(adapter, devices, min_rssi, on_device, on_error, cancel_token).await;
        });
        self.handle = Some(handle);
        info!("Device scan task started.");
    }

    async fn run(
        adapter: Adapter,
        devices: Arc<StdMutex<HashMap<String, Device>>>,
        min_rssi: Option<i16>,
        on_device: DeviceCallback,
        on_error: ErrorCallback,
        cancel_token: CancellationToken,
    ) {
        // No service filter: scan for all advertising peripherals
        let mut scan_stream = match adapter.scan(&[]).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to start scan: {}", e);
                on_error(BleError::ScanFailure(e.to_string()));
                return;
            }
        };

        loop {
            tokio::select! {
                next = scan_stream.next() => {
                    match next {
                        Some(discovered) => {
                            let device = discovered.device;
                            let rssi = discovered.rssi;
                            debug!("Found device - Device: {:?}, RSSI: {:?}", device, rssi);

                            if !passes_rssi_floor(min_rssi, rssi) {
                                continue;
                            }

                            let id = device.id().to_string();
                            let name = device.name().ok();
                            devices.lock().unwrap().insert(id.clone(), device);
                            on_device(DiscoveredDevice::new(id, name, rssi));
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }
    }

    /// Cancels the scan task and waits for it to finish. Safe to call
    /// when no scan is active.
    pub(crate) async fn stop(&mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(()) => info!("Scan task finished after cancellation."),
                Err(e) if e.is_cancelled() => info!("Scan task was cancelled."),
                Err(e) => error!("Scan task finished with a join error: {:?}", e),
            }
        }
    }
}

/// True when the advertisement clears the configured RSSI floor.
/// Advertisements without an RSSI reading always pass, as does every
/// advertisement when no floor is configured.
fn passes_rssi_floor(floor: Option<i16>, rssi: Option<i16>) -> bool {
    match (floor, rssi) {
        (Some(floor), Some(strength)) => strength >= floor,
        _ => true,
    }
}
