//! Transport adapter over the platform BLE central API.
//!
//! All radio access goes through the [`Transport`] trait; the rest of
//! the crate never touches `bluest` directly. [`BluestTransport`] is
//! the production implementation and the single owner of the adapter
//! handle and the current connection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use bluest::{Adapter, Characteristic, Device};
use log::{info, warn};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::bluetooth::codec;
use crate::core::bluetooth::constants::RADIO_STATE_QUERY_TIMEOUT_SECS;
use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::scanner::ScanTask;
use crate::core::bluetooth::types::{DiscoveredDevice, RadioState, ServiceDescriptor};

/// Invoked once per discovery event while a scan is running.
pub type DeviceCallback = Arc<dyn Fn(DiscoveredDevice) + Send + Sync>;
/// Invoked at most once per scan; the scan is over after it fires.
pub type ErrorCallback = Arc<dyn Fn(BleError) + Send + Sync>;

/// Platform BLE central surface used by the session layers.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Queries the power/availability state of the local radio.
    async fn radio_state(&self) -> Result<RadioState, BleError>;

    /// Starts continuous, unfiltered discovery. A scan already in
    /// progress is stopped first.
    async fn start_scan(
        &self,
        on_device: DeviceCallback,
        on_error: ErrorCallback,
    ) -> Result<(), BleError>;

    /// Stops discovery. No-op when no scan is active. Once this
    /// returns, no further device or error callbacks fire.
    async fn stop_scan(&self);

    /// Connects to a previously discovered device. Resolves once the
    /// link is up and the platform stack has enumerated services.
    async fn connect(&self, device_id: &str) -> Result<DiscoveredDevice, BleError>;

    /// Lists the services of the current connection.
    async fn services(&self) -> Result<Vec<ServiceDescriptor>, BleError>;

    /// Writes a text payload (base64 on the wire) with acknowledgement.
    async fn write_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
        payload: &str,
    ) -> Result<(), BleError>;

    /// Reads a characteristic and decodes the base64 wire payload.
    async fn read_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<String, BleError>;

    /// Tears down the current connection. No-op when not connected.
    async fn disconnect(&self) -> Result<(), BleError>;

    /// Stops scanning, disconnects and releases the adapter handle.
    /// The transport may be used again afterwards; the handle is
    /// re-created lazily.
    async fn teardown(&self);

    /// Id of the currently connected device. The session layers query
    /// this instead of keeping their own copy.
    async fn connected_device_id(&self) -> Option<String>;
}

/// Production transport backed by `bluest`.
pub struct BluestTransport {
    /// Lazily created adapter handle, released by `teardown`
    adapter: Mutex<Option<Adapter>>,
    /// Map of device ids to platform device handles, filled while scanning
    devices: Arc<StdMutex<HashMap<String, Device>>>,
    /// The single current connection
    current: Mutex<Option<Device>>,
    scan: Mutex<ScanTask>,
    /// Advertisements below this RSSI are dropped before they reach the caller
    min_rssi: Option<i16>,
}

impl BluestTransport {
    pub fn new(min_rssi: Option<i16>) -> Self {
        Self {
            adapter: Mutex::new(None),
            devices: Arc::new(StdMutex::new(HashMap::new())),
            current: Mutex::new(None),
            scan: Mutex::new(ScanTask::new()),
            min_rssi,
        }
    }

    async fn ensure_adapter(&self) -> Result<Adapter, BleError> {
        let mut guard = self.adapter.lock().await;
        if let Some(adapter) = guard.as_ref() {
            return Ok(adapter.clone());
        }
        let adapter = Adapter::default()
            .await
            .ok_or(BleError::RadioUnavailable(RadioState::Unsupported))?;
        adapter.wait_available().await.map_err(|e| {
            warn!("Bluetooth adapter unavailable: {}", e);
            BleError::RadioUnavailable(RadioState::PoweredOff)
        })?;
        info!("Bluetooth adapter is available.");
        *guard = Some(adapter.clone());
        Ok(adapter)
    }

    async fn current_device(&self) -> Result<Device, BleError> {
        self.current
            .lock()
            .await
            .clone()
            .ok_or(BleError::NoActiveConnection)
    }

    /// Looks up a characteristic on the current connection, by service
    /// uuid then characteristic uuid.
    async fn find_characteristic(
        &self,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> Result<Characteristic, BleError> {
        let device = self.current_device().await?;
        let device_id = device.id().to_string();

        let services = device
            .services()
            .await
            .map_err(|e| BleError::ConnectionFailure {
                device_id: device_id.clone(),
                reason: e.to_string(),
            })?;
        let service = services
            .iter()
            .find(|s| s.uuid() == service_uuid)
            .cloned()
            .ok_or(BleError::ServiceNotFound(service_uuid))?;

        let characteristics =
            service
                .characteristics()
                .await
                .map_err(|e| BleError::ConnectionFailure {
                    device_id,
                    reason: e.to_string(),
                })?;
        characteristics
            .iter()
            .find(|c| c.uuid() == characteristic_uuid)
            .cloned()
            .ok_or(BleError::CharacteristicNotFound(characteristic_uuid))
    }
}

#[async_trait]
impl Transport for BluestTransport {
    async fn radio_state(&self) -> Result<RadioState, BleError> {
        let Some(adapter) = Adapter::default().await else {
            return Ok(RadioState::Unsupported);
        };
        // wait_available never resolves while the radio is off, so the
        // query is bounded here.
        let wait = Duration::from_secs(RADIO_STATE_QUERY_TIMEOUT_SECS);
        match tokio::time::timeout(wait, adapter.wait_available()).await {
            Ok(Ok(())) => {
                let mut guard = self.adapter.lock().await;
                if guard.is_none() {
                    *guard = Some(adapter);
                }
                Ok(RadioState::PoweredOn)
            }
            Ok(Err(e)) => {
                warn!("Bluetooth adapter reported unavailable: {}", e);
                Ok(RadioState::PoweredOff)
            }
            Err(_) => Ok(RadioState::PoweredOff),
        }
    }

    async fn start_scan(
        &self,
        on_device: DeviceCallback,
        on_error: ErrorCallback,
    ) -> Result<(), BleError> {
        let adapter = self.ensure_adapter().await?;
        self.devices.lock().unwrap().clear();
        let mut scan = self.scan.lock().await;
        scan.start(
            adapter,
            self.devices.clone(),
            self.min_rssi,
            on_device,
            on_error,
        )
        .await;
        Ok(())
    }

    async fn stop_scan(&self) {
        self.scan.lock().await.stop().await;
    }

    async fn connect(&self, device_id: &str) -> Result<DiscoveredDevice, BleError> {
        let adapter = self.ensure_adapter().await?;
        let device = {
            let devices = self.devices.lock().unwrap();
            devices.get(device_id).cloned()
        }
        .ok_or_else(|| BleError::DeviceNotFound(device_id.to_string()))?;

        if !device.is_connected().await {
            info!("Initiating connection to {}...", device_id);
            adapter
                .connect_device(&device)
                .await
                .map_err(|e| BleError::ConnectionFailure {
                    device_id: device_id.to_string(),
                    reason: e.to_string(),
                })?;
        }

        // Eager service discovery as part of connect. The link itself is
        // up at this point; enumeration problems surface through
        // `services`, not here.
        match device.services().await {
            Ok(services) => info!("Connected to {} ({} services)", device_id, services.len()),
            Err(e) => warn!("Service enumeration after connect failed: {}", e),
        }

        let snapshot = DiscoveredDevice::new(device.id().to_string(), device.name().ok(), None);
        *self.current.lock().await = Some(device);
        Ok(snapshot)
    }

    async fn services(&self) -> Result<Vec<ServiceDescriptor>, BleError> {
        let device = self.current_device().await?;
        let device_id = device.id().to_string();

        let services = device
            .services()
            .await
            .map_err(|e| BleError::ConnectionFailure {
                device_id: device_id.clone(),
                reason: e.to_string(),
            })?;

        let mut descriptors = Vec::with_capacity(services.len());
        for service in services {
            let characteristics =
                service
                    .characteristics()
                    .await
                    .map_err(|e| BleError::ConnectionFailure {
                        device_id: device_id.clone(),
                        reason: e.to_string(),
                    })?;
            descriptors.push(ServiceDescriptor {
                uuid: service.uuid(),
                characteristics: characteristics.iter().map(|c| c.uuid()).collect(),
            });
        }
        Ok(descriptors)
    }

    async fn write_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
        payload: &str,
    ) -> Result<(), BleError> {
        let characteristic = self.find_characteristic(service, characteristic).await?;
        let wire = codec::encode_payload(payload);
        characteristic
            .write(wire.as_bytes())
            .await
            .map_err(|e| BleError::WriteFailure(e.to_string()))?;
        info!("Data written successfully: {}", payload);
        Ok(())
    }

    async fn read_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<String, BleError> {
        let characteristic = self.find_characteristic(service, characteristic).await?;
        let wire = characteristic
            .read()
            .await
            .map_err(|e| BleError::ReadFailure(e.to_string()))?;
        let wire = String::from_utf8(wire)
            .map_err(|e| BleError::ReadFailure(format!("wire payload is not text: {e}")))?;
        let text = codec::decode_payload(&wire)?;
        info!("Data read successfully: {}", text);
        Ok(text)
    }

    async fn disconnect(&self) -> Result<(), BleError> {
        // The reference is dropped before the platform call so a failed
        // teardown never leaves a half-trusted handle behind.
        let taken = self.current.lock().await.take();
        let Some(device) = taken else {
            return Ok(());
        };
        if device.is_connected().await {
            let adapter = self.ensure_adapter().await?;
            adapter
                .disconnect_device(&device)
                .await
                .map_err(|e| BleError::ConnectionFailure {
                    device_id: device.id().to_string(),
                    reason: e.to_string(),
                })?;
            info!("Disconnected from device {}", device.id());
        }
        Ok(())
    }

    async fn teardown(&self) {
        self.scan.lock().await.stop().await;
        if let Err(e) = self.disconnect().await {
            warn!("Disconnect during teardown failed: {}", e);
        }
        self.devices.lock().unwrap().clear();
        *self.adapter.lock().await = None;
        info!("Transport torn down, adapter handle released.");
    }

    async fn connected_device_id(&self) -> Option<String> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|device| device.id().to_string())
    }
}
