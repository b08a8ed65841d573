//! Scriptable in-memory transport for tests.
//!
//! Discovery events are delivered synchronously from `start_scan`, and
//! characteristic values live in a plain map, so tests can drive every
//! failure mode of the session layers without a radio.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::transport::{DeviceCallback, ErrorCallback, Transport};
use crate::core::bluetooth::types::{DiscoveredDevice, RadioState, ServiceDescriptor};

#[derive(Default)]
pub(crate) struct MockTransport {
    radio: StdMutex<Option<RadioState>>,
    advertisements: StdMutex<Vec<DiscoveredDevice>>,
    scan_error: StdMutex<Option<String>>,
    services: StdMutex<Vec<ServiceDescriptor>>,
    values: StdMutex<HashMap<(Uuid, Uuid), String>>,
    writes: StdMutex<Vec<(Uuid, Uuid, String)>>,
    connected: StdMutex<Option<String>>,
    fail_connect: StdMutex<bool>,
    fail_services: StdMutex<bool>,
    fail_write: StdMutex<bool>,
    fail_disconnect: StdMutex<bool>,
    connect_gate: StdMutex<Option<Arc<Notify>>>,
    scan_stops: StdMutex<usize>,
    torn_down: StdMutex<bool>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_radio(&self, state: RadioState) {
        *self.radio.lock().unwrap() = Some(state);
    }

    /// Adds a discovery event that the next scan will deliver, in order.
    pub(crate) fn advertise(&self, id: &str, name: Option<&str>, rssi: Option<i16>) {
        self.advertisements
            .lock()
            .unwrap()
            .push(DiscoveredDevice::new(
                id.to_string(),
                name.map(str::to_string),
                rssi,
            ));
    }

    pub(crate) fn clear_advertisements(&self) {
        self.advertisements.lock().unwrap().clear();
    }

    pub(crate) fn set_scan_error(&self, message: &str) {
        *self.scan_error.lock().unwrap() = Some(message.to_string());
    }

    pub(crate) fn add_service(&self, uuid: Uuid, characteristics: &[Uuid]) {
        self.services.lock().unwrap().push(ServiceDescriptor {
            uuid,
            characteristics: characteristics.to_vec(),
        });
    }

    pub(crate) fn set_value(&self, service: Uuid, characteristic: Uuid, text: &str) {
        self.values
            .lock()
            .unwrap()
            .insert((service, characteristic), text.to_string());
    }

    pub(crate) fn set_fail_connect(&self, fail: bool) {
        *self.fail_connect.lock().unwrap() = fail;
    }

    pub(crate) fn set_fail_services(&self, fail: bool) {
        *self.fail_services.lock().unwrap() = fail;
    }

    pub(crate) fn set_fail_write(&self, fail: bool) {
        *self.fail_write.lock().unwrap() = fail;
    }

    pub(crate) fn set_fail_disconnect(&self, fail: bool) {
        *self.fail_disconnect.lock().unwrap() = fail;
    }

    /// Makes `connect` park until the gate is notified.
    pub(crate) fn set_connect_gate(&self, gate: Arc<Notify>) {
        *self.connect_gate.lock().unwrap() = Some(gate);
    }

    pub(crate) fn writes(&self) -> Vec<(Uuid, Uuid, String)> {
        self.writes.lock().unwrap().clone()
    }

    pub(crate) fn is_torn_down(&self) -> bool {
        *self.torn_down.lock().unwrap()
    }

    pub(crate) fn scan_stop_calls(&self) -> usize {
        *self.scan_stops.lock().unwrap()
    }

    fn require_connection(&self) -> Result<String, BleError> {
        self.connected
            .lock()
            .unwrap()
            .clone()
            .ok_or(BleError::NoActiveConnection)
    }

    fn lookup(&self, service: Uuid, characteristic: Uuid) -> Result<(), BleError> {
        self.require_connection()?;
        let services = self.services.lock().unwrap();
        let descriptor = services
            .iter()
            .find(|s| s.uuid == service)
            .ok_or(BleError::ServiceNotFound(service))?;
        if !descriptor.characteristics.contains(&characteristic) {
            return Err(BleError::CharacteristicNotFound(characteristic));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn radio_state(&self) -> Result<RadioState, BleError> {
        Ok(self.radio.lock().unwrap().unwrap_or(RadioState::PoweredOn))
    }

    async fn start_scan(
        &self,
        on_device: DeviceCallback,
        on_error: ErrorCallback,
    ) -> Result<(), BleError> {
        let advertisements = self.advertisements.lock().unwrap().clone();
        for device in advertisements {
            on_device(device);
        }
        if let Some(message) = self.scan_error.lock().unwrap().clone() {
            on_error(BleError::ScanFailure(message));
        }
        Ok(())
    }

    async fn stop_scan(&self) {
        *self.scan_stops.lock().unwrap() += 1;
    }

    async fn connect(&self, device_id: &str) -> Result<DiscoveredDevice, BleError> {
        let gate = self.connect_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if *self.fail_connect.lock().unwrap() {
            return Err(BleError::ConnectionFailure {
                device_id: device_id.to_string(),
                reason: "device unreachable".to_string(),
            });
        }
        let device = self
            .advertisements
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == device_id)
            .cloned()
            .ok_or_else(|| BleError::DeviceNotFound(device_id.to_string()))?;
        *self.connected.lock().unwrap() = Some(device.id.clone());
        Ok(device)
    }

    async fn services(&self) -> Result<Vec<ServiceDescriptor>, BleError> {
        let device_id = self.require_connection()?;
        if *self.fail_services.lock().unwrap() {
            return Err(BleError::ConnectionFailure {
                device_id,
                reason: "service enumeration failed".to_string(),
            });
        }
        Ok(self.services.lock().unwrap().clone())
    }

    async fn write_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
        payload: &str,
    ) -> Result<(), BleError> {
        self.lookup(service, characteristic)?;
        if *self.fail_write.lock().unwrap() {
            return Err(BleError::WriteFailure("write rejected".to_string()));
        }
        self.writes
            .lock()
            .unwrap()
            .push((service, characteristic, payload.to_string()));
        self.values
            .lock()
            .unwrap()
            .insert((service, characteristic), payload.to_string());
        Ok(())
    }

    async fn read_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<String, BleError> {
        self.lookup(service, characteristic)?;
        self.values
            .lock()
            .unwrap()
            .get(&(service, characteristic))
            .cloned()
            .ok_or_else(|| BleError::ReadFailure("characteristic has no value".to_string()))
    }

    async fn disconnect(&self) -> Result<(), BleError> {
        if *self.fail_disconnect.lock().unwrap() {
            let device_id = self.connected.lock().unwrap().clone().unwrap_or_default();
            return Err(BleError::ConnectionFailure {
                device_id,
                reason: "teardown refused".to_string(),
            });
        }
        *self.connected.lock().unwrap() = None;
        Ok(())
    }

    async fn teardown(&self) {
        *self.connected.lock().unwrap() = None;
        *self.torn_down.lock().unwrap() = true;
    }

    async fn connected_device_id(&self) -> Option<String> {
        self.connected.lock().unwrap().clone()
    }
}
