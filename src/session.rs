//! Reactive session state over the BLE session service.
//!
//! [`PaymentSession`] holds the presentation-facing state (scan
//! results, connection, services, last error, balance) and the payment
//! operations composed from the manager primitives. It is constructed
//! explicitly at app start and torn down once via [`PaymentSession::shutdown`];
//! the presentation layer receives it by reference.
//!
//! Balance bookkeeping has two deliberately different semantics:
//! `send_amount` applies a local optimistic projection (decrement,
//! clamped at zero) while `read_balance` is an authoritative refresh
//! that overwrites the local value.

use std::sync::{Arc, Mutex};

use log::error;
use serde::Serialize;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::core::bluetooth::{
    BleError, BleManager, BluestTransport, DeviceCallback, DiscoveredDevice, ErrorCallback,
    RadioState, ServiceDescriptor, Transport,
};

/// Presentation-facing snapshot of the session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionState {
    /// Whether a scan is running
    pub scanning: bool,
    /// Devices discovered during the current scan, one entry per id
    pub devices: Vec<DiscoveredDevice>,
    /// Whether a peripheral is connected
    pub connected: bool,
    /// The connected peripheral, if any
    pub connected_device: Option<DiscoveredDevice>,
    /// Services discovered on the connected peripheral
    pub services: Vec<ServiceDescriptor>,
    /// Last reported failure; superseded by the next one
    pub last_error: Option<BleError>,
    /// Locally held remaining funds
    pub balance: f64,
}

/// Stateful session object driving the payment exchange.
pub struct PaymentSession {
    manager: Arc<BleManager>,
    state: Arc<Mutex<SessionState>>,
}

impl PaymentSession {
    /// Builds a session over a caller-supplied transport. The config's
    /// `min_rssi` is a transport-side knob: callers constructing their
    /// own transport must pass it to that transport themselves (see
    /// [`PaymentSession::with_bluest`], which wires it for them).
    pub fn new(transport: Arc<dyn Transport>, config: &SessionConfig) -> Self {
        Self {
            manager: Arc::new(BleManager::new(transport, config)),
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    /// Builds a session over the production `bluest` transport with the
    /// config's scan filter wired in. The transport is lazy; no radio
    /// access happens until the first operation.
    pub fn with_bluest(config: &SessionConfig) -> Self {
        Self::new(Arc::new(BluestTransport::new(config.min_rssi)), config)
    }

    /// Clones the current state snapshot.
    pub fn state(&self) -> SessionState {
        self.state.lock().unwrap().clone()
    }

    pub fn balance(&self) -> f64 {
        self.state.lock().unwrap().balance
    }

    pub fn last_error(&self) -> Option<BleError> {
        self.state.lock().unwrap().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.state.lock().unwrap().last_error = None;
    }

    pub fn connected_device_name(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .connected_device
            .as_ref()
            .and_then(|device| device.name.clone())
    }

    /// Checks that the radio is powered on. Returns `false` and records
    /// a `RadioUnavailable` error otherwise.
    pub async fn initialize(&self) -> bool {
        self.clear_error();
        let state = self.manager.radio_state().await;
        if state == RadioState::PoweredOn {
            return true;
        }
        self.set_error(BleError::RadioUnavailable(state));
        false
    }

    /// Clears previous scan results and starts a new scan. Discovery
    /// events are deduplicated by id: the first sighting wins and later
    /// RSSI updates for a known id are dropped.
    pub async fn start_scan(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.last_error = None;
            state.devices.clear();
            state.scanning = true;
        }

        let device_state = self.state.clone();
        let on_device: DeviceCallback = Arc::new(move |device: DiscoveredDevice| {
            let mut state = device_state.lock().unwrap();
            if !state.devices.iter().any(|known| known.id == device.id) {
                state.devices.push(device);
            }
        });

        let error_state = self.state.clone();
        let on_error: ErrorCallback = Arc::new(move |err: BleError| {
            error!("Scan error: {}", err);
            let mut state = error_state.lock().unwrap();
            state.last_error = Some(err);
            state.scanning = false;
        });

        self.manager.scan_for_devices(on_device, on_error).await;
    }

    /// Stops scanning. Safe to call when no scan is active; the
    /// discovered-device list is left untouched.
    pub async fn stop_scan(&self) {
        self.manager.stop_scan().await;
        self.state.lock().unwrap().scanning = false;
    }

    /// Connects to a discovered device and fetches its services. The
    /// service list (possibly empty) is stored before this returns.
    ///
    /// A failed connect leaves the session disconnected and re-raises
    /// the error. A failed service discovery after a successful link
    /// does not roll the connection back: `connected` stays true with
    /// an empty service list and the failure lands in `last_error`.
    pub async fn connect_to_device(
        &self,
        device_id: &str,
    ) -> Result<DiscoveredDevice, BleError> {
        {
            let mut state = self.state.lock().unwrap();
            state.last_error = None;
            state.connected = false;
        }

        let device = match self.manager.connect_device(device_id).await {
            Ok(device) => device,
            Err(err) => {
                {
                    let mut state = self.state.lock().unwrap();
                    state.connected = false;
                    state.connected_device = None;
                }
                self.set_error(err.clone());
                return Err(err);
            }
        };

        {
            let mut state = self.state.lock().unwrap();
            state.connected = true;
            state.connected_device = Some(device.clone());
        }

        match self.manager.discover_services().await {
            Ok(services) => self.state.lock().unwrap().services = services,
            Err(err) => {
                self.state.lock().unwrap().services = Vec::new();
                self.set_error(err);
            }
        }

        Ok(device)
    }

    /// Tears down the active connection. Local connection state is
    /// cleared even when the transport teardown fails: after a failed
    /// disconnect the link cannot be trusted, so the session stops
    /// presenting it as usable and keeps the failure in `last_error`.
    pub async fn disconnect(&self) {
        let result = self.manager.disconnect().await;
        {
            let mut state = self.state.lock().unwrap();
            state.connected = false;
            state.connected_device = None;
            state.services.clear();
        }
        if let Err(err) = result {
            self.set_error(err);
        }
    }

    /// Writes a text payload to a characteristic. Failure is reported
    /// both through the return value and through `last_error`.
    pub async fn write_data(&self, service: Uuid, characteristic: Uuid, payload: &str) -> bool {
        self.clear_error();
        match self
            .manager
            .write_characteristic(service, characteristic, payload)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                self.set_error(err);
                false
            }
        }
    }

    /// Reads a text payload from a characteristic, or `None` on failure.
    pub async fn read_data(&self, service: Uuid, characteristic: Uuid) -> Option<String> {
        self.clear_error();
        match self
            .manager
            .read_characteristic(service, characteristic)
            .await
        {
            Ok(text) => Some(text),
            Err(err) => {
                self.set_error(err);
                None
            }
        }
    }

    /// Writes the amount and deducts it from the local balance, clamped
    /// at zero. The decrement is an optimistic local projection; no
    /// remote confirmation of the resulting ledger value is obtained.
    /// On failure the balance is unchanged.
    pub async fn send_amount(&self, service: Uuid, characteristic: Uuid, amount: f64) -> bool {
        let payload = amount.to_string();
        let written = self.write_data(service, characteristic, &payload).await;
        if written {
            let mut state = self.state.lock().unwrap();
            state.balance = (state.balance - amount).max(0.0);
        }
        written
    }

    /// Reads and parses the remote balance. A successful parse
    /// overwrites the local balance entirely. A non-numeric payload
    /// records a `ParseFailure` and leaves the balance unchanged.
    pub async fn read_balance(&self, service: Uuid, characteristic: Uuid) -> Option<f64> {
        let text = self.read_data(service, characteristic).await?;
        match text.trim().parse::<f64>() {
            Ok(balance) if balance.is_finite() => {
                self.state.lock().unwrap().balance = balance;
                Some(balance)
            }
            _ => {
                self.set_error(BleError::ParseFailure(text));
                None
            }
        }
    }

    /// Full lifecycle teardown; call once at session end.
    pub async fn shutdown(&self) {
        self.manager.destroy().await;
        *self.state.lock().unwrap() = SessionState::default();
    }

    fn set_error(&self, err: BleError) {
        error!("{}", err);
        self.state.lock().unwrap().last_error = Some(err);
    }
}
