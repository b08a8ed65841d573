//! BLE session service for the payment bridge
//! This module provides the main interface for bluetooth operations.
//!
//! The manager enforces the ordering preconditions the transport does
//! not: a radio check before scanning, and a single-flight guard around
//! connection-lifecycle operations (connect / discover / disconnect).
//! An overlapping lifecycle call is rejected with
//! [`BleError::OperationInFlight`] rather than queued.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::transport::{DeviceCallback, ErrorCallback, Transport};
use crate::core::bluetooth::types::{DiscoveredDevice, RadioState, ServiceDescriptor};

/// Manages Bluetooth operations
pub struct BleManager {
    transport: Arc<dyn Transport>,
    /// Held for the duration of one lifecycle operation; `try_lock`
    /// failure means another one is still outstanding.
    lifecycle: Mutex<()>,
    /// Optional bound on each radio round-trip. `None` waits
    /// indefinitely, matching the transport's own behaviour.
    operation_timeout: Option<Duration>,
}

impl BleManager {
    /// Creates a new BleManager on top of the given transport
    pub fn new(transport: Arc<dyn Transport>, config: &SessionConfig) -> Self {
        Self {
            transport,
            lifecycle: Mutex::new(()),
            operation_timeout: config.operation_timeout(),
        }
    }

    /// Queries the radio state, absorbing transport failures into
    /// `Unknown` (the cause is only logged).
    pub async fn radio_state(&self) -> RadioState {
        match self.transport.radio_state().await {
            Ok(state) => state,
            Err(e) => {
                error!("Error querying radio state: {}", e);
                RadioState::Unknown
            }
        }
    }

    /// True iff the radio reports PoweredOn. Never fails; any other
    /// state or a query failure yields `false`.
    pub async fn initialize(&self) -> bool {
        let state = self.radio_state().await;
        if state != RadioState::PoweredOn {
            info!("BLE not powered on, current state: {:?}", state);
            return false;
        }
        true
    }

    /// Starts a scan after checking the radio. When the radio is not
    /// powered on, `on_error` receives `RadioUnavailable` and no scan
    /// is started.
    pub async fn scan_for_devices(&self, on_device: DeviceCallback, on_error: ErrorCallback) {
        let state = self.radio_state().await;
        if state != RadioState::PoweredOn {
            on_error(BleError::RadioUnavailable(state));
            return;
        }
        if let Err(e) = self.transport.start_scan(on_device, on_error.clone()).await {
            error!("Error starting scan: {}", e);
            on_error(e);
        }
    }

    /// Stops scanning. Safe to call when no scan is active.
    pub async fn stop_scan(&self) {
        self.transport.stop_scan().await;
    }

    /// Connects to a discovered device. Service enumeration happens
    /// eagerly inside the transport as part of the connect.
    pub async fn connect_device(&self, device_id: &str) -> Result<DiscoveredDevice, BleError> {
        let _guard = self.lifecycle_guard()?;
        info!("Connecting to device: {}", device_id);
        let device = self
            .with_timeout(self.transport.connect(device_id))
            .await?;
        info!("Connected to device: {:?}", device.name);
        Ok(device)
    }

    /// Lists the services of the current connection. A single connect
    /// already happened in `connect_device`; this never reconnects.
    pub async fn discover_services(&self) -> Result<Vec<ServiceDescriptor>, BleError> {
        let _guard = self.lifecycle_guard()?;
        self.with_timeout(self.transport.services()).await
    }

    pub async fn write_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
        payload: &str,
    ) -> Result<(), BleError> {
        self.with_timeout(
            self.transport
                .write_characteristic(service, characteristic, payload),
        )
        .await
    }

    pub async fn read_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<String, BleError> {
        self.with_timeout(self.transport.read_characteristic(service, characteristic))
            .await
    }

    /// Disconnects from the currently connected device. No-op when
    /// nothing is connected.
    pub async fn disconnect(&self) -> Result<(), BleError> {
        let _guard = self.lifecycle_guard()?;
        self.transport.disconnect().await
    }

    /// Returns the id of the currently connected device, straight from
    /// the transport's bookkeeping.
    pub async fn connected_device_id(&self) -> Option<String> {
        self.transport.connected_device_id().await
    }

    /// Full lifecycle teardown. The transport stops any scan,
    /// disconnects and releases the adapter handle. Invoke once, at
    /// session end.
    pub async fn destroy(&self) {
        self.transport.teardown().await;
        info!("BLE manager destroyed.");
    }

    fn lifecycle_guard(&self) -> Result<tokio::sync::MutexGuard<'_, ()>, BleError> {
        self.lifecycle
            .try_lock()
            .map_err(|_| BleError::OperationInFlight)
    }

    async fn with_timeout<T>(
        &self,
        operation: impl Future<Output = Result<T, BleError>>,
    ) -> Result<T, BleError> {
        match self.operation_timeout {
            Some(limit) => match tokio::time::timeout(limit, operation).await {
                Ok(result) => result,
                Err(_) => Err(BleError::Timeout(limit.as_secs())),
            },
            None => operation.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use tokio::sync::Notify;

    use super::*;
    use crate::core::bluetooth::mock::MockTransport;

    fn manager_over(mock: &Arc<MockTransport>) -> BleManager {
        BleManager::new(mock.clone(), &SessionConfig::default())
    }

    #[tokio::test]
    async fn initialize_reflects_radio_state() {
        let mock = Arc::new(MockTransport::new());
        let manager = manager_over(&mock);
        assert!(manager.initialize().await);

        mock.set_radio(RadioState::PoweredOff);
        assert!(!manager.initialize().await);
    }

    #[tokio::test]
    async fn scan_refused_when_radio_is_off() {
        let mock = Arc::new(MockTransport::new());
        mock.advertise("aa:bb", Some("Pay Terminal"), Some(-40));
        mock.set_radio(RadioState::PoweredOff);
        let manager = manager_over(&mock);

        let seen: Arc<StdMutex<Vec<DiscoveredDevice>>> = Arc::default();
        let errors: Arc<StdMutex<Vec<BleError>>> = Arc::default();
        let seen_cb = seen.clone();
        let errors_cb = errors.clone();
        manager
            .scan_for_devices(
                Arc::new(move |device| seen_cb.lock().unwrap().push(device)),
                Arc::new(move |err| errors_cb.lock().unwrap().push(err)),
            )
            .await;

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(
            errors.lock().unwrap().as_slice(),
            &[BleError::RadioUnavailable(RadioState::PoweredOff)]
        );
    }

    #[tokio::test]
    async fn overlapping_lifecycle_calls_are_rejected() {
        let mock = Arc::new(MockTransport::new());
        mock.advertise("aa:bb", Some("Pay Terminal"), Some(-40));
        let gate = Arc::new(Notify::new());
        mock.set_connect_gate(gate.clone());
        let manager = Arc::new(manager_over(&mock));

        let pending = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.connect_device("aa:bb").await })
        };
        // Let the spawned connect take the guard and park on the gate.
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            manager.disconnect().await,
            Err(BleError::OperationInFlight)
        );
        assert_eq!(
            manager.connect_device("aa:bb").await,
            Err(BleError::OperationInFlight)
        );

        gate.notify_one();
        pending.await.unwrap().unwrap();

        // Guard is free again once the first operation finished.
        assert_eq!(manager.disconnect().await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_connect_times_out_with_distinct_error() {
        let mock = Arc::new(MockTransport::new());
        mock.advertise("aa:bb", Some("Pay Terminal"), Some(-40));
        // Gate is never notified: the connect would hang forever.
        mock.set_connect_gate(Arc::new(Notify::new()));

        let config = SessionConfig {
            operation_timeout_secs: 5,
            ..SessionConfig::default()
        };
        let manager = BleManager::new(mock.clone(), &config);

        assert_eq!(
            manager.connect_device("aa:bb").await,
            Err(BleError::Timeout(5))
        );
    }

    #[tokio::test]
    async fn destroy_tears_down_via_transport_alone() {
        let mock = Arc::new(MockTransport::new());
        let manager = manager_over(&mock);

        manager.destroy().await;

        // Scan shutdown is owned by the transport teardown; destroy
        // issues no separate stop.
        assert!(mock.is_torn_down());
        assert_eq!(mock.scan_stop_calls(), 0);
    }

    #[tokio::test]
    async fn connect_unknown_device_fails() {
        let mock = Arc::new(MockTransport::new());
        let manager = manager_over(&mock);
        assert_eq!(
            manager.connect_device("no-such-id").await,
            Err(BleError::DeviceNotFound("no-such-id".into()))
        );
    }
}
