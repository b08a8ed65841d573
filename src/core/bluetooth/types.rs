//! Defines shared data structures for the Bluetooth module.

use serde::Serialize;
use uuid::Uuid;

/// Power/availability of the local Bluetooth adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RadioState {
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

/// Represents a peripheral seen during a scan.
///
/// Immutable snapshot: the fields are never updated after discovery.
/// Deduplication by `id` happens in the session layer, not here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredDevice {
    /// Platform-specific unique identifier for the device (especially important on macOS)
    pub id: String,
    /// The name of the device, if available
    pub name: Option<String>,
    /// The signal strength (RSSI) of the device at discovery time
    pub rssi: Option<i16>,
}

impl DiscoveredDevice {
    /// Creates a new DiscoveredDevice instance
    pub fn new(id: String, name: Option<String>, rssi: Option<i16>) -> Self {
        Self { id, name, rssi }
    }
}

/// A discovered GATT service and its characteristics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceDescriptor {
    /// The service UUID
    pub uuid: Uuid,
    /// UUIDs of the characteristics under this service, in discovery order
    pub characteristics: Vec<Uuid>,
}
