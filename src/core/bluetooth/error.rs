//! Error taxonomy for the Bluetooth session layers.
//!
//! Every failure surfaced to the presentation layer carries a
//! distinguishable kind so callers can branch without matching on
//! message text. The `Display` strings are the user-facing messages.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::core::bluetooth::types::RadioState;

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum BleError {
    #[error("BLE not available. Please enable Bluetooth (radio state: {0:?})")]
    RadioUnavailable(RadioState),

    #[error("Scan error: {0}")]
    ScanFailure(String),

    #[error("Failed to connect to {device_id}: {reason}")]
    ConnectionFailure { device_id: String, reason: String },

    #[error("Device not found with ID: {0}")]
    DeviceNotFound(String),

    #[error("Service {0} not found")]
    ServiceNotFound(Uuid),

    #[error("Characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    #[error("Failed to write data: {0}")]
    WriteFailure(String),

    #[error("Failed to read data: {0}")]
    ReadFailure(String),

    #[error("Balance payload is not a number: {0:?}")]
    ParseFailure(String),

    #[error("No device connected")]
    NoActiveConnection,

    #[error("Another connection operation is in progress")]
    OperationInFlight,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),
}
