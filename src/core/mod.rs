//! Core functionality for the BLE payment bridge
//! This module contains the core functionality for talking to the
//! payment terminal over Bluetooth Low Energy.

pub mod bluetooth;

// Re-export commonly used types
pub use bluetooth::{BleManager, BluestTransport, Transport};
