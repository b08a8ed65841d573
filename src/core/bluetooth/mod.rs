//! Bluetooth functionality for the payment bridge
//! This module handles all bluetooth operations including scanning,
//! connecting, and exchanging payment payloads with the terminal.

mod codec;
mod constants;
mod error;
mod manager;
mod scanner;
mod transport;
mod types;

#[cfg(test)]
pub(crate) mod mock;

// Re-export types that should be publicly accessible
pub use constants::*; // Re-export all constants
pub use error::BleError;
pub use manager::BleManager;
pub use transport::{BluestTransport, DeviceCallback, ErrorCallback, Transport};
pub use types::{DiscoveredDevice, RadioState, ServiceDescriptor};
