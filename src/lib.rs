//! BLE payment bridge library
//! This is the core library for the BLE payment bridge application:
//! a Bluetooth Low Energy central-role session for a point-of-sale
//! style payment exchange. It scans for peripherals, connects,
//! discovers GATT services and performs balance read / amount write
//! operations with optimistic local balance bookkeeping.
//!
//! Presentation layers hold a [`session::PaymentSession`] and render
//! its [`session::SessionState`] snapshots.

// Module declarations
pub mod config;
pub mod core;
pub mod logging;
pub mod session;

pub use config::SessionConfig;
pub use core::bluetooth::{
    BleError, BleManager, BluestTransport, DiscoveredDevice, RadioState, ServiceDescriptor,
    Transport,
};
pub use session::{PaymentSession, SessionState};
