//! Constants used throughout the application
//! This module contains the constant values used in the application,
//! such as UUIDs and default configuration values.

use uuid::Uuid;

/// The UUID of the demo payment service exposed by the terminal
pub const UUID_PAYMENT_SERVICE: Uuid = Uuid::from_u128(0x0000fff0_0000_1000_8000_00805f9b34fb);

/// The UUID of the characteristic amounts are written to
pub const UUID_AMOUNT_CHAR: Uuid = Uuid::from_u128(0x0000fff1_0000_1000_8000_00805f9b34fb);

/// The UUID of the characteristic the remaining balance is read from
pub const UUID_BALANCE_CHAR: Uuid = Uuid::from_u128(0x0000fff2_0000_1000_8000_00805f9b34fb);

/// Default per-operation timeout in seconds (0 = wait indefinitely)
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 0;

/// How long to wait for the adapter to report availability when
/// querying the radio state, in seconds
pub const RADIO_STATE_QUERY_TIMEOUT_SECS: u64 = 2;
