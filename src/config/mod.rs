//! Configuration for the payment bridge
//! This module defines and persists the user-tunable session settings.

mod session_config;

pub use session_config::SessionConfig;
