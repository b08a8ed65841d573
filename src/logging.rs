//! Logging setup for the payment bridge.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes the env_logger backend. Safe to call more than once;
/// only the first call takes effect.
pub fn init() {
    INIT.call_once(|| {
        env_logger::Builder::from_default_env()
            .format_timestamp_millis()
            .init();
        log::info!("Logging initialized");
    });
}
