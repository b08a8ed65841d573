use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

use crate::core::bluetooth::{UUID_AMOUNT_CHAR, UUID_BALANCE_CHAR, UUID_PAYMENT_SERVICE};

const CONFIG_FILE_NAME: &str = "session_config.json";
const CONFIG_DIR_NAME: &str = "ble-payment-bridge";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Per-operation timeout in seconds. 0 waits indefinitely, matching
    /// the transport's own behaviour.
    pub operation_timeout_secs: u64,

    /// Advertisements below this RSSI are dropped before they reach the
    /// session. `None` keeps every advertising peripheral. The filter
    /// is applied by the transport: `PaymentSession::with_bluest` wires
    /// it automatically, while embedders building a transport directly
    /// must hand it to `BluestTransport::new`.
    pub min_rssi: Option<i16>,

    /// Service the payment characteristics live under.
    pub payment_service: Uuid,

    /// Characteristic stringified amounts are written to.
    pub amount_characteristic: Uuid,

    /// Characteristic the stringified balance is read from.
    pub balance_characteristic: Uuid,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            operation_timeout_secs: crate::core::bluetooth::DEFAULT_OPERATION_TIMEOUT_SECS,
            min_rssi: None,
            payment_service: UUID_PAYMENT_SERVICE,
            amount_characteristic: UUID_AMOUNT_CHAR,
            balance_characteristic: UUID_BALANCE_CHAR,
        }
    }
}

impl SessionConfig {
    /// The configured per-operation bound, or `None` for no bound.
    pub fn operation_timeout(&self) -> Option<Duration> {
        (self.operation_timeout_secs > 0).then(|| Duration::from_secs(self.operation_timeout_secs))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("no config directory available")?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the config from the configuration file, falling back to
    /// defaults when the file does not exist.
    pub async fn load() -> Result<Self> {
        let file_path = Self::config_path()?;
        if !file_path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(&file_path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", file_path);
        Ok(config)
    }

    /// Saves the current config to the configuration file.
    pub async fn save(&self) -> Result<()> {
        let file_path = Self::config_path()?;
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create config directory {parent:?}"))?;
        }

        let config_json = serde_json::to_string_pretty(self)?;
        fs::write(&file_path, config_json).await?;

        info!("Session config saved to {:?}.", file_path);
        Ok(())
    }
}
