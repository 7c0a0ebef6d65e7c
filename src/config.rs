//! Storage Manager configuration management

use crate::error::{Error, Result};
use crate::lifecycle::INVENTORY_TO_STORAGE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main Storage Manager configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageManagerConfig {
    /// Storage configuration
    pub storage: StorageConfig,

    /// HTTP gateway configuration
    pub gateway: GatewayConfig,

    /// Inventory messaging configuration
    pub messaging: MessagingConfig,
}

impl StorageManagerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Cannot parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.folder.as_os_str().is_empty() {
            return Err(Error::Config("storage.folder must not be empty".to_string()));
        }
        if self.storage.default_chart.as_os_str().is_empty() {
            return Err(Error::Config(
                "storage.default_chart must not be empty".to_string(),
            ));
        }
        if self.messaging.queue.trim().is_empty() {
            return Err(Error::Config("messaging.queue must not be empty".to_string()));
        }
        if self.messaging.capacity == 0 {
            return Err(Error::Config(
                "messaging.capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the artifact store
    pub folder: PathBuf,

    /// Image served when a trading system has no equity chart
    pub default_chart: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let folder = dirs_next::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("storage-manager");

        Self {
            folder,
            default_chart: PathBuf::from("default").join("equity-chart.png"),
        }
    }
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8480,
        }
    }
}

/// Inventory messaging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Queue the lifecycle listener consumes
    pub queue: String,

    /// Delay before a rejected message is delivered again
    pub redelivery_delay_ms: u64,

    /// Maximum number of queued messages
    pub capacity: usize,
}

impl MessagingConfig {
    pub fn redelivery_delay(&self) -> Duration {
        Duration::from_millis(self.redelivery_delay_ms)
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            queue: INVENTORY_TO_STORAGE.to_string(),
            redelivery_delay_ms: 1000,
            capacity: 1024,
        }
    }
}
