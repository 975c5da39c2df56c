//! Configuration management for `worldsync`
//!
//! Handles loading and validation of application configuration from TOML
//! files.

use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub backtrace: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            backtrace: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSectionConfig {
    /// Chain the world contract lives on
    pub chain_id: u64,
    /// World contract address (hex)
    pub world_address: String,
    /// Path to the world contract ABI, handed to the provider driver
    #[serde(default)]
    pub world_abi_path: Option<String>,
    /// Sync never starts earlier than this block
    #[serde(default)]
    pub initial_block_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SnapshotConfig {
    /// Snapshot service endpoint; empty disables snapshot seeding
    #[serde(default)]
    pub service_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider polling interval in milliseconds
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    /// Batch event queries where the provider supports it
    #[serde(default = "default_batch_events")]
    pub batch_events: bool,
    /// Skip the network preflight check on startup
    #[serde(default)]
    pub skip_network_check: bool,
}

const fn default_polling_interval_ms() -> u64 {
    1000
}

const fn default_batch_events() -> bool {
    true
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            polling_interval_ms: default_polling_interval_ms(),
            batch_events: default_batch_events(),
            skip_network_check: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory for the persistent cache
    #[serde(default = "default_cache_dir")]
    pub dir: String,
    /// Checkpoint cadence in blocks during live sync; zero disables
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,
}

fn default_cache_dir() -> String {
    "cache".to_string()
}

const fn default_checkpoint_interval() -> u64 {
    100
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            checkpoint_interval: default_checkpoint_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub sync: SyncSectionConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// - File I/O errors (file not found, permission denied)
    /// - TOML parsing errors (invalid syntax, missing required fields)
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(crate::WorldSyncError::Io)?;
        let config: Self = toml::from_str(&content).map_err(crate::WorldSyncError::TomlParsing)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default config file path
    ///
    /// # Errors
    /// - No config file found (neither config.toml nor config.example.toml)
    /// - File I/O or TOML parsing errors
    pub fn load() -> crate::Result<Self> {
        if Path::new("config.toml").exists() {
            Self::from_file("config.toml")
        } else if Path::new("config.example.toml").exists() {
            println!(
                "Warning: Using config.example.toml. Please create config.toml for production use."
            );
            Self::from_file("config.example.toml")
        } else {
            Err(crate::WorldSyncError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config file found. Please create config.toml or config.example.toml",
            )))
        }
    }

    fn validate(&self) -> crate::Result<()> {
        if self.sync.world_address.is_empty() {
            return Err(crate::WorldSyncError::ConfigError(
                "sync.world_address must be set".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the chain id
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.sync.chain_id
    }

    /// Get the world contract address
    #[must_use]
    pub fn world_address(&self) -> &str {
        &self.sync.world_address
    }

    /// Get the initial block number floor
    #[must_use]
    pub const fn initial_block_number(&self) -> u64 {
        self.sync.initial_block_number
    }

    /// Get the snapshot service URL, empty when disabled
    #[must_use]
    pub fn snapshot_service_url(&self) -> &str {
        &self.snapshot.service_url
    }

    /// Get the provider polling interval in milliseconds
    #[must_use]
    pub const fn polling_interval_ms(&self) -> u64 {
        self.provider.polling_interval_ms
    }

    /// Get the persistent cache directory
    #[must_use]
    pub fn cache_dir(&self) -> &str {
        &self.cache.dir
    }

    /// Get the checkpoint cadence in blocks
    #[must_use]
    pub const fn checkpoint_interval(&self) -> u64 {
        self.cache.checkpoint_interval
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sync: SyncSectionConfig {
                chain_id: 31337,
                world_address: "0x0000000000000000000000000000000000000000".to_string(),
                world_abi_path: None,
                initial_block_number: 0,
            },
            snapshot: SnapshotConfig::default(),
            provider: ProviderConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parses_with_defaults() {
        let toml = r#"
            [sync]
            chain_id = 4242
            world_address = "0xabcdef"
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.chain_id(), 4242);
        assert_eq!(config.world_address(), "0xabcdef");
        assert_eq!(config.initial_block_number(), 0);
        assert_eq!(config.snapshot_service_url(), "");
        assert_eq!(config.polling_interval_ms(), 1000);
        assert!(config.provider.batch_events);
        assert_eq!(config.checkpoint_interval(), 100);
    }

    #[test]
    fn test_full_config_parses() {
        let toml = r#"
            [sync]
            chain_id = 1
            world_address = "0x1234"
            initial_block_number = 500

            [snapshot]
            service_url = "https://snapshots.example.org"

            [provider]
            polling_interval_ms = 250
            batch_events = false
            skip_network_check = true

            [cache]
            dir = "/var/lib/worldsync"
            checkpoint_interval = 50

            [logging]
            level = "debug"
            backtrace = false
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.initial_block_number(), 500);
        assert_eq!(
            config.snapshot_service_url(),
            "https://snapshots.example.org"
        );
        assert_eq!(config.polling_interval_ms(), 250);
        assert!(config.provider.skip_network_check);
        assert_eq!(config.cache_dir(), "/var/lib/worldsync");
        assert_eq!(config.checkpoint_interval(), 50);
        assert_eq!(config.logging.level, "debug");
    }
}
