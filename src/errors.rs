use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorldSyncError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Transient fetch error: {0}")]
    TransientFetch(String),

    #[error("Fatal sync error: {0}")]
    Fatal(String),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Invalid block range: from {from} > to {to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl WorldSyncError {
    /// Whether a retry may succeed. Exhausted retries escalate to `Fatal`.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFetch(_) | Self::Reqwest(_))
    }
}

impl From<&str> for WorldSyncError {
    fn from(msg: &str) -> Self {
        Self::Custom(msg.to_string())
    }
}

impl From<String> for WorldSyncError {
    fn from(msg: String) -> Self {
        Self::Custom(msg)
    }
}

pub type Result<T> = std::result::Result<T, WorldSyncError>;
