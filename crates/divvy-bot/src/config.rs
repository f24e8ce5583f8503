//! Configuration management for Divvy.
//!
//! Loads configuration from ${DIVVY_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Telegram transport configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token for the Telegram API.
    pub bot_token: Option<String>,
}

/// Chunked delivery tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Hard per-message length limit of the transport.
    pub max_length: usize,
    /// Pacing delay between chunks of one message, in milliseconds.
    pub inter_chunk_delay_ms: u64,
    /// Pacing delay between recipients during a digest broadcast.
    pub broadcast_delay_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_length: 4096,
            inter_chunk_delay_ms: 500,
            broadcast_delay_ms: 35,
        }
    }
}

impl DeliveryConfig {
    pub fn inter_chunk_delay(&self) -> Duration {
        Duration::from_millis(self.inter_chunk_delay_ms)
    }

    pub fn broadcast_delay(&self) -> Duration {
        Duration::from_millis(self.broadcast_delay_ms)
    }
}

/// Yubico OTP validation service credentials.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct YubicoConfig {
    pub client_id: Option<String>,
    pub secret_key: Option<String>,
}

/// Daily digest scheduling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// Hour of day (UTC) after which the daily broadcast fires.
    pub hour_utc: u32,
    /// How often the scheduler checks whether the digest is due, seconds.
    pub poll_interval_secs: u64,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            hour_utc: 13,
            poll_interval_secs: 60,
        }
    }
}

impl DigestConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where users register their YubiKey and build their dashboard.
    pub dashboard_signup_url: String,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub yubico: YubicoConfig,

    #[serde(default)]
    pub digest: DigestConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dashboard_signup_url: "https://dashboard.learningis1.st/signup".to_string(),
            telegram: TelegramConfig::default(),
            delivery: DeliveryConfig::default(),
            yubico: YubicoConfig::default(),
            digest: DigestConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }
}

pub mod paths {
    //! Path resolution for Divvy configuration and data directories.
    //!
    //! DIVVY_HOME resolution order:
    //! 1. DIVVY_HOME environment variable (if set)
    //! 2. ~/.config/divvy (default)

    use std::path::PathBuf;

    /// Returns the Divvy home directory.
    pub fn divvy_home() -> PathBuf {
        if let Ok(home) = std::env::var("DIVVY_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|home| home.join(".config").join("divvy"))
            .expect("Could not determine home directory")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        divvy_home().join("config.toml")
    }

    /// Returns the path to the subscriber store.
    pub fn subscribers_path() -> PathBuf {
        divvy_home().join("subscribers.json")
    }

    /// Returns the dashboard data drop directory.
    pub fn dashboard_dir() -> PathBuf {
        divvy_home().join("dashboard")
    }
}
