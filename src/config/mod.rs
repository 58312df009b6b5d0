//! # Configuration Management Module
//!
//! Client settings for the mudlink session engine, loaded from a TOML file.
//!
//! ## Configuration Structure
//!
//! - [`SessionConfig`] - Display log cap, staleness window, conversation history cap, password rules
//! - [`AudioConfig`] - Ambient playback defaults
//! - [`WorldConfig`] - Location of the JSON world seed used by the local backend
//! - [`LoggingConfig`] - Log level and optional log files
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mudlink::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Display cap: {}", config.session.display_cap);
//!     Config::create_default("config.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [session]
//! display_cap = 300
//! staleness_tolerance_ms = 10000
//! conversation_history_cap = 20
//!
//! [audio]
//! enabled = true
//! volume = 0.6
//!
//! [world]
//! file = "world.json"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every section is optional; missing fields fall back to the defaults above.

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of display lines kept; oldest are evicted first.
    #[serde(default = "default_display_cap")]
    pub display_cap: usize,
    /// Grace window before the subscription start time inside which events are still accepted.
    #[serde(default = "default_staleness_tolerance_ms")]
    pub staleness_tolerance_ms: u64,
    /// Number of dialogue turns kept (and sent) while talking to an NPC.
    #[serde(default = "default_conversation_history_cap")]
    pub conversation_history_cap: usize,
    /// Placeholder echoed instead of input typed during password steps.
    #[serde(default = "default_password_mask")]
    pub password_mask: String,
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
}

fn default_display_cap() -> usize {
    300
}

fn default_staleness_tolerance_ms() -> u64 {
    10_000
}

fn default_conversation_history_cap() -> usize {
    20
}

fn default_password_mask() -> String {
    "********".to_string()
}

fn default_min_password_len() -> usize {
    6
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display_cap: default_display_cap(),
            staleness_tolerance_ms: default_staleness_tolerance_ms(),
            conversation_history_cap: default_conversation_history_cap(),
            password_mask: default_password_mask(),
            min_password_len: default_min_password_len(),
        }
    }
}

impl SessionConfig {
    pub fn staleness_tolerance(&self) -> Duration {
        Duration::from_millis(self.staleness_tolerance_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Whether ambient playback starts enabled.
    #[serde(default = "default_audio_enabled")]
    pub enabled: bool,
    /// Output volume in `0.0..=1.0`.
    #[serde(default = "default_volume")]
    pub volume: f32,
}

fn default_audio_enabled() -> bool {
    true
}

fn default_volume() -> f32 {
    0.6
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: default_audio_enabled(),
            volume: default_volume(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    pub file: String,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            file: "world.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level (`error`, `warn`, `info`, `debug`, `trace`, `off`) when no `-v` is given.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub security_file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// The configured level as a filter; unrecognised names fall back to `info`.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level
            .trim()
            .parse()
            .unwrap_or(log::LevelFilter::Info)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: Some("mudlink.log".to_string()),
            security_file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;
        config.validate()?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.session.display_cap == 0 {
            bail!("session.display_cap must be at least 1");
        }
        if self.session.conversation_history_cap == 0 {
            bail!("session.conversation_history_cap must be at least 1");
        }
        if self.session.password_mask.is_empty() {
            bail!("session.password_mask must not be empty");
        }
        if !(0.0..=1.0).contains(&self.audio.volume) {
            bail!("audio.volume must be between 0.0 and 1.0");
        }
        if self.logging.level.trim().parse::<log::LevelFilter>().is_err() {
            bail!("logging.level '{}' is not a log level", self.logging.level);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.session.display_cap, 300);
        assert_eq!(
            config.session.staleness_tolerance(),
            Duration::from_secs(10)
        );
        assert_eq!(config.session.conversation_history_cap, 20);
        assert!(config.audio.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str("[session]\ndisplay_cap = 50\n").unwrap();
        assert_eq!(config.session.display_cap, 50);
        assert_eq!(config.session.conversation_history_cap, 20);
        assert_eq!(config.world.file, "world.json");
    }

    #[test]
    fn rejects_out_of_range_volume() {
        let mut config = Config::default();
        config.audio.volume = 1.5;
        assert!(config.validate().is_err());
        config.audio.volume = 0.2;
        config.session.display_cap = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn logging_level_parses_and_is_validated() {
        let config: Config = toml::from_str("[logging]\nlevel = \"DEBUG\"\n").unwrap();
        assert_eq!(config.logging.level_filter(), log::LevelFilter::Debug);
        assert!(config.validate().is_ok());

        let config: Config = toml::from_str("[logging]\nfile = \"x.log\"\n").unwrap();
        assert_eq!(config.logging.level_filter(), log::LevelFilter::Info);

        let mut config = Config::default();
        config.logging.level = "chatty".into();
        assert_eq!(config.logging.level_filter(), log::LevelFilter::Info);
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let serialized = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(serialized.contains("[session]"));
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.session.password_mask, "********");
    }
}
