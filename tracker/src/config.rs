//! Tracker configuration loading
//!
//! Loads configuration from `~/.config/grants-tracker/tracker.toml` (or the
//! `GRANTS_TRACKER_CONFIG` env var). Every field has a default, so a missing
//! file yields a usable configuration.

use crate::errors::{Result, TrackerError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for the grant tracker
#[derive(Debug, Deserialize, Clone)]
pub struct TrackerConfig {
    /// Path to the SQLite database, or `:memory:`
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Store connection settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Default look-ahead windows for the agenda queries
    #[serde(default)]
    pub windows: WindowConfig,
}

fn default_db_path() -> String {
    dirs::home_dir()
        .map(|h| {
            h.join(".config")
                .join("grants-tracker")
                .join("grants.db")
                .to_string_lossy()
                .into_owned()
        })
        .unwrap_or_else(|| "grants.db".to_string())
}

/// Store connection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// How long a write waits on a locked database before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Look-ahead windows used by `GrantTracker::agenda`
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct WindowConfig {
    /// Days ahead to scan for application deadlines
    #[serde(default = "default_deadline_days")]
    pub deadline_days: u32,

    /// Calendar months ahead to scan for reporting dates
    #[serde(default = "default_reporting_months")]
    pub reporting_months: u32,
}

fn default_deadline_days() -> u32 {
    30
}
fn default_reporting_months() -> u32 {
    3
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            deadline_days: default_deadline_days(),
            reporting_months: default_reporting_months(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            store: StoreConfig::default(),
            windows: WindowConfig::default(),
        }
    }
}

/// Where the store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    InMemory,
}

impl StoreLocation {
    /// Marker selecting a private in-memory database
    pub const IN_MEMORY_MARKER: &'static str = ":memory:";

    pub fn parse(raw: &str) -> Self {
        if raw == Self::IN_MEMORY_MARKER {
            return Self::InMemory;
        }
        if let Some(stripped) = raw.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return Self::File(home.join(stripped));
        }
        Self::File(PathBuf::from(raw))
    }

    pub fn display(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::InMemory => Self::IN_MEMORY_MARKER.to_string(),
        }
    }
}

impl TrackerConfig {
    /// Environment variable for config path override
    pub const ENV_CONFIG_PATH: &'static str = "GRANTS_TRACKER_CONFIG";

    /// Default config filename
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "tracker.toml";

    /// Configuration pointing at a specific store, defaults elsewhere
    pub fn with_db_path(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }

    /// Load configuration from file
    ///
    /// Resolution order:
    /// 1. `GRANTS_TRACKER_CONFIG` environment variable
    /// 2. `~/.config/grants-tracker/tracker.toml`
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let path = Self::resolve_config_path();

        if !path.exists() {
            tracing::info!(
                path = %path.display(),
                "Tracker config not found, using defaults"
            );
            return Ok(Self::default());
        }

        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TrackerError::config_with_source(
                format!("failed to read config at {}", path.display()),
                e,
            )
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: TrackerConfig = toml::from_str(contents)
            .map_err(|e| TrackerError::config_with_source("failed to parse config", e))?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve_config_path() -> PathBuf {
        if let Ok(path) = std::env::var(Self::ENV_CONFIG_PATH) {
            return PathBuf::from(path);
        }

        dirs::home_dir()
            .map(|h| {
                h.join(".config")
                    .join("grants-tracker")
                    .join(Self::DEFAULT_CONFIG_FILENAME)
            })
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_FILENAME))
    }

    fn validate(&self) -> Result<()> {
        if self.db_path.trim().is_empty() {
            return Err(TrackerError::config("db_path must not be empty"));
        }
        if self.windows.deadline_days == 0 || self.windows.reporting_months == 0 {
            return Err(TrackerError::config(
                "agenda windows must cover at least one day and one month",
            ));
        }
        if self.store.busy_timeout_ms == 0 {
            tracing::warn!("busy_timeout_ms is 0; concurrent writers will fail immediately");
        }
        Ok(())
    }

    /// Get the resolved store location (expanding ~ if needed)
    pub fn store_location(&self) -> StoreLocation {
        StoreLocation::parse(&self.db_path)
    }
}
