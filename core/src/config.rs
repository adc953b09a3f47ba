//! Hostel configuration loading
//!
//! Loads configuration from `~/.config/hostel/hostel.toml` (or the path in
//! `HOSTEL_CONFIG`, or an explicit path from the command line). Every key
//! has a default, so an absent file yields a working configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{HostelError, Result};

/// Root configuration for the hostel back office
#[derive(Debug, Deserialize, Clone)]
pub struct HostelConfig {
    /// Path to the SQLite database
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Maximum pooled SQLite connections
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub penalties: PenaltyConfig,

    #[serde(default)]
    pub fees: FeeConfig,

    #[serde(default)]
    pub students: StudentConfig,
}

fn default_db_path() -> String {
    dirs::home_dir()
        .map(|h| {
            h.join(".local")
                .join("share")
                .join("hostel")
                .join("hostel.db")
                .to_string_lossy()
                .into_owned()
        })
        .unwrap_or_else(|| "hostel.db".to_string())
}

fn default_pool_size() -> u32 {
    8
}

/// HTTP front end settings
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Listen address, `host:port`
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Request worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_workers() -> usize {
    4
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            workers: default_workers(),
        }
    }
}

/// What attendance marking does to an existing night-shift penalty when the
/// night shift is recorded as Absent, Holiday or Leave.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NightPenaltyPolicy {
    /// Leave the penalty as it is
    #[default]
    Keep,
    /// Remove it, as for a Null night shift
    Clear,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PenaltyConfig {
    /// Amount charged for a night-shift penalty
    #[serde(default = "default_night_shift_amount")]
    pub night_shift_amount: i64,

    #[serde(default)]
    pub night_policy: NightPenaltyPolicy,
}

fn default_night_shift_amount() -> i64 {
    500
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            night_shift_amount: default_night_shift_amount(),
            night_policy: NightPenaltyPolicy::default(),
        }
    }
}

/// Room application fees
#[derive(Debug, Deserialize, Clone)]
pub struct FeeConfig {
    #[serde(default = "default_single_room_fee")]
    pub single_room: i64,

    /// Charged for every non-single room type
    #[serde(default = "default_shared_room_fee")]
    pub shared_room: i64,
}

fn default_single_room_fee() -> i64 {
    15000
}
fn default_shared_room_fee() -> i64 {
    7000
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            single_room: default_single_room_fee(),
            shared_room: default_shared_room_fee(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StudentConfig {
    /// Days a newly registered student has to apply for a room
    #[serde(default = "default_room_application_window_days")]
    pub room_application_window_days: i64,
}

fn default_room_application_window_days() -> i64 {
    7
}

impl Default for StudentConfig {
    fn default() -> Self {
        Self {
            room_application_window_days: default_room_application_window_days(),
        }
    }
}

impl Default for HostelConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            pool_size: default_pool_size(),
            server: ServerConfig::default(),
            penalties: PenaltyConfig::default(),
            fees: FeeConfig::default(),
            students: StudentConfig::default(),
        }
    }
}

impl HostelConfig {
    /// Environment variable for config path override
    pub const ENV_CONFIG_PATH: &'static str = "HOSTEL_CONFIG";

    /// Default config filename
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "hostel.toml";

    /// Load configuration
    ///
    /// Resolution order:
    /// 1. `explicit` (the `--config` flag); must exist
    /// 2. `HOSTEL_CONFIG` environment variable
    /// 3. `~/.config/hostel/hostel.toml`
    ///
    /// A missing file in 2 or 3 yields the default configuration.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        let path = Self::resolve_config_path();
        if !path.exists() {
            tracing::info!(
                path = %path.display(),
                "hostel config not found, using defaults"
            );
            return Ok(Self::default());
        }

        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            HostelError::config_with_source(
                format!("failed to read config at {}", path.display()),
                e,
            )
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: HostelConfig = toml::from_str(contents)
            .map_err(|e| HostelError::config_with_source("failed to parse config", e))?;

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
                    .join("hostel")
                    .join(Self::DEFAULT_CONFIG_FILENAME)
            })
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_FILENAME))
    }

    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(HostelError::config("pool_size must be at least 1"));
        }
        if self.server.workers == 0 {
            return Err(HostelError::config("server.workers must be at least 1"));
        }
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(HostelError::config(format!(
                "server.bind '{}' is not a host:port address",
                self.server.bind
            )));
        }
        if self.penalties.night_shift_amount <= 0 {
            return Err(HostelError::config("penalties.night_shift_amount must be positive"));
        }
        if self.fees.single_room <= 0 || self.fees.shared_room <= 0 {
            return Err(HostelError::config("fees must be positive"));
        }
        if self.students.room_application_window_days < 0 {
            tracing::warn!(
                days = self.students.room_application_window_days,
                "negative room application window; every student dashboard will show 0 days left"
            );
        }
        Ok(())
    }

    /// Get the resolved database path (expanding ~ if needed)
    pub fn resolved_db_path(&self) -> PathBuf {
        let path = &self.db_path;
        if let Some(stripped) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(stripped);
        }
        PathBuf::from(path)
    }
}
