//! # Floor Configuration
//!
//! Engine settings: database location, reservation window, and the
//! concurrency knobs (retries, backoff, lock timeout).
//!
//! ## Configuration Sources (Priority Order)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Loading                                │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FLOOR_DB_PATH, FLOOR_MAX_CONNECTIONS,                              │
//! │     FLOOR_RESERVATION_WINDOW_MINUTES, FLOOR_MAX_RETRIES,               │
//! │     FLOOR_LOCK_TIMEOUT_MS                                              │
//! │                                                                         │
//! │  2. Config File (floor.toml)                                           │
//! │     ~/.config/floor-pos/floor.toml (Linux)                             │
//! │     ~/Library/Application Support/com.floor.floor-pos/ (macOS)        │
//! │     %APPDATA%\floor\floor-pos\config\ (Windows)                       │
//! │                                                                         │
//! │  3. Defaults (lowest priority)                                         │
//! │     window 90 min, 3 retries, 5 s lock timeout                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example floor.toml
//! ```toml
//! [database]
//! path = "/var/lib/floor/floor.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [reservations]
//! window_minutes = 90
//! default_status = "confirmed"
//!
//! [concurrency]
//! max_retries = 3
//! initial_backoff_ms = 20
//! max_backoff_ms = 500
//! lock_timeout_ms = 5000
//! ```

use std::path::PathBuf;
use std::time::Duration;

use floor_core::{
    ReservationStatus, DEFAULT_RESERVATION_WINDOW_MINUTES, MAX_RESERVATION_WINDOW_MINUTES,
};
use floor_db::DbConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{FloorError, FloorResult};

// =============================================================================
// Database Settings
// =============================================================================

/// Where the floor database lives and how the pool is sized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long SQLite waits on a locked database before reporting busy.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "floor", "floor-pos")
        .map(|dirs| dirs.data_dir().join("floor.db"))
        .unwrap_or_else(|| PathBuf::from("floor.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

// =============================================================================
// Reservation Settings
// =============================================================================

/// How bookings are judged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSettings {
    /// Length of the block one reservation holds its table for.
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,

    /// Status given to a new reservation that does not ask for one.
    #[serde(default = "default_reservation_status", with = "status_serde")]
    pub default_status: ReservationStatus,
}

fn default_window_minutes() -> i64 {
    DEFAULT_RESERVATION_WINDOW_MINUTES
}

fn default_reservation_status() -> ReservationStatus {
    ReservationStatus::Confirmed
}

impl Default for ReservationSettings {
    fn default() -> Self {
        ReservationSettings {
            window_minutes: default_window_minutes(),
            default_status: default_reservation_status(),
        }
    }
}

/// Reads and writes reservation statuses as lowercase words in config files.
mod status_serde {
    use floor_core::ReservationStatus;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(status: &ReservationStatus, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&status.as_str().to_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<ReservationStatus, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Concurrency Settings
// =============================================================================

/// Retry and lock-wait limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencySettings {
    /// Retries after the first attempt before a conflict is surfaced.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// How long an operation waits for its table and stock locks.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    20
}

fn default_max_backoff_ms() -> u64 {
    500
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        ConcurrencySettings {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl ConcurrencySettings {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FloorConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub reservations: ReservationSettings,

    #[serde(default)]
    pub concurrency: ConcurrencySettings,
}

impl FloorConfig {
    /// Loads configuration from file and environment.
    ///
    /// ## Loading Order
    /// 1. Start with defaults
    /// 2. Merge config file (if exists)
    /// 3. Override with environment variables
    /// 4. Validate
    pub fn load(config_path: Option<PathBuf>) -> FloorResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading floor config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load floor config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Validates the configuration.
    pub fn validate(&self) -> FloorResult<()> {
        if self.database.max_connections == 0 {
            return Err(FloorError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if !(1..=MAX_RESERVATION_WINDOW_MINUTES).contains(&self.reservations.window_minutes) {
            return Err(FloorError::InvalidConfig(format!(
                "reservations.window_minutes must be between 1 and {}, got {}",
                MAX_RESERVATION_WINDOW_MINUTES, self.reservations.window_minutes
            )));
        }

        // A new booking cannot start out closed.
        if self.reservations.default_status.is_terminal() {
            return Err(FloorError::InvalidConfig(format!(
                "reservations.default_status must be confirmed or pending, got {}",
                self.reservations.default_status
            )));
        }

        if self.concurrency.initial_backoff_ms > self.concurrency.max_backoff_ms {
            return Err(FloorError::InvalidConfig(
                "concurrency.initial_backoff_ms exceeds max_backoff_ms".into(),
            ));
        }

        if self.concurrency.lock_timeout_ms == 0 {
            return Err(FloorError::InvalidConfig(
                "concurrency.lock_timeout_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("FLOOR_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("FLOOR_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid FLOOR_MAX_CONNECTIONS"),
            }
        }

        if let Ok(minutes) = std::env::var("FLOOR_RESERVATION_WINDOW_MINUTES") {
            match minutes.parse::<i64>() {
                Ok(n) => {
                    debug!(minutes = n, "Overriding reservation window from environment");
                    self.reservations.window_minutes = n;
                }
                Err(_) => {
                    warn!(value = %minutes, "Ignoring invalid FLOOR_RESERVATION_WINDOW_MINUTES")
                }
            }
        }

        if let Ok(retries) = std::env::var("FLOOR_MAX_RETRIES") {
            if let Ok(n) = retries.parse::<u32>() {
                self.concurrency.max_retries = n;
            }
        }

        if let Ok(timeout) = std::env::var("FLOOR_LOCK_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse::<u64>() {
                self.concurrency.lock_timeout_ms = ms;
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "floor", "floor-pos")
            .map(|dirs| dirs.config_dir().join("floor.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Pool configuration for the configured database file.
    pub fn to_db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    /// Returns the reservation window in minutes.
    pub fn window_minutes(&self) -> i64 {
        self.reservations.window_minutes
    }
}
