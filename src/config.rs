//! Panel configuration using Figment.
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. `config/laser_panel.toml` (or a path given on the command line)
//! 3. Environment variables prefixed with `LASER_PANEL_`, nested with `__`
//!
//! # Example
//! ```no_run
//! use laser_panel::config::PanelConfig;
//!
//! let config = PanelConfig::load()?;
//! println!("Status poll every {:?}", config.polling.status_interval());
//! # Ok::<(), laser_panel::error::PanelError>(())
//! ```
//!
//! Environment override: `LASER_PANEL_POLLING__STATUS_INTERVAL_MS=2000`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{PanelError, PanelResult};
use crate::logging::OutputFormat;
use crate::mock::MockLaserConfig;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/laser_panel.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "LASER_PANEL_";

/// Top-level panel configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Polling cadences
    pub polling: PollingConfig,
    /// Display formatting
    pub display: DisplayConfig,
    /// Simulated controller used by the `simulate` host
    pub simulation: MockLaserConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Window / application title
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: OutputFormat,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Spectra-Physics Laser Control".to_string(),
            log_level: "info".to_string(),
            log_format: OutputFormat::Compact,
        }
    }
}

/// Polling cadences for the two refresh paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Status / toggle-state poll interval in milliseconds
    pub status_interval_ms: u64,
    /// Telemetry / display refresh interval in milliseconds
    pub display_interval_ms: u64,
    /// Upper bound for a single poll or refresh tick (unset = wait forever)
    pub call_timeout_ms: Option<u64>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            status_interval_ms: 1000,
            display_interval_ms: 500,
            call_timeout_ms: None,
        }
    }
}

impl PollingConfig {
    /// Status poll interval.
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    /// Display refresh interval.
    pub fn display_interval(&self) -> Duration {
        Duration::from_millis(self.display_interval_ms)
    }

    /// Per-tick timeout, if bounded.
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

/// Display formatting options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Characters of the history buffer to show (32 = last eight status codes)
    pub history_chars: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { history_chars: 32 }
    }
}

impl PanelConfig {
    /// Load configuration from the default file and environment variables
    pub fn load() -> PanelResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> PanelResult<Self> {
        let config: PanelConfig = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(PanelConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> PanelResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(PanelError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.polling.status_interval_ms == 0 {
            return Err(PanelError::Configuration(
                "polling.status_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.polling.display_interval_ms == 0 {
            return Err(PanelError::Configuration(
                "polling.display_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.polling.call_timeout_ms == Some(0) {
            return Err(PanelError::Configuration(
                "polling.call_timeout_ms must be greater than 0 when set".to_string(),
            ));
        }

        if self.display.history_chars == 0 {
            return Err(PanelError::Configuration(
                "display.history_chars must be greater than 0".to_string(),
            ));
        }

        self.simulation
            .validate()
            .map_err(|e| PanelError::Configuration(format!("simulation: {}", e)))?;

        Ok(())
    }
}
