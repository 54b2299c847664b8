//! Configuration System using Figment
//!
//! Configuration is layered, lowest to highest precedence:
//! 1. Built-in defaults (the lab instrument address, 5 s timeout, `\n` terminators)
//! 2. A TOML file (default: `config/tunable_laser.toml`, optional)
//! 3. Environment variables prefixed with `TUNABLE_LASER_`
//!
//! # Environment Variable Overrides
//!
//! Nested keys are separated by a double underscore:
//!
//! ```text
//! TUNABLE_LASER_APPLICATION__LOG_LEVEL=debug
//! TUNABLE_LASER_CONNECTION__RESOURCE="TCPIP0::192.168.1.20::5025::SOCKET"
//! TUNABLE_LASER_CONNECTION__TIMEOUT_MS=2000
//! ```
//!
//! # Example
//!
//! ```no_run
//! use tunable_laser::config::LaserConfig;
//!
//! let config = LaserConfig::load()?;
//! println!("Resource: {}", config.connection.resource);
//! # Ok::<(), tunable_laser::error::LaserError>(())
//! ```

use crate::adapters::SessionSettings;
use crate::error::{AppResult, LaserError};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Address of the laser on the lab network.
///
/// The instrument is USB attached but its firmware exposes a TCP/IP emulated
/// resource. The resource name reported by discovery embeds the model name
/// (`TCPIP0::K-N7778C-00303::inst0::INSTR`) and cannot be opened; the IP form can.
pub const DEFAULT_RESOURCE: &str = "TCPIP0::100.65.25.37::inst0::INSTR";

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/tunable_laser.toml";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "TUNABLE_LASER_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaserConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Instrument session settings
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Instrument session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// VISA resource string
    #[serde(default = "default_resource")]
    pub resource: String,
    /// I/O timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Terminator stripped from responses
    #[serde(default = "default_terminator")]
    pub read_terminator: String,
    /// Terminator appended to commands
    #[serde(default = "default_terminator")]
    pub write_terminator: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_resource() -> String {
    DEFAULT_RESOURCE.to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_terminator() -> String {
    "\n".to_string()
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            resource: default_resource(),
            timeout_ms: default_timeout_ms(),
            read_terminator: default_terminator(),
            write_terminator: default_terminator(),
        }
    }
}

impl ConnectionConfig {
    /// Transport settings derived from this configuration.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            timeout: Duration::from_millis(self.timeout_ms),
            read_terminator: self.read_terminator.clone(),
            write_terminator: self.write_terminator.clone(),
        }
    }
}

impl LaserConfig {
    /// Load configuration from the default file and the environment.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path, then validate it.
    ///
    /// # Errors
    ///
    /// Returns `LaserError::Config` if a source cannot be parsed and
    /// `LaserError::Configuration` if validation fails.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// The layered provider stack, exposed for callers that merge further sources.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(LaserConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - Resource string is not empty
    /// - Timeout is non-zero
    /// - Terminators are not empty
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(LaserError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.connection.resource.trim().is_empty() {
            return Err(LaserError::Configuration(
                "'connection.resource' cannot be empty".to_string(),
            ));
        }

        if self.connection.timeout_ms == 0 {
            return Err(LaserError::Configuration(
                "'connection.timeout_ms' must be greater than zero".to_string(),
            ));
        }

        if self.connection.read_terminator.is_empty() || self.connection.write_terminator.is_empty()
        {
            return Err(LaserError::Configuration(
                "terminators cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
