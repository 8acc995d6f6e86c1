//! # Service Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FISCAL_BRAND=hasar                                                 │
//! │     FISCAL_PORT=COM2                                                   │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     path given on the command line, else ./fiscal.toml,                │
//! │     else ~/.config/fiscal-controller/fiscal.toml (Linux)               │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     epson 320 on the first serial port                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # fiscal.toml
//! [controller]
//! brand = "epson"
//! model = "320"
//! port = "COM2"        # serial device, TCP port number, or "dummy"
//! # host = "10.0.0.5"  # set to reach the printer through a TCP proxy
//! speed = 9600
//! strict = false
//!
//! [server]
//! bind_addr = "127.0.0.1"
//! port = 8770
//! http = true
//! ws = true
//! ```

use std::path::{Path, PathBuf};

use fiscal_core::driver::DEFAULT_SPEED;
use fiscal_core::ConnectParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// File name looked up when no path is given.
pub const CONFIG_FILE_NAME: &str = "fiscal.toml";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Controller Settings
// =============================================================================

/// Which printer to connect to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// Driver brand.
    #[serde(default = "default_brand")]
    pub brand: String,

    /// Printer model.
    #[serde(default = "default_model")]
    pub model: String,

    /// Serial device, TCP port number, or "dummy".
    #[serde(default = "default_port")]
    pub port: String,

    /// TCP proxy host. Absent or empty selects serial.
    #[serde(default)]
    pub host: Option<String>,

    /// Serial line speed.
    #[serde(default = "default_speed")]
    pub speed: u32,

    /// Re-raise failures instead of returning `false`.
    #[serde(default)]
    pub strict: bool,
}

fn default_brand() -> String {
    "epson".to_string()
}

fn default_model() -> String {
    "320".to_string()
}

fn default_port() -> String {
    if cfg!(windows) {
        "COM1".to_string()
    } else {
        "/dev/ttyS0".to_string()
    }
}

fn default_speed() -> u32 {
    DEFAULT_SPEED
}

impl Default for ControllerSettings {
    fn default() -> Self {
        ControllerSettings {
            brand: default_brand(),
            model: default_model(),
            port: default_port(),
            host: None,
            speed: default_speed(),
            strict: false,
        }
    }
}

impl ControllerSettings {
    /// Connection parameters for `connect`.
    pub fn connect_params(&self) -> ConnectParams {
        let mut params = ConnectParams::new(&self.brand, &self.model, &self.port)
            .with_speed(self.speed);
        if let Some(host) = &self.host {
            params = params.with_host(host);
        }
        params
    }
}

// =============================================================================
// Server Settings
// =============================================================================

/// Listener settings for the HTTP and WebSocket transports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Bind address (default: loopback only).
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Listen port.
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Serve the HTTP routes.
    #[serde(default = "default_true")]
    pub http: bool,

    /// Serve the WebSocket RPC endpoint.
    #[serde(default = "default_true")]
    pub ws: bool,
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8770
}

fn default_true() -> bool {
    true
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
            port: default_server_port(),
            http: true,
            ws: true,
        }
    }
}

impl ServerSettings {
    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FiscalConfig {
    #[serde(default)]
    pub controller: ControllerSettings,

    #[serde(default)]
    pub server: ServerSettings,
}

impl FiscalConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// An explicit `config_path` must exist; the default locations are
    /// optional.
    pub fn load(config_path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                other => {
                    debug!(path = ?other, "Config file not found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parses one TOML file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        info!(?path, "Loading config from file");
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.controller.brand.trim().is_empty() {
            return Err(ConfigError::Invalid("controller.brand must not be empty".into()));
        }

        if self.controller.speed == 0 {
            return Err(ConfigError::Invalid(
                "controller.speed must be greater than 0".into(),
            ));
        }

        // same rule connect applies: a TCP host needs a numeric port
        self.controller
            .connect_params()
            .addressing()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if !self.server.http && !self.server.ws {
            return Err(ConfigError::Invalid(
                "server.http and server.ws cannot both be disabled".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(brand) = lookup("FISCAL_BRAND") {
            debug!(brand = %brand, "Overriding brand from environment");
            self.controller.brand = brand;
        }

        if let Some(model) = lookup("FISCAL_MODEL") {
            self.controller.model = model;
        }

        if let Some(port) = lookup("FISCAL_PORT") {
            debug!(port = %port, "Overriding printer port from environment");
            self.controller.port = port;
        }

        if let Some(host) = lookup("FISCAL_HOST") {
            self.controller.host = Some(host);
        }

        if let Some(speed) = lookup("FISCAL_SPEED") {
            match speed.parse::<u32>() {
                Ok(s) => self.controller.speed = s,
                Err(_) => warn!(speed = %speed, "Ignoring non-numeric FISCAL_SPEED"),
            }
        }

        if let Some(strict) = lookup("FISCAL_STRICT") {
            match strict.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.controller.strict = true,
                "0" | "false" | "no" | "off" => self.controller.strict = false,
                _ => warn!(strict = %strict, "Ignoring unrecognised FISCAL_STRICT"),
            }
        }

        if let Some(port) = lookup("FISCAL_SERVER_PORT") {
            if let Ok(p) = port.parse::<u16>() {
                debug!(port = p, "Overriding server port from environment");
                self.server.port = p;
            }
        }
    }

    /// `./fiscal.toml` when present, else the platform config directory.
    pub fn default_config_path() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        directories::ProjectDirs::from("org", "fiscal", "fiscal-controller")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}
