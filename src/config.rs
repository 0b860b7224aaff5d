//! # Configuration Management
//!
//! Configuration for the DHIP client and the accessory layer above it.
//!
//! The protocol core never reads configuration on its own: hosts build a
//! [`DhipConfig`] (or just a [`ClientConfig`]) and hand it in.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (opt-in, for hosts and demos)
//!
//! ## Defaults
//! - Device port 5000, user `admin` with an empty password
//! - 5 s connect timeout, 10 s per request
//! - 1 MiB maximum inbound body

use crate::core::frame::DEFAULT_MAX_BODY_SIZE;
use crate::error::{DhipError, Result};
use crate::protocol::handshake::{Credentials, LoginParams, DEFAULT_USERNAME};
use crate::service::capability::Capability;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// TCP port DHIP devices listen on
pub const DEFAULT_PORT: u16 = 5000;

/// Login challenges answered per request before giving up
pub const DEFAULT_MAX_AUTH_ATTEMPTS: u32 = 3;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DhipConfig {
    /// Protocol client settings
    #[serde(default)]
    pub client: ClientConfig,

    /// The door this host controls
    #[serde(default)]
    pub door: DoorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DhipConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| DhipError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| DhipError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| DhipError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load defaults overridden by `DHIP_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("DHIP_DEVICE_ADDRESS") {
            config.door.address = addr;
        }

        if let Ok(short_number) = std::env::var("DHIP_SHORT_NUMBER") {
            config.door.short_number = short_number;
        }

        if let Ok(username) = std::env::var("DHIP_USERNAME") {
            config.client.username = username;
        }

        if let Ok(password) = std::env::var("DHIP_PASSWORD") {
            config.client.password = password;
        }

        if let Ok(timeout) = std::env::var("DHIP_CONNECT_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.client.connect_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(timeout) = std::env::var("DHIP_RESPONSE_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.client.response_timeout = Duration::from_millis(val);
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DhipError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| DhipError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration
    ///
    /// Returns a list of problems. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.client.validate());
        errors.extend(self.door.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DhipError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Protocol client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Device port, used when the address carries none
    pub port: u16,

    /// Login user
    pub username: String,

    /// Login password (empty for intercom units)
    pub password: String,

    /// Timeout for the TCP connect
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Timeout for each request, challenge round trips included
    #[serde(with = "duration_serde")]
    pub response_timeout: Duration,

    /// Largest inbound body accepted, in bytes
    pub max_body_size: u64,

    /// Login challenges answered per request before failing
    pub max_auth_attempts: u32,

    /// `clientType` sent on login
    pub client_type: String,

    /// `ipAddr` sent on login
    pub ip_addr: String,

    /// `loginType` sent on login
    pub login_type: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let login = LoginParams::default();
        Self {
            port: DEFAULT_PORT,
            username: String::from(DEFAULT_USERNAME),
            password: String::new(),
            connect_timeout: timeout::CONNECT_TIMEOUT,
            response_timeout: timeout::RESPONSE_TIMEOUT,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            max_auth_attempts: DEFAULT_MAX_AUTH_ATTEMPTS,
            client_type: login.client_type,
            ip_addr: login.ip_addr,
            login_type: login.login_type,
        }
    }
}

impl ClientConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }

    pub fn login_params(&self) -> LoginParams {
        LoginParams {
            client_type: self.client_type.clone(),
            ip_addr: self.ip_addr.clone(),
            login_type: self.login_type.clone(),
        }
    }

    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Device port cannot be 0".to_string());
        }

        if self.username.is_empty() {
            errors.push("Username cannot be empty".to_string());
        }

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connect timeout too short (minimum: 100ms)".to_string());
        } else if self.connect_timeout.as_secs() > 120 {
            errors.push("Connect timeout too long (maximum: 120s)".to_string());
        }

        if self.response_timeout.as_millis() < 100 {
            errors.push("Response timeout too short (minimum: 100ms)".to_string());
        } else if self.response_timeout.as_secs() > 300 {
            errors.push("Response timeout too long (maximum: 300s)".to_string());
        }

        if self.max_body_size < 1024 {
            errors.push("Max body size too small (minimum: 1 KB)".to_string());
        } else if self.max_body_size > 64 * 1024 * 1024 {
            errors.push(format!(
                "Max body size too large: {} bytes (maximum: 64 MB)",
                self.max_body_size
            ));
        }

        if self.max_auth_attempts == 0 {
            errors.push("Max auth attempts must be greater than 0".to_string());
        }

        errors
    }
}

/// The door operated by this host
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DoorConfig {
    /// Display name
    pub name: String,

    /// Device host or `host:port`
    pub address: String,

    /// Code passed as `ShortNumber` to `accessControl.openDoor`
    pub short_number: String,

    /// How the door is presented to the host
    pub capability: Capability,

    /// Garage doors only: delay before reporting fully open
    #[serde(with = "duration_serde")]
    pub garage_open_delay: Duration,
}

impl Default for DoorConfig {
    fn default() -> Self {
        Self {
            name: String::from("Intercom"),
            address: String::from("192.168.1.108"),
            short_number: String::new(),
            capability: Capability::default(),
            garage_open_delay: timeout::GARAGE_OPEN_DELAY,
        }
    }
}

impl DoorConfig {
    /// Validate door configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.is_empty() {
            errors.push("Door name cannot be empty".to_string());
        }

        if self.address.trim().is_empty() {
            errors.push("Device address cannot be empty".to_string());
        } else if self.address.contains(char::is_whitespace) {
            errors.push(format!(
                "Invalid device address: '{}' (expected 'host' or 'host:port')",
                self.address
            ));
        }

        if self.capability == Capability::GarageDoor && self.garage_open_delay.as_secs() > 600 {
            errors.push("Garage open delay too long (maximum: 10 minutes)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("dhip-client"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        level.as_str().to_lowercase().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
