//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `homebus.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::BTreeMap;
use std::time::Duration;

use homebus_domain::id::ComponentId;
use homebus_domain::record::ComponentRecord;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Command port settings.
    pub server: ServerConfig,
    /// Event bus settings.
    pub bus: BusConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Integration toggles.
    pub integrations: IntegrationsConfig,
    /// Components created at startup.
    pub components: Vec<ComponentConfig>,
}

/// Command port listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Name the server registers under in the directory.
    pub name: String,
}

/// Dispatcher and heartbeat configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Events that may wait in the mailbox before senders are refused.
    pub mailbox_capacity: usize,
    /// Seconds between two heartbeat events, `0` disables the heartbeat.
    pub heartbeat_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Per-integration toggles.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IntegrationsConfig {
    /// Enable the virtual/demo integration.
    pub virtual_enabled: bool,
}

/// One `[[components]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentConfig {
    pub class: String,
    pub name: String,
    #[serde(default)]
    pub id: Option<u64>,
    /// Initial attribute values, applied in key order.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ComponentConfig {
    #[must_use]
    pub fn to_record(&self) -> ComponentRecord {
        let mut record = ComponentRecord::new(&self.class, &self.name);
        record.id = self.id.map(ComponentId::new);
        record.attributes = self
            .attributes
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        record
    }
}

impl Config {
    /// Load configuration from `homebus.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("homebus.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HOMEBUS_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("HOMEBUS_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("HOMEBUS_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Ok(val) = std::env::var("HOMEBUS_MAILBOX_CAPACITY") {
            if let Ok(capacity) = val.parse() {
                self.bus.mailbox_capacity = capacity;
            }
        }
        if let Ok(val) = std::env::var("HOMEBUS_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.bus.mailbox_capacity == 0 {
            return Err(ConfigError::Validation(
                "mailbox capacity must be non-zero".to_string(),
            ));
        }
        if let Some(component) = self.components.iter().find(|c| c.name.is_empty()) {
            return Err(ConfigError::Validation(format!(
                "component of class `{}` has no name",
                component.class
            )));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Heartbeat period, `None` when disabled.
    #[must_use]
    pub fn heartbeat_period(&self) -> Option<Duration> {
        (self.bus.heartbeat_secs > 0).then(|| Duration::from_secs(self.bus.heartbeat_secs))
    }

    /// Startup components as loader records, in file order.
    #[must_use]
    pub fn component_records(&self) -> Vec<ComponentRecord> {
        self.components.iter().map(ComponentConfig::to_record).collect()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8005,
            name: homebus_app::server::SERVER_CLASS.to_string(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: homebus_app::dispatcher::DEFAULT_MAILBOX_CAPACITY,
            heartbeat_secs: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "homebusd=info,homebus=info".to_string(),
        }
    }
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            virtual_enabled: true,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
