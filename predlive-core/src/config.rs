use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::Result;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub broadcast: BroadcastConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Fan-out tuning for the SSE broadcast hub
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Seconds between `ping` frames on an idle subscription (0 disables)
    pub keepalive_interval_secs: u64,
    /// Frames buffered per subscriber before writes to it start failing
    pub channel_capacity: usize,
    /// Seconds between sweeps of empty subscriber sets (0 disables)
    pub sweep_interval_secs: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            keepalive_interval_secs: 30,
            channel_capacity: 64,
            sweep_interval_secs: 60,
        }
    }
}

impl BroadcastConfig {
    #[must_use]
    pub const fn keepalive_interval(&self) -> Option<Duration> {
        if self.keepalive_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.keepalive_interval_secs))
        }
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Option<Duration> {
        if self.sweep_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.sweep_interval_secs))
        }
    }
}

/// Cross-origin policy for the browser extension and dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; empty allows any origin
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // PREDLIVE_SERVER__HTTP_PORT, PREDLIVE_CORS__ALLOWED_ORIGINS=a,b, ...
        builder = builder.add_source(
            Environment::with_prefix("PREDLIVE")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("cors.allowed_origins")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self> {
        Self::load(Some(path))
    }

    /// Get HTTP address
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }

    /// Check the configuration for values the server cannot run with
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.host.trim().is_empty() {
            errors.push("server.host must not be empty".to_string());
        }
        if self.server.http_port == 0 {
            errors.push("server.http_port must be greater than 0".to_string());
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be \"json\" or \"pretty\", got \"{}\"",
                self.logging.format
            ));
        }
        if crate::logging::parse_log_level(&self.logging.level).is_err() {
            errors.push(format!("logging.level is invalid: \"{}\"", self.logging.level));
        }
        if self.broadcast.channel_capacity == 0 {
            errors.push("broadcast.channel_capacity must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
