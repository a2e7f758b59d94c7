//! Application configuration.
//!
//! Aggregates per-module configuration into a single Config struct that
//! can be loaded from YAML files or environment variables.

use std::time::Duration;

use serde::Deserialize;

use crate::model::PublisherMeta;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "BUSPULSE_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "BUSPULSE";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "BUSPULSE_LOG";

/// Default publish interval in milliseconds.
pub const DEFAULT_PUBLISH_INTERVAL_MS: u64 = 5_000;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Publish loop configuration.
    pub publisher: PublisherConfig,
    /// Rendezvous store configuration.
    pub store: StoreConfig,
    /// Geocoding collaborator configuration.
    pub geocoder: GeocoderConfig,
    /// Static route table configuration.
    pub routes: RoutesConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `BUSPULSE_CONFIG` environment variable (if set)
    /// 4. Environment variables with `BUSPULSE` prefix
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        Ok(config)
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}

/// Publish loop configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Stable publisher identity; supplied by the authentication
    /// collaborator in a real deployment.
    pub id: String,
    /// Milliseconds between position samples.
    pub interval_ms: u64,
    /// Driver display name published with every sample.
    pub display_name: Option<String>,
    /// Bus number or fleet label.
    pub vehicle_label: Option<String>,
    /// Human-readable route description.
    pub route_label: Option<String>,
}

impl PublisherConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Descriptive metadata carried into each state write.
    pub fn meta(&self) -> PublisherMeta {
        PublisherMeta {
            display_name: self.display_name.clone(),
            vehicle_label: self.vehicle_label.clone(),
            route_label: self.route_label.clone(),
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            id: "bus-1".to_string(),
            interval_ms: DEFAULT_PUBLISH_INTERVAL_MS,
            display_name: None,
            vehicle_label: None,
            route_label: None,
        }
    }
}

/// Rendezvous store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Capacity of the change notification channel.
    pub channel_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Geocoding collaborator configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Base URL of the maps web API.
    pub endpoint: String,
    /// API key; empty disables the collaborator.
    pub api_key: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://maps.googleapis.com/maps/api".to_string(),
            api_key: String::new(),
        }
    }
}

/// Static route table configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Path to a route table JSON file; `None` uses built-in routes.
    pub path: Option<String>,
}
