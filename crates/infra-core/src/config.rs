//! Configuration loading and typed config structures.
//!
//! The configuration lives in `infra-config.yaml` (path overridable with
//! `INFRA_CONFIG`). Every section and field has a default, so an empty
//! file is a valid configuration.

use std::path::{Path, PathBuf};

use infra_types::AffectedLayerBinding;
use serde::Deserialize;

use crate::overlay::DEFAULT_TITLE_SUFFIX;
use crate::proximity::ProximityConfig;
use crate::retry::RetryPolicy;
use crate::strategy::{LabelStrategy, ScoreStrategy, StrategyRegistry};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "infra-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration, mirroring `infra-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InfraConfig {
    /// Bulk backfill settings.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Proximity query settings.
    #[serde(default)]
    pub proximity: ProximityConfig,

    /// Edit reaction settings.
    #[serde(default)]
    pub reactions: ReactionsConfig,

    /// Remote feature layers known to the session.
    #[serde(default)]
    pub layers: Vec<LayerConfig>,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl InfraConfig {
    /// The configuration path: `INFRA_CONFIG` if set, else
    /// [`DEFAULT_CONFIG_FILE`] in the working directory.
    pub fn default_path() -> PathBuf {
        std::env::var("INFRA_CONFIG").map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
    }

    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `INFRA_OUTPUT_DIR` overrides `extraction.output_dir`
    /// - `INFRA_HOST` overrides `server.host`
    /// - `INFRA_PORT` overrides `server.port` when it parses as a port
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides
    /// are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override values with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("INFRA_OUTPUT_DIR") {
            self.extraction.output_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("INFRA_HOST") {
            self.server.host = val;
        }
        if let Some(port) = std::env::var("INFRA_PORT")
            .ok()
            .and_then(|val| val.parse().ok())
        {
            self.server.port = port;
        }
    }
}

/// One query endpoint to backfill.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointConfig {
    /// Logical dataset name; the artifact is written as `<name>.geojson`.
    pub name: String,
    /// Layer or query URL. `/query` is appended when missing.
    pub url: String,
}

/// Bulk backfill settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtractionConfig {
    /// Directory receiving one artifact per endpoint.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Endpoints in drain order.
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,

    /// Drain endpoints concurrently.
    #[serde(default)]
    pub parallel_endpoints: bool,

    /// Retry policy for transient page failures.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("assets")
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            endpoints: Vec::new(),
            parallel_endpoints: false,
            retry: RetryPolicy::default(),
        }
    }
}

/// Edit reaction settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReactionsConfig {
    /// Which targets react to edits of which source layers.
    #[serde(default)]
    pub bindings: Vec<AffectedLayerBinding>,

    /// Marker appended to a target's title to name its overlay.
    #[serde(default = "default_title_suffix")]
    pub overlay_title_suffix: String,

    /// Parameters of the score strategy.
    #[serde(default)]
    pub score: ScoreStrategy,

    /// Parameters of the label strategy.
    #[serde(default)]
    pub label: LabelStrategy,
}

fn default_title_suffix() -> String {
    String::from(DEFAULT_TITLE_SUFFIX)
}

impl Default for ReactionsConfig {
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
            overlay_title_suffix: default_title_suffix(),
            score: ScoreStrategy::default(),
            label: LabelStrategy::default(),
        }
    }
}

impl ReactionsConfig {
    /// The strategy registry described by this section.
    pub fn strategies(&self) -> StrategyRegistry {
        StrategyRegistry::with_builtins(self.score.clone(), self.label.clone())
    }
}

/// A remote feature layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LayerConfig {
    /// Layer id used in bindings and edit events.
    pub id: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Feature layer URL (without `/query`).
    pub url: String,
    /// Whether the service accepts direct edits.
    #[serde(default)]
    pub editing_enabled: bool,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
