// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Coordinator Configuration Types
//
// Defines the configuration schema for a FedAurora coordinator node:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - HTTP listener settings
// - Round lifecycle behaviour
// - Outbound distribution settings
// - Status channel sizing and global model storage
// - Observability (logging, metrics)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "fedaurora.ai/v1";
pub const KIND: &str = "CoordinatorConfig";

/// Top-level Kubernetes-style coordinator configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// API version (must be "fedaurora.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "CoordinatorConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: CoordinatorSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable coordinator name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorSpec {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub round: RoundConfig,

    #[serde(default)]
    pub distribution: DistributionConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body; unlimited when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_body_bytes: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundConfig {
    /// Return to IDLE right after a round completes (the global model is kept)
    #[serde(default)]
    pub auto_reset_on_complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Path appended to each participant's callback address
    #[serde(default = "default_receive_path")]
    pub receive_path: String,

    /// Per-delivery request timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Events buffered per observer before the slowest ones start losing history
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for `averaged_model.json`; in-memory storage when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_model_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Expose Prometheus metrics
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_receive_path() -> String {
    "/receive_model".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_event_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            max_body_bytes: None,
        }
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            receive_path: default_receive_path(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "fedaurora-coordinator".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
            },
            spec: CoordinatorSpec::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. FEDAURORA_CONFIG_PATH environment variable
    /// 2. ./fedaurora-config.yaml (working directory)
    /// 3. ~/.fedaurora/config.yaml (user home)
    /// 4. /etc/fedaurora/config.yaml (Unix only)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("FEDAURORA_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./fedaurora-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".fedaurora").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/fedaurora/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load from an explicit path (which must exist), else discover, else defaults.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("FEDAURORA_AUTO_RESET") {
            match parse_bool(&val) {
                Some(enabled) => {
                    tracing::info!("Environment override: FEDAURORA_AUTO_RESET={}", enabled);
                    self.spec.round.auto_reset_on_complete = enabled;
                }
                None => tracing::warn!(
                    "Invalid value for FEDAURORA_AUTO_RESET: '{}'. Expected true/false. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(dir) = std::env::var("FEDAURORA_GLOBAL_MODEL_DIR") {
            if !dir.is_empty() {
                tracing::info!("Environment override: FEDAURORA_GLOBAL_MODEL_DIR={}", dir);
                self.spec.storage.global_model_dir = Some(PathBuf::from(dir));
            }
        }

        if let Ok(port) = std::env::var("FEDAURORA_PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.spec.server.port = port,
                Err(_) => tracing::warn!("Invalid value for FEDAURORA_PORT: '{}'. Ignoring.", port),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.server.max_body_bytes == Some(0) {
            anyhow::bail!("spec.server.max_body_bytes must be greater than zero when set");
        }

        if self.spec.events.capacity == 0 {
            anyhow::bail!("spec.events.capacity must be greater than zero");
        }

        if self.spec.distribution.timeout_ms == 0 {
            anyhow::bail!("spec.distribution.timeout_ms must be greater than zero");
        }

        if !self.spec.distribution.receive_path.starts_with('/') {
            anyhow::bail!(
                "spec.distribution.receive_path must start with '/': '{}'",
                self.spec.distribution.receive_path
            );
        }

        Ok(())
    }

    /// Socket address the HTTP API binds to
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.spec.server.bind_address, self.spec.server.port)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
