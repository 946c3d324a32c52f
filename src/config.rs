//! Configuration management for StickLLM
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//! The resulting [`Config`] is built once at start-up and handed to each
//! component by reference.

use crate::error::{Result, StickllmError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main configuration structure for StickLLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Completion server connection settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Sampling parameters sent with every completion request
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Model names (informational only)
    #[serde(default)]
    pub models: ModelsConfig,

    /// Named context presets (informational only)
    #[serde(default)]
    pub contexts: BTreeMap<String, Vec<String>>,

    /// Persona strings; `default` is prefixed to every prompt
    #[serde(default = "default_personas")]
    pub personas: BTreeMap<String, String>,

    /// Conversation storage settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Completion server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the completion server
    #[serde(default = "default_server_url")]
    pub url: String,

    /// Timeout for a completion call (seconds)
    #[serde(default = "default_server_timeout")]
    pub timeout: u64,

    /// Number of health probes before giving up
    #[serde(default = "default_health_retries")]
    pub health_retries: u32,

    /// Fixed wait between failed health probes (seconds)
    #[serde(default = "default_health_wait_seconds")]
    pub health_wait_seconds: u64,

    /// Timeout for a single health probe (seconds)
    #[serde(default = "default_health_timeout")]
    pub health_timeout: u64,
}

fn default_server_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_server_timeout() -> u64 {
    120
}

fn default_health_retries() -> u32 {
    10
}

fn default_health_wait_seconds() -> u64 {
    1
}

fn default_health_timeout() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            timeout: default_server_timeout(),
            health_retries: default_health_retries(),
            health_wait_seconds: default_health_wait_seconds(),
            health_timeout: default_health_timeout(),
        }
    }
}

/// Sampling parameters for `/completion`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus-sampling threshold
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Maximum number of tokens to predict
    #[serde(default = "default_n_predict")]
    pub n_predict: u32,

    /// Stop sequences
    #[serde(default = "default_stop")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

fn default_n_predict() -> u32 {
    2048
}

fn default_stop() -> Vec<String> {
    vec![
        "User:".to_string(),
        "Assistant:".to_string(),
        "\n\nUser:".to_string(),
        "\n\nAssistant:".to_string(),
    ]
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            n_predict: default_n_predict(),
            stop: default_stop(),
        }
    }
}

/// Model names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model the server is expected to run
    #[serde(default = "default_model")]
    pub default: String,
}

fn default_model() -> String {
    "deepseek-coder-6.7b".to_string()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default: default_model(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Explicit SQLite database path; platform data dir when unset
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

const DEFAULT_PERSONA: &str =
    "You are a helpful coding assistant with deep expertise in software architecture and implementation.";

fn default_personas() -> BTreeMap<String, String> {
    let mut personas = BTreeMap::new();
    personas.insert("default".to_string(), DEFAULT_PERSONA.to_string());
    personas
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file yields the built-in defaults; a file that exists but
    /// does not parse is an error.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StickllmError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = serde_yaml::from_str(&contents)?;
        tracing::debug!("Loaded configuration from {}", path);
        Ok(config)
    }

    fn apply_env_vars(&mut self) {
        if let Ok(url) = std::env::var("STICKLLM_SERVER_URL") {
            tracing::debug!(url = %url, "Env override: STICKLLM_SERVER_URL");
            self.server.url = url;
        }

        if let Ok(timeout) = std::env::var("STICKLLM_SERVER_TIMEOUT") {
            match timeout.parse::<u64>() {
                Ok(v) => {
                    self.server.timeout = v;
                    tracing::debug!(timeout = v, "Env override: STICKLLM_SERVER_TIMEOUT");
                }
                Err(_) => {
                    tracing::warn!("Invalid value for STICKLLM_SERVER_TIMEOUT: {}", timeout);
                }
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(url) = &cli.server_url {
            self.server.url = url.clone();
        }
        if let Some(path) = &cli.storage_path {
            self.storage.db_path = Some(PathBuf::from(path));
        }
    }

    /// The persona string used verbatim as the prompt's system line
    pub fn persona(&self) -> &str {
        self.personas
            .get("default")
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let url = self.server.url.trim();
        if url.is_empty() {
            return Err(StickllmError::Config("server.url cannot be empty".to_string()).into());
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(StickllmError::Config(format!(
                "server.url must start with http:// or https://, got: {}",
                url
            ))
            .into());
        }

        if self.server.timeout == 0 {
            return Err(
                StickllmError::Config("server.timeout must be greater than 0".to_string()).into(),
            );
        }

        if self.server.health_retries == 0 {
            return Err(StickllmError::Config(
                "server.health_retries must be greater than 0".to_string(),
            )
            .into());
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(StickllmError::Config(
                "generation.temperature must be between 0.0 and 2.0".to_string(),
            )
            .into());
        }

        if self.generation.top_p <= 0.0 || self.generation.top_p > 1.0 {
            return Err(StickllmError::Config(
                "generation.top_p must be in (0.0, 1.0]".to_string(),
            )
            .into());
        }

        if self.generation.n_predict == 0 {
            return Err(StickllmError::Config(
                "generation.n_predict must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            generation: GenerationConfig::default(),
            models: ModelsConfig::default(),
            contexts: BTreeMap::new(),
            personas: default_personas(),
            storage: StorageConfig::default(),
        }
    }
}
