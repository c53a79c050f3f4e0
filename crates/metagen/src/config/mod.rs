//! Configuration management for metagen using the prefer crate.
//!
//! Config files are discovered with `prefer` (any of `metagen.{toml,yaml,yml,json}`
//! in the standard locations) and parsed with serde based on the file extension.
//! Every section has defaults, so an empty file or no file at all yields a working
//! offline setup backed by the simulated provider.

mod provider;
mod sections;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm::SimulatedBehavior;
use crate::models::{BatchOptions, Capability, ModelDescriptor};
use crate::registry::SelectionWeights;
use crate::validation::ValidationRules;

pub use provider::{ModelConfig, ProviderConfig, ProviderKind};
pub use sections::{GenerationConfig, HealthConfig, PromptOverrides};

/// Environment variable overriding the catalog path.
pub const CATALOG_ENV: &str = "METAGEN_CATALOG";

/// Default catalog filename.
pub const DEFAULT_CATALOG_FILENAME: &str = "catalog.json";

/// Name of the built-in simulated provider and model.
pub const SIMULATED_PROVIDER: &str = "simulated";
pub const SIMULATED_MODEL: &str = "simulated-general";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuration file structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Catalog file path (relative paths resolve against the config file).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    /// Model used when no candidate can serve a capability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_model: Option<String>,
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub selection: SelectionWeights,
    #[serde(default)]
    pub validation: ValidationRules,
    #[serde(default)]
    pub batch: BatchOptions,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

fn default_providers() -> Vec<ProviderConfig> {
    let mut simulated = ProviderConfig::new(SIMULATED_PROVIDER, ProviderKind::Simulated);
    simulated.behavior = SimulatedBehavior::Valid;
    vec![simulated]
}

fn default_models() -> Vec<ModelConfig> {
    vec![ModelConfig {
        name: SIMULATED_MODEL.to_string(),
        provider: SIMULATED_PROVIDER.to_string(),
        capabilities: vec![Capability::ComplexWildcard],
        speed: Default::default(),
        accuracy: Default::default(),
        priority: 5,
        available: true,
        health_probe: false,
    }]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: None,
            fallback_model: Some(SIMULATED_MODEL.to_string()),
            providers: default_providers(),
            models: default_models(),
            selection: SelectionWeights::default(),
            validation: ValidationRules::default(),
            batch: BatchOptions::default(),
            health: HealthConfig::default(),
            generation: GenerationConfig::default(),
            source_path: None,
        }
    }
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers metagen config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("metagen").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            warn!("Ignoring config file: {}", e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(_) => {
                debug!("No metagen config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load from an explicit path if given, otherwise discover.
    pub async fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_path(path).await,
            None => Ok(Self::load().await),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).map_err(|e| ConfigError::Parse {
                format: "TOML",
                message: e.to_string(),
            })?,
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
                format: "YAML",
                message: e.to_string(),
            })?,
            _ => serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
                format: "JSON",
                message: e.to_string(),
            })?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Check cross-references between providers, models and the fallback model.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut provider_ids = HashSet::new();
        for provider in &self.providers {
            if !provider_ids.insert(provider.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate provider id '{}'",
                    provider.id
                )));
            }
        }

        let mut model_names = HashSet::new();
        for model in &self.models {
            if !model_names.insert(model.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate model name '{}'",
                    model.name
                )));
            }
            if !provider_ids.contains(model.provider.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "model '{}' references unknown provider '{}'",
                    model.name, model.provider
                )));
            }
            if model.capabilities.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "model '{}' declares no capabilities",
                    model.name
                )));
            }
        }

        if let Some(fallback) = &self.fallback_model {
            if !model_names.contains(fallback.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "fallback model '{}' is not declared",
                    fallback
                )));
            }
        }
        Ok(())
    }

    /// Registry descriptors in declaration order.
    pub fn model_descriptors(&self) -> Vec<ModelDescriptor> {
        self.models.iter().map(ModelDescriptor::from).collect()
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Catalog location.
    /// Priority: `METAGEN_CATALOG` > config `catalog` > user data dir > current dir.
    pub fn catalog_path(&self) -> PathBuf {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        if let Ok(env_path) = std::env::var(CATALOG_ENV) {
            if !env_path.trim().is_empty() {
                return self.resolve_path(&env_path, &cwd);
            }
        }
        if let Some(catalog) = &self.catalog {
            let base = self.base_dir().unwrap_or_else(|| cwd.clone());
            return self.resolve_path(catalog, &base);
        }
        dirs::data_dir()
            .map(|dir| dir.join("metagen").join(DEFAULT_CATALOG_FILENAME))
            .unwrap_or_else(|| cwd.join(DEFAULT_CATALOG_FILENAME))
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid_offline_setup() {
        let config = Config::default();
        config.validate().unwrap();
        let descriptors = config.model_descriptors();
        assert_eq!(descriptors.len(), 1);
        assert!(descriptors[0].supports(Capability::Schema));
        assert_eq!(config.fallback_model.as_deref(), Some(SIMULATED_MODEL));
    }

    #[tokio::test]
    async fn loads_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metagen.toml");
        std::fs::write(
            &path,
            r#"
catalog = "data/catalog.json"
fallback_model = "llama"

[[providers]]
id = "local"
kind = "ollama"

[[models]]
name = "llama"
provider = "local"
capabilities = ["meta", "rule"]
speed = "fast"
health_probe = true

[batch]
parallelism = 4
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        config.validate().unwrap();
        assert_eq!(config.batch.parallelism, 4);
        assert_eq!(config.batch.chunk_size, 10);
        assert_eq!(config.providers[0].endpoint(), "http://localhost:11434");
        let base = config.base_dir().unwrap();
        assert_eq!(
            config.resolve_path(config.catalog.as_deref().unwrap(), &base),
            dir.path().join("data/catalog.json")
        );
    }

    #[tokio::test]
    async fn loads_yaml_and_json() {
        let dir = TempDir::new().unwrap();
        let yaml = dir.path().join("metagen.yaml");
        std::fs::write(&yaml, "validation:\n  min_description_len: 40\n").unwrap();
        let config = Config::load_from_path(&yaml).await.unwrap();
        assert_eq!(config.validation.min_description_len, 40);
        assert_eq!(config.models[0].name, SIMULATED_MODEL);

        let json = dir.path().join("metagen.json");
        std::fs::write(&json, r#"{"generation": {"max_retries": 5}}"#).unwrap();
        let config = Config::load_from_path(&json).await.unwrap();
        assert_eq!(config.generation.max_retries, 5);
    }

    #[tokio::test]
    async fn parse_errors_name_the_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metagen.toml");
        std::fs::write(&path, "batch = [").unwrap();
        let err = Config::load_from_path(&path).await.unwrap_err();
        assert!(err.to_string().contains("TOML"));
    }

    #[test]
    fn validate_rejects_dangling_references() {
        let mut config = Config::default();
        config.models[0].provider = "ghost".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fallback_model = Some("ghost".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let rendered = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
