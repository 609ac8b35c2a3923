//! Configuration management for findex
//!
//! Loads the TOML configuration file, applies `FINDEX_` environment overrides
//! and validates the result before anything touches the database.

use crate::error::{FindexError, Result};
use crate::retrieval::{FusionConfig, FusionError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// The single database file holding findings and both indexes
    pub db_path: PathBuf,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    /// Fixed for the lifetime of the vector index
    pub dimension: usize,
}

/// Hybrid search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub rrf_k: f64,
    pub vector_weight: f64,
    pub lexical_weight: f64,
    /// Candidates fetched from each source before fusion
    pub per_source_limit: usize,
    /// Results kept after fusion
    pub result_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let fusion = FusionConfig::default();
        Self {
            rrf_k: fusion.rrf_k,
            vector_weight: fusion.vector_weight,
            lexical_weight: fusion.lexical_weight,
            per_source_limit: 100,
            result_limit: 20,
        }
    }
}

impl SearchConfig {
    /// Fusion parameters, rejecting non-positive weights or k
    pub fn fusion(&self) -> std::result::Result<FusionConfig, FusionError> {
        FusionConfig::new(self.rrf_k, self.vector_weight, self.lexical_weight)
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FindexError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| FindexError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FindexError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| FindexError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: FINDEX_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("FINDEX_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__DB_PATH" => {
                self.storage.db_path = PathBuf::from(value);
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "EMBEDDING__DIMENSION" => {
                self.embedding.dimension = parse_env(path, value)?;
            }
            "SEARCH__PER_SOURCE_LIMIT" => {
                self.search.per_source_limit = parse_env(path, value)?;
            }
            "SEARCH__RESULT_LIMIT" => {
                self.search.result_limit = parse_env(path, value)?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| FindexError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("findex").join("config.toml"))
    }

    /// Get the default database location
    pub fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| FindexError::Config("Cannot determine data directory".to_string()))?;

        Ok(data_dir.join("findex").join("findings.db"))
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| FindexError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        let db_path =
            Self::default_db_path().unwrap_or_else(|_| PathBuf::from("findex").join("findings.db"));

        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig { db_path },
            embedding: EmbeddingConfig {
                model: "all-MiniLM-L6-v2".to_string(),
                dimension: 384,
            },
            search: SearchConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_search_config() {
        let search = SearchConfig::default();
        assert_eq!(search.rrf_k, 60.0);
        assert_eq!(search.vector_weight, 0.7);
        assert_eq!(search.lexical_weight, 0.3);
        assert_eq!(search.per_source_limit, 100);
        assert_eq!(search.result_limit, 20);
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.storage.db_path = temp.path().join("findings.db");
        config.embedding.model = "bge-base-en-v1.5".to_string();
        config.embedding.dimension = 768;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.embedding.dimension, 768);
        assert_eq!(loaded.storage.db_path, temp.path().join("findings.db"));
        assert_eq!(loaded.search.result_limit, 20);
    }

    #[test]
    fn test_missing_search_section_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[_meta]
schema_version = "1.0.0"

[storage]
db_path = "/tmp/findings.db"

[embedding]
model = "all-MiniLM-L6-v2"
dimension = 384
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.search.per_source_limit, 100);
        assert_eq!(config.search.fusion().unwrap().rrf_k, 60.0);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/findex/config.toml"));
        assert!(matches!(result, Err(FindexError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_env_value_parsing() {
        let mut config = Config::default();
        config
            .set_value_from_env("SEARCH__RESULT_LIMIT", "5")
            .unwrap();
        assert_eq!(config.search.result_limit, 5);

        let result = config.set_value_from_env("EMBEDDING__DIMENSION", "wide");
        assert!(matches!(
            result,
            Err(FindexError::InvalidConfigValue { .. })
        ));
    }

    #[test]
    fn test_fusion_rejects_zero_weight() {
        let mut search = SearchConfig::default();
        search.lexical_weight = 0.0;
        assert!(matches!(search.fusion(), Err(FusionError::InvalidWeights)));
    }
}
