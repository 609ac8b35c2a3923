use std::path::PathBuf;
use thiserror::Error;

/// Main error type for findex
#[derive(Error, Debug)]
pub enum FindexError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Storage structures were never created for this database file
    #[error("Schema has not been applied to {path}")]
    SchemaMissing { path: PathBuf },

    /// Query or stored embedding does not match the index dimensionality
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Fusion parameters that cannot produce a ranking
    #[error("Invalid fusion configuration: {0}")]
    Fusion(#[from] crate::retrieval::FusionError),

    /// A finding failed validation before it reached the database
    #[error("Invalid finding: {0}")]
    InvalidFinding(String),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FindexError {
    /// Errors caused by setup rather than by the data being searched.
    ///
    /// These must never be confused with an empty result set.
    pub fn is_configuration_fatal(&self) -> bool {
        matches!(
            self,
            FindexError::SchemaMissing { .. }
                | FindexError::DimensionMismatch { .. }
                | FindexError::Fusion(_)
        )
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for findex operations
pub type Result<T> = std::result::Result<T, FindexError>;
