use crate::config::Config;
use crate::embedding::model_dimension;
use crate::error::{FindexError, Result, ValidationError};
use crate::search::MAX_KNN_LIMIT;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every violation before failing
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_search(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FindexError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.db_path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.db_path",
                "Database path cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Embedding dimension must be greater than 0",
            ));
            return;
        }

        if config.embedding.model.is_empty() {
            return;
        }

        match model_dimension(&config.embedding.model) {
            Some(dimension) if dimension != config.embedding.dimension => {
                errors.push(ValidationError::new(
                    "embedding.dimension",
                    format!(
                        "Model {} produces {}-dimensional embeddings, configured {}",
                        config.embedding.model, dimension, config.embedding.dimension
                    ),
                ));
            }
            Some(_) => {}
            None => {
                errors.push(ValidationError::new(
                    "embedding.model",
                    format!("Unsupported model: {}", config.embedding.model),
                ));
            }
        }
    }

    fn validate_search(config: &Config, errors: &mut Vec<ValidationError>) {
        let search = &config.search;

        if !(search.rrf_k > 0.0) {
            errors.push(ValidationError::new(
                "search.rrf_k",
                format!("RRF k must be positive, got {}", search.rrf_k),
            ));
        }

        if !(search.vector_weight > 0.0) {
            errors.push(ValidationError::new(
                "search.vector_weight",
                format!("Weight must be positive, got {}", search.vector_weight),
            ));
        }

        if !(search.lexical_weight > 0.0) {
            errors.push(ValidationError::new(
                "search.lexical_weight",
                format!("Weight must be positive, got {}", search.lexical_weight),
            ));
        }

        if search.per_source_limit == 0 {
            errors.push(ValidationError::new(
                "search.per_source_limit",
                "Per-source limit must be greater than 0",
            ));
        } else if search.per_source_limit > MAX_KNN_LIMIT {
            errors.push(ValidationError::new(
                "search.per_source_limit",
                format!(
                    "Per-source limit {} exceeds the maximum of {}",
                    search.per_source_limit, MAX_KNN_LIMIT
                ),
            ));
        }

        if search.result_limit == 0 {
            errors.push(ValidationError::new(
                "search.result_limit",
                "Result limit must be greater than 0",
            ));
        } else if search.result_limit > search.per_source_limit {
            errors.push(ValidationError::new(
                "search.result_limit",
                format!(
                    "Result limit {} exceeds per-source limit {}",
                    search.result_limit, search.per_source_limit
                ),
            ));
        }
    }
}
