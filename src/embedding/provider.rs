//! Embedding provider trait and FastEmbed implementation

use crate::error::FindexError;
use crate::storage::NewFinding;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<EmbeddingError> for FindexError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::DimensionMismatch { expected, actual } => {
                FindexError::DimensionMismatch { expected, actual }
            }
            other => FindexError::Embedding(other.to_string()),
        }
    }
}

/// Trait for embedding providers
///
/// The index treats embedders as opaque text-to-vector functions; the
/// dimension must match the one the vector table was created with.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut embeddings = self.embed_batch(&[text.to_string()])?;
        embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::GenerationError("No embedding generated".to_string()))
    }

    /// Generate embeddings for multiple texts, one per input in order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Text embedded for a finding: its content, then its context when present
pub fn finding_embedding_text(finding: &NewFinding) -> String {
    match &finding.context {
        Some(context) if !context.trim().is_empty() => {
            format!("{}\n{}", finding.content, context)
        }
        _ => finding.content.clone(),
    }
}

/// Models the CLI knows how to load: (name, model, dimension)
const SUPPORTED_MODELS: &[(&str, EmbeddingModel, usize)] = &[
    ("all-MiniLM-L6-v2", EmbeddingModel::AllMiniLML6V2, 384),
    ("bge-small-en-v1.5", EmbeddingModel::BGESmallENV15, 384),
    ("bge-base-en-v1.5", EmbeddingModel::BGEBaseENV15, 768),
];

/// Dimension produced by a supported model, if known
pub fn model_dimension(model_name: &str) -> Option<usize> {
    SUPPORTED_MODELS
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(model_name))
        .map(|(_, _, dimension)| *dimension)
}

/// FastEmbed provider for local embedding generation
///
/// Models are downloaded to the huggingface cache on first use.
pub struct FastEmbedProvider {
    model: TextEmbedding,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let (name, model, dimension) = SUPPORTED_MODELS
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(model_name))
            .cloned()
            .ok_or_else(|| {
                let supported: Vec<&str> = SUPPORTED_MODELS.iter().map(|(n, _, _)| *n).collect();
                EmbeddingError::InitializationError(format!(
                    "Unsupported model: {}. Supported: {}",
                    model_name,
                    supported.join(", ")
                ))
            })?;

        tracing::info!("Initializing embedding model: {} ({}D)", name, dimension);

        let init_options = InitOptions::new(model).with_show_download_progress(false);
        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            model,
            model_name: name.to_string(),
            dimension,
        })
    }

    /// Create provider with default model (all-MiniLM-L6-v2)
    pub fn with_default_model() -> Result<Self, EmbeddingError> {
        Self::new("all-MiniLM-L6-v2")
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(position) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput(format!(
                "Text at position {} is empty",
                position
            )));
        }

        let embeddings = self
            .model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::GenerationError(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FindingType, Severity};

    #[test]
    fn test_model_dimension() {
        assert_eq!(model_dimension("all-MiniLM-L6-v2"), Some(384));
        assert_eq!(model_dimension("all-minilm-l6-v2"), Some(384));
        assert_eq!(model_dimension("bge-base-en-v1.5"), Some(768));
        assert_eq!(model_dimension("unknown"), None);
    }

    #[test]
    fn test_finding_embedding_text() {
        let finding = NewFinding::new("s1", FindingType::Blocker, "leaks fds", Severity::High);
        assert_eq!(finding_embedding_text(&finding), "leaks fds");

        let finding = finding.with_context("watcher.rs");
        assert_eq!(finding_embedding_text(&finding), "leaks fds\nwatcher.rs");
    }

    #[test]
    fn test_dimension_error_converts_to_fatal() {
        let err: FindexError = EmbeddingError::DimensionMismatch {
            expected: 384,
            actual: 768,
        }
        .into();
        assert!(err.is_configuration_fatal());

        let err: FindexError = EmbeddingError::InvalidInput("empty".to_string()).into();
        assert!(matches!(err, FindexError::Embedding(_)));
    }

    #[test]
    fn test_unsupported_model() {
        assert!(matches!(
            FastEmbedProvider::new("not-a-model"),
            Err(EmbeddingError::InitializationError(_))
        ));
    }

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn test_single_embedding() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let embedding = provider.embed("Missing error handling in the parser").unwrap();
        assert_eq!(embedding.len(), 384);
    }

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn test_batch_keeps_order() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let texts = vec![
            "First finding.".to_string(),
            "Second finding.".to_string(),
        ];

        let batch = provider.embed_batch(&texts).unwrap();
        let single = provider.embed(&texts[1]).unwrap();
        assert_eq!(batch.len(), 2);

        let diff: f32 = batch[1].iter().zip(&single).map(|(a, b)| (a - b).abs()).sum();
        assert!(diff < 1e-3);
    }
}
