//! Embedder collaborator
//!
//! The index never computes embeddings itself; callers hand in vectors.
//! This module defines the provider seam and a local FastEmbed backend the
//! CLI uses to embed queries.

mod provider;

pub use provider::{
    finding_embedding_text, model_dimension, EmbeddingError, EmbeddingProvider, FastEmbedProvider,
};
