//! Hybrid retrieval
//!
//! Runs BM25 and vector search independently, merges the two ranked lists
//! with weighted Reciprocal Rank Fusion and hydrates the winners.

mod fusion;
mod hybrid;
mod materialize;

pub use fusion::{fuse, reciprocal_rank_fusion, FusedResult, FusionConfig, FusionError};
pub use hybrid::HybridSearcher;
pub use materialize::materialize;

use crate::storage::{Finding, FindingType};
use serde::{Deserialize, Serialize};

/// Search query with optional type filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Raw query text for the lexical leg
    pub text: String,

    /// Query embedding for the vector leg
    pub embedding: Vec<f32>,

    /// Restrict both legs to one finding type
    pub type_filter: Option<FindingType>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            embedding,
            type_filter: None,
        }
    }

    pub fn with_type_filter(mut self, finding_type: FindingType) -> Self {
        self.type_filter = Some(finding_type);
        self
    }
}

/// A finding with its fused score and per-source ranks
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub finding: Finding,
    pub fused_score: f64,
    /// `None` when the vector leg did not return this finding
    pub vector_rank: Option<usize>,
    /// `None` when the lexical leg did not return this finding
    pub lexical_rank: Option<usize>,
}

/// Ordered hybrid search results
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

impl SearchResponse {
    /// True when the query matched nothing
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SearchResult> {
        self.results.iter()
    }
}

impl IntoIterator for SearchResponse {
    type Item = SearchResult;
    type IntoIter = std::vec::IntoIter<SearchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}
