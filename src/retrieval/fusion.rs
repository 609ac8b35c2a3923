//! Reciprocal Rank Fusion algorithm for combining search results

use crate::search::{LexicalHit, VectorHit};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid weight configuration: weights must be positive")]
    InvalidWeights,

    #[error("Invalid RRF constant: k must be positive")]
    InvalidK,
}

/// Configuration for fusion algorithm
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig {
    /// RRF K constant
    pub rrf_k: f64,

    /// Weight for vector results
    pub vector_weight: f64,

    /// Weight for lexical results
    pub lexical_weight: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            vector_weight: 0.7,
            lexical_weight: 0.3,
        }
    }
}

impl FusionConfig {
    pub fn new(rrf_k: f64, vector_weight: f64, lexical_weight: f64) -> Result<Self, FusionError> {
        if !(vector_weight > 0.0 && lexical_weight > 0.0) {
            return Err(FusionError::InvalidWeights);
        }
        if !(rrf_k > 0.0) {
            return Err(FusionError::InvalidK);
        }

        Ok(Self {
            rrf_k,
            vector_weight,
            lexical_weight,
        })
    }

    fn contribution(&self, weight: f64, rank: Option<usize>) -> f64 {
        match rank {
            Some(rank) => weight / (self.rrf_k + rank as f64),
            None => 0.0,
        }
    }
}

/// One fused candidate; ranks are 1-based and absent when the source did not return it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedResult {
    pub finding_id: i64,
    pub fused_score: f64,
    pub vector_rank: Option<usize>,
    pub lexical_rank: Option<usize>,
}

/// Apply Reciprocal Rank Fusion to two ranked id lists
///
/// score(id) = w_vector / (k + vector_rank) + w_lexical / (k + lexical_rank),
/// where a missing rank contributes nothing. Results are sorted by score
/// descending with a stable sort: equal scores keep first-appearance order,
/// vector ids (in vector order) before lexical-only ids (in lexical order).
/// A repeated id within one list keeps its first, best rank.
pub fn reciprocal_rank_fusion(
    vector_ids: &[i64],
    lexical_ids: &[i64],
    config: &FusionConfig,
) -> Vec<FusedResult> {
    let mut fused: Vec<FusedResult> = Vec::with_capacity(vector_ids.len() + lexical_ids.len());
    let mut slots: HashMap<i64, usize> = HashMap::new();

    for (position, id) in vector_ids.iter().enumerate() {
        let slot = *slots.entry(*id).or_insert_with(|| {
            fused.push(FusedResult {
                finding_id: *id,
                fused_score: 0.0,
                vector_rank: None,
                lexical_rank: None,
            });
            fused.len() - 1
        });
        fused[slot].vector_rank.get_or_insert(position + 1);
    }

    for (position, id) in lexical_ids.iter().enumerate() {
        let slot = *slots.entry(*id).or_insert_with(|| {
            fused.push(FusedResult {
                finding_id: *id,
                fused_score: 0.0,
                vector_rank: None,
                lexical_rank: None,
            });
            fused.len() - 1
        });
        fused[slot].lexical_rank.get_or_insert(position + 1);
    }

    for result in &mut fused {
        result.fused_score = config.contribution(config.vector_weight, result.vector_rank)
            + config.contribution(config.lexical_weight, result.lexical_rank);
    }

    fused.sort_by(|a, b| b.fused_score.total_cmp(&a.fused_score));
    fused
}

/// Fuse the two search legs and keep the best `limit`
pub fn fuse(
    vector_hits: &[VectorHit],
    lexical_hits: &[LexicalHit],
    config: &FusionConfig,
    limit: usize,
) -> Vec<FusedResult> {
    let vector_ids: Vec<i64> = vector_hits.iter().map(|h| h.finding_id).collect();
    let lexical_ids: Vec<i64> = lexical_hits.iter().map(|h| h.finding_id).collect();

    let mut fused = reciprocal_rank_fusion(&vector_ids, &lexical_ids, config);
    fused.truncate(limit);
    fused
}
