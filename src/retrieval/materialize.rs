//! Hydrate fused ids into full finding records

use crate::error::Result;
use crate::retrieval::{FusedResult, SearchResult};
use crate::storage::{fetch_findings, Finding};
use rusqlite::Connection;
use std::collections::HashMap;

/// Resolve fused ids with one batched lookup, preserving fusion order
///
/// Ids whose finding vanished between search and lookup are dropped.
pub fn materialize(conn: &Connection, fused: Vec<FusedResult>) -> Result<Vec<SearchResult>> {
    if fused.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = fused.iter().map(|r| r.finding_id).collect();
    let mut findings: HashMap<i64, Finding> = fetch_findings(conn, &ids)?
        .into_iter()
        .map(|f| (f.id, f))
        .collect();

    let mut results = Vec::with_capacity(fused.len());
    for candidate in fused {
        match findings.remove(&candidate.finding_id) {
            Some(finding) => results.push(SearchResult {
                finding,
                fused_score: candidate.fused_score,
                vector_rank: candidate.vector_rank,
                lexical_rank: candidate.lexical_rank,
            }),
            None => {
                tracing::warn!(
                    "Finding {} disappeared before materialization, skipping",
                    candidate.finding_id
                );
            }
        }
    }

    Ok(results)
}
