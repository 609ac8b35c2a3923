//! Nearest-neighbour search over the sqlite-vec embedding table

use crate::error::{FindexError, Result};
use crate::storage::FindingType;
use rusqlite::{params, Connection};

/// One vector match
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub finding_id: i64,
    /// Native vec0 distance (L2); smaller is more similar
    pub distance: f64,
}

/// Largest `k` the vec0 KNN operator accepts
pub const MAX_KNN_LIMIT: usize = 4096;

/// Little-endian f32 blob, the layout vec0 expects for `float[N]` columns
pub(crate) fn f32_vector_to_le_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|value| value.to_le_bytes()).collect()
}

/// k-nearest-neighbour search, closest first
///
/// A query whose length differs from `dimension` is a configuration error and
/// is reported as [`FindexError::DimensionMismatch`]. With a type filter the
/// candidate set is restricted through a join on `findings` before the
/// cutoff is applied, so `limit` hits of that type come back when they exist.
/// Limits above [`MAX_KNN_LIMIT`] take the same full-scan path. Equal
/// distances are ordered by ascending finding id.
pub fn vector_search(
    conn: &Connection,
    query: &[f32],
    dimension: usize,
    limit: usize,
    type_filter: Option<FindingType>,
) -> Result<Vec<VectorHit>> {
    if query.len() != dimension {
        return Err(FindexError::DimensionMismatch {
            expected: dimension,
            actual: query.len(),
        });
    }

    if limit == 0 {
        return Ok(Vec::new());
    }

    // vec0 rejects KNN queries against an empty table
    let has_vectors: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM finding_embeddings)",
        [],
        |row| row.get(0),
    )?;
    if !has_vectors {
        return Ok(Vec::new());
    }

    let query_bytes = f32_vector_to_le_bytes(query);

    let mut hits = if type_filter.is_none() && limit <= MAX_KNN_LIMIT {
        let mut stmt = conn.prepare_cached(
            "SELECT rowid, distance
             FROM finding_embeddings
             WHERE embedding MATCH ?1
               AND k = ?2
             ORDER BY distance",
        )?;
        let rows = stmt.query_map(params![query_bytes, limit as i64], map_hit)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    } else {
        let mut stmt = conn.prepare_cached(
            "SELECT e.rowid, vec_distance_l2(e.embedding, ?1) AS distance
             FROM finding_embeddings e
             JOIN findings f ON f.id = e.rowid
             WHERE (?2 IS NULL OR f.type = ?2)
             ORDER BY distance, e.rowid
             LIMIT ?3",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![query_bytes, type_filter, limit], map_hit)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    // vec0 leaves the order of equal distances unspecified
    hits.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.finding_id.cmp(&b.finding_id))
    });

    tracing::debug!("Vector query returned {} hits", hits.len());

    Ok(hits)
}

fn map_hit(row: &rusqlite::Row<'_>) -> rusqlite::Result<VectorHit> {
    Ok(VectorHit {
        finding_id: row.get(0)?,
        distance: row.get(1)?,
    })
}
