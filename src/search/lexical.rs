//! BM25 search over the FTS5 mirror of `findings`

use crate::error::Result;
use crate::storage::FindingType;
use rusqlite::{params, Connection};

/// FTS5 operators that must not reach MATCH as barewords
const FTS_OPERATORS: &[&str] = &["AND", "OR", "NOT", "NEAR"];

/// One lexical match
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub finding_id: i64,
    /// 1-based position in the lexical result list
    pub rank: usize,
    /// Raw FTS5 bm25() value (more negative is more relevant)
    pub score: f64,
}

/// Turn free text into an FTS5 query that cannot raise a syntax error
///
/// Plain words pass through unchanged. Any term containing syntax characters,
/// or spelling a boolean operator, is wrapped in double quotes with embedded
/// quotes doubled, so it matches literally. Terms without a single letter or
/// digit are dropped. Returns `None` when nothing searchable is left.
pub fn escape_fts_query(raw: &str) -> Option<String> {
    let terms: Vec<String> = raw.split_whitespace().filter_map(escape_term).collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

fn escape_term(term: &str) -> Option<String> {
    if !term.chars().any(char::is_alphanumeric) {
        return None;
    }

    let bareword = term.chars().all(|c| c.is_alphanumeric() || c == '_');
    if bareword && !FTS_OPERATORS.contains(&term) {
        Some(term.to_string())
    } else {
        Some(format!("\"{}\"", term.replace('"', "\"\"")))
    }
}

/// Ranked full-text search, best match first
///
/// Errors from the engine are returned as-is; the hybrid searcher treats
/// them as an empty lexical leg.
pub fn bm25_search(
    conn: &Connection,
    query: &str,
    limit: usize,
    type_filter: Option<FindingType>,
) -> Result<Vec<LexicalHit>> {
    let fts_query = match escape_fts_query(query) {
        Some(q) => q,
        None => {
            tracing::debug!("Query {:?} has no searchable terms", query);
            return Ok(Vec::new());
        }
    };

    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let mut stmt = conn.prepare_cached(
        "SELECT findings_fts.rowid, bm25(findings_fts)
         FROM findings_fts
         JOIN findings f ON f.id = findings_fts.rowid
         WHERE findings_fts MATCH ?1
           AND (?2 IS NULL OR f.type = ?2)
         ORDER BY bm25(findings_fts), findings_fts.rowid
         LIMIT ?3",
    )?;

    let rows = stmt.query_map(params![fts_query, type_filter, limit], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
    })?;

    let mut hits = Vec::new();
    for (position, row) in rows.enumerate() {
        let (finding_id, score) = row?;
        hits.push(LexicalHit {
            finding_id,
            rank: position + 1,
            score,
        });
    }

    tracing::debug!("Lexical query {:?} returned {} hits", fts_query, hits.len());

    Ok(hits)
}
