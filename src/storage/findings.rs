//! Finding repository
//!
//! The only code path that writes to `findings`. Every mutation runs in a
//! single transaction together with its embedding write; the schema triggers
//! mirror the same statement into the lexical index and drop stale vectors.

use crate::error::{FindexError, Result};
use crate::search::f32_vector_to_le_bytes;
use crate::storage::{Database, Finding, NewFinding, Session, FINDING_COLUMNS};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use std::sync::Arc;

/// Repository for finding records and their embeddings
pub struct FindingStore {
    database: Arc<Database>,
}

impl FindingStore {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    /// Insert or refresh a session's metadata
    pub fn upsert_session(&self, session: &Session) -> Result<()> {
        let conn = self.database.get_conn()?;
        self.database.ensure_schema(&conn)?;

        conn.execute(
            "INSERT INTO sessions (id, project, started_at, analyzed_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                project = COALESCE(excluded.project, sessions.project),
                started_at = COALESCE(excluded.started_at, sessions.started_at),
                analyzed_at = excluded.analyzed_at",
            params![
                session.id,
                session.project,
                session.started_at,
                session.analyzed_at
            ],
        )?;

        Ok(())
    }

    /// Insert one finding, and its embedding when given, atomically
    pub fn insert(&self, finding: &NewFinding, embedding: Option<&[f32]>) -> Result<i64> {
        self.validate(finding, embedding)?;

        let mut conn = self.database.get_conn()?;
        self.database.ensure_schema(&conn)?;

        let tx = conn.transaction()?;
        let id = insert_finding(&tx, finding, embedding)?;
        tx.commit()?;

        tracing::debug!(
            "Inserted {} finding {} for session {}",
            finding.finding_type,
            id,
            finding.session_id
        );

        Ok(id)
    }

    /// Replace every finding of a session with a fresh set
    ///
    /// Old findings, their lexical entries and their embeddings are removed
    /// and the new ones inserted in one transaction, so readers see either
    /// the previous analysis or the new one.
    pub fn replace_session_findings(
        &self,
        session_id: &str,
        findings: &[(NewFinding, Vec<f32>)],
    ) -> Result<Vec<i64>> {
        for (finding, embedding) in findings {
            if finding.session_id != session_id {
                return Err(FindexError::InvalidFinding(format!(
                    "Finding belongs to session '{}', expected '{}'",
                    finding.session_id, session_id
                )));
            }
            self.validate(finding, Some(embedding.as_slice()))?;
        }

        let mut conn = self.database.get_conn()?;
        self.database.ensure_schema(&conn)?;

        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM findings WHERE session_id = ?1", [session_id])?;

        let mut ids = Vec::with_capacity(findings.len());
        for (finding, embedding) in findings {
            ids.push(insert_finding(&tx, finding, Some(embedding.as_slice()))?);
        }
        tx.commit()?;

        tracing::info!(
            "Replaced {} findings of session {} with {}",
            removed,
            session_id,
            ids.len()
        );

        Ok(ids)
    }

    /// Attach or replace the embedding of an existing finding
    pub fn set_embedding(&self, finding_id: i64, embedding: &[f32]) -> Result<()> {
        self.check_dimension(embedding)?;

        let mut conn = self.database.get_conn()?;
        self.database.ensure_schema(&conn)?;

        let tx = conn.transaction()?;
        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM findings WHERE id = ?1",
                [finding_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(FindexError::InvalidFinding(format!(
                "Finding {} does not exist",
                finding_id
            )));
        }

        // vec0 has no conflict clauses, so replace by delete then insert.
        tx.execute(
            "DELETE FROM finding_embeddings WHERE rowid = ?1",
            [finding_id],
        )?;
        insert_embedding(&tx, finding_id, embedding)?;
        tx.commit()?;

        Ok(())
    }

    /// Delete one finding; returns whether it existed
    pub fn delete(&self, finding_id: i64) -> Result<bool> {
        let conn = self.database.get_conn()?;
        self.database.ensure_schema(&conn)?;

        let removed = conn.execute("DELETE FROM findings WHERE id = ?1", [finding_id])?;
        Ok(removed > 0)
    }

    /// Delete every finding of a session ahead of re-analysis
    pub fn delete_session_findings(&self, session_id: &str) -> Result<usize> {
        let conn = self.database.get_conn()?;
        self.database.ensure_schema(&conn)?;

        let removed = conn.execute("DELETE FROM findings WHERE session_id = ?1", [session_id])?;
        tracing::info!("Purged {} findings of session {}", removed, session_id);
        Ok(removed)
    }

    pub fn get(&self, finding_id: i64) -> Result<Option<Finding>> {
        let conn = self.database.get_conn()?;
        self.database.ensure_schema(&conn)?;

        let finding = conn
            .query_row(
                &format!("SELECT {} FROM findings WHERE id = ?1", FINDING_COLUMNS),
                [finding_id],
                Finding::from_row,
            )
            .optional()?;
        Ok(finding)
    }

    /// Batched lookup; result order is unspecified and missing ids are skipped
    pub fn get_many(&self, ids: &[i64]) -> Result<Vec<Finding>> {
        let conn = self.database.get_conn()?;
        self.database.ensure_schema(&conn)?;
        fetch_findings(&conn, ids)
    }

    pub fn list_by_session(&self, session_id: &str) -> Result<Vec<Finding>> {
        let conn = self.database.get_conn()?;
        self.database.ensure_schema(&conn)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM findings WHERE session_id = ?1 ORDER BY id",
            FINDING_COLUMNS
        ))?;
        let findings = stmt
            .query_map([session_id], Finding::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(findings)
    }

    fn validate(&self, finding: &NewFinding, embedding: Option<&[f32]>) -> Result<()> {
        if finding.session_id.trim().is_empty() {
            return Err(FindexError::InvalidFinding(
                "Session id cannot be empty".to_string(),
            ));
        }

        if finding.content.trim().is_empty() {
            return Err(FindexError::InvalidFinding(
                "Finding content cannot be empty".to_string(),
            ));
        }

        if let Some(embedding) = embedding {
            self.check_dimension(embedding)?;
        }

        Ok(())
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        let expected = self.database.dimension();
        if embedding.len() != expected {
            return Err(FindexError::DimensionMismatch {
                expected,
                actual: embedding.len(),
            });
        }
        Ok(())
    }
}

fn insert_finding(tx: &Transaction<'_>, finding: &NewFinding, embedding: Option<&[f32]>) -> Result<i64> {
    // Sessions are owned elsewhere; make sure the referenced row exists.
    tx.execute(
        "INSERT OR IGNORE INTO sessions (id, analyzed_at) VALUES (?1, datetime('now'))",
        [&finding.session_id],
    )?;

    tx.execute(
        "INSERT INTO findings (session_id, type, content, context, severity, tags, session_timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            finding.session_id,
            finding.finding_type,
            finding.content,
            finding.context,
            finding.severity,
            finding.tags_json()?,
            finding.session_timestamp
        ],
    )?;
    let id = tx.last_insert_rowid();

    if let Some(embedding) = embedding {
        insert_embedding(tx, id, embedding)?;
    }

    Ok(id)
}

fn insert_embedding(tx: &Transaction<'_>, finding_id: i64, embedding: &[f32]) -> Result<()> {
    tx.execute(
        "INSERT INTO finding_embeddings (rowid, embedding) VALUES (?1, ?2)",
        params![finding_id, f32_vector_to_le_bytes(embedding)],
    )?;
    Ok(())
}

/// Fetch findings by id with one `IN (...)` query
pub(crate) fn fetch_findings(conn: &Connection, ids: &[i64]) -> Result<Vec<Finding>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT {} FROM findings WHERE id IN ({})",
        FINDING_COLUMNS, placeholders
    );

    let mut stmt = conn.prepare(&sql)?;
    let findings = stmt
        .query_map(params_from_iter(ids.iter()), Finding::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(findings)
}
