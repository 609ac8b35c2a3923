//! SQLite database management with migrations
//!
//! One database file holds the findings table, its FTS5 mirror and the
//! sqlite-vec embedding table. Triggers keep the mirrors in step with
//! `findings`, so every write path updates all three in one transaction.

use crate::error::{FindexError, Result};
use crate::storage::FindingType;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Once;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pooled connection handed out by [`Database::get_conn`]
pub type DbConn = r2d2::PooledConnection<SqliteConnectionManager>;

/// Tables that must exist before any query or write
const REQUIRED_TABLES: &[&str] = &["findings", "findings_fts", "finding_embeddings"];

/// Per-connection settings, applied to every connection the pool opens
const CONNECTION_PRAGMAS: &str = "
    PRAGMA busy_timeout = 5000;
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA foreign_keys = ON;
";

static SQLITE_VEC_INIT: Once = Once::new();

/// Register sqlite-vec as an auto extension so every new connection has it
/// loaded before its first statement runs.
fn register_vector_extension() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        // sqlite-vec exports a raw init symbol; SQLite takes a generic entry point.
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite_vec::sqlite3_vec_init as *const (),
        )));
    });
}

/// Database manager with migration support
pub struct Database {
    pool: DbPool,
    path: PathBuf,
    dimension: usize,
}

impl Database {
    /// Open (or create) the database file
    ///
    /// Loads the vector extension, enables write-ahead logging and checks
    /// that an existing vector table was built with `dimension`. The schema
    /// itself is created by [`Database::apply_schema`].
    pub fn open(db_path: &Path, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(FindexError::Config(
                "Embedding dimension must be greater than 0".to_string(),
            ));
        }

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| FindexError::Io {
                    source: e,
                    context: format!("Failed to create database directory: {:?}", parent),
                })?;
            }
        }

        register_vector_extension();

        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));

        let pool = Pool::builder().max_size(8).build(manager)?;

        let db = Self {
            pool,
            path: db_path.to_path_buf(),
            dimension,
        };

        {
            let conn = db.get_conn()?;
            let version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
            tracing::debug!("sqlite-vec {} loaded for {}", version, db.path.display());

            if let Some(existing) = indexed_dimension(&conn)? {
                if existing != dimension {
                    return Err(FindexError::DimensionMismatch {
                        expected: existing,
                        actual: dimension,
                    });
                }
            }
        }

        Ok(db)
    }

    /// Open the database and make sure the schema exists
    pub fn open_and_apply(db_path: &Path, dimension: usize) -> Result<Self> {
        let db = Self::open(db_path, dimension)?;
        db.apply_schema()?;
        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Embedding dimensionality of the vector table
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Create all tables, indexes and sync triggers that do not exist yet
    ///
    /// Safe to call on every start: statements are `IF NOT EXISTS` and
    /// recorded migrations are skipped.
    pub fn apply_schema(&self) -> Result<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i64 = tx.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i64 + 1;

            if version > current_version {
                tracing::info!("Applying migration {} to {}", version, self.path.display());

                let sql = migration.replace("{dimension}", &self.dimension.to_string());
                tx.execute_batch(&sql)?;

                tx.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Fail with [`FindexError::SchemaMissing`] unless every required structure exists
    pub fn ensure_schema(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare_cached(
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
        )?;

        for table in REQUIRED_TABLES {
            let count: i64 = stmt.query_row([table], |row| row.get(0))?;
            if count == 0 {
                return Err(FindexError::SchemaMissing {
                    path: self.path.clone(),
                });
            }
        }

        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.get_conn()?;
        self.ensure_schema(&conn)?;

        let session_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;

        let finding_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM findings", [], |row| row.get(0))?;

        let embedding_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM finding_embeddings", [], |row| {
                row.get(0)
            })?;

        // External-content FTS tables report the content table's rows on a
        // plain COUNT, so count the index's own docsize shadow table instead.
        let lexical_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM findings_fts_docsize", [], |row| {
                row.get(0)
            })?;

        let mut findings_by_type = BTreeMap::new();
        let mut stmt = conn.prepare("SELECT type, COUNT(*) FROM findings GROUP BY type")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, FindingType>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (finding_type, count) = row?;
            findings_by_type.insert(finding_type, count as usize);
        }

        Ok(DbStats {
            session_count: session_count as usize,
            finding_count: finding_count as usize,
            embedding_count: embedding_count as usize,
            lexical_count: lexical_count as usize,
            findings_by_type,
        })
    }
}

/// Dimension of an existing vector table, parsed from its declaration
fn indexed_dimension(conn: &Connection) -> Result<Option<usize>> {
    let sql: Option<String> = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE name = 'finding_embeddings'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    Ok(sql.as_deref().and_then(parse_vector_dimension))
}

fn parse_vector_dimension(create_sql: &str) -> Option<usize> {
    let start = create_sql.find("float[")? + "float[".len();
    let end = start + create_sql[start..].find(']')?;
    create_sql[start..end].trim().parse().ok()
}

/// Database statistics
#[derive(Debug)]
pub struct DbStats {
    pub session_count: usize,
    pub finding_count: usize,
    pub embedding_count: usize,
    pub lexical_count: usize,
    pub findings_by_type: BTreeMap<FindingType, usize>,
}

/// Database migrations (each string is one migration)
///
/// `{dimension}` is replaced with the configured embedding dimension.
const MIGRATIONS: &[&str] = &[
    // Migration 1: findings, lexical mirror, vector index
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        project TEXT,
        started_at TEXT,
        analyzed_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS findings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        type TEXT NOT NULL CHECK (type IN ('praise', 'blocker', 'suggestion', 'nitpick')),
        content TEXT NOT NULL,
        context TEXT,
        severity TEXT NOT NULL CHECK (severity IN ('low', 'medium', 'high')),
        tags TEXT,
        session_timestamp TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_findings_session ON findings(session_id);
    CREATE INDEX IF NOT EXISTS idx_findings_type ON findings(type);

    CREATE VIRTUAL TABLE IF NOT EXISTS findings_fts USING fts5(
        content, context, type,
        content='findings', content_rowid='id'
    );

    CREATE TRIGGER IF NOT EXISTS findings_fts_ai AFTER INSERT ON findings BEGIN
        INSERT INTO findings_fts(rowid, content, context, type)
        VALUES (new.id, new.content, new.context, new.type);
    END;

    CREATE TRIGGER IF NOT EXISTS findings_fts_ad AFTER DELETE ON findings BEGIN
        INSERT INTO findings_fts(findings_fts, rowid, content, context, type)
        VALUES ('delete', old.id, old.content, old.context, old.type);
    END;

    CREATE TRIGGER IF NOT EXISTS findings_fts_au AFTER UPDATE ON findings BEGIN
        INSERT INTO findings_fts(findings_fts, rowid, content, context, type)
        VALUES ('delete', old.id, old.content, old.context, old.type);
        INSERT INTO findings_fts(rowid, content, context, type)
        VALUES (new.id, new.content, new.context, new.type);
    END;

    CREATE VIRTUAL TABLE IF NOT EXISTS finding_embeddings USING vec0(
        embedding float[{dimension}]
    );

    CREATE TRIGGER IF NOT EXISTS findings_embedding_ad AFTER DELETE ON findings BEGIN
        DELETE FROM finding_embeddings WHERE rowid = old.id;
    END;
    "#,
];
