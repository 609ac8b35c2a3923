//! Storage layer for findex
//!
//! A single SQLite file in WAL mode holds sessions, findings, the FTS5
//! lexical mirror and the sqlite-vec embedding table.

pub mod database;
pub mod findings;
pub mod model;

pub use database::{Database, DbConn, DbPool, DbStats};
pub use findings::FindingStore;
pub use model::{Finding, FindingType, NewFinding, Session, Severity};

pub(crate) use findings::fetch_findings;
pub(crate) use model::FINDING_COLUMNS;
