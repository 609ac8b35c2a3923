//! findex - hybrid search over development session findings
//!
//! Findings (praise, blockers, suggestions, nitpicks) live in one SQLite
//! file with an FTS5 mirror and a sqlite-vec embedding table. Queries run
//! BM25 and nearest-neighbour search side by side and merge the two ranked
//! lists with weighted Reciprocal Rank Fusion.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod retrieval;
pub mod search;
pub mod storage;

pub use error::{FindexError, Result};
