//! The two ranked sources fused by hybrid retrieval

mod lexical;
mod vector;

pub use lexical::{bm25_search, escape_fts_query, LexicalHit};
pub use vector::{vector_search, VectorHit, MAX_KNN_LIMIT};

pub(crate) use vector::f32_vector_to_le_bytes;
