//! Hybrid search combining vector and lexical search

use crate::config::SearchConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{FindexError, Result};
use crate::retrieval::{fuse, materialize, SearchQuery, SearchResponse};
use crate::search::{bm25_search, vector_search};
use crate::storage::{Database, FindingType};
use std::sync::Arc;

/// Hybrid searcher combining vector and lexical search
pub struct HybridSearcher {
    database: Arc<Database>,
    config: SearchConfig,
}

impl HybridSearcher {
    /// Create a new hybrid searcher
    pub fn new(database: Arc<Database>, config: SearchConfig) -> Self {
        Self { database, config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Perform hybrid search with a caller-supplied query embedding
    ///
    /// Only configuration errors (schema missing, wrong embedding dimension)
    /// and storage failures are returned as errors. A lexical query the
    /// engine rejects counts as zero lexical hits.
    ///
    /// Both legs and the hydration read from one snapshot.
    pub fn search(&self, query: &SearchQuery) -> Result<SearchResponse> {
        let fusion = self.config.fusion()?;

        let mut conn = self.database.get_conn()?;
        let tx = conn.transaction()?;
        self.database.ensure_schema(&tx)?;

        let dimension = self.database.dimension();
        if query.embedding.len() != dimension {
            return Err(FindexError::DimensionMismatch {
                expected: dimension,
                actual: query.embedding.len(),
            });
        }

        let per_source = self.config.per_source_limit;

        // Step 1: lexical leg, failures degrade to no hits
        let lexical_hits = match bm25_search(&tx, &query.text, per_source, query.type_filter) {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("Lexical search failed for {:?}: {}", query.text, e);
                Vec::new()
            }
        };

        // Step 2: vector leg
        let vector_hits = vector_search(
            &tx,
            &query.embedding,
            dimension,
            per_source,
            query.type_filter,
        )?;

        // Step 3: Reciprocal Rank Fusion
        let fused = fuse(
            &vector_hits,
            &lexical_hits,
            &fusion,
            self.config.result_limit,
        );

        tracing::debug!(
            "Fused {} vector and {} lexical hits into {} candidates",
            vector_hits.len(),
            lexical_hits.len(),
            fused.len()
        );

        // Step 4: hydrate findings
        let results = materialize(&tx, fused)?;
        tx.commit()?;

        Ok(SearchResponse { results })
    }

    /// Embed `text` with `provider`, then run [`HybridSearcher::search`]
    pub fn search_text(
        &self,
        text: &str,
        type_filter: Option<FindingType>,
        provider: &dyn EmbeddingProvider,
    ) -> Result<SearchResponse> {
        let embedding = provider.embed(text)?;

        let mut query = SearchQuery::new(text, embedding);
        query.type_filter = type_filter;
        self.search(&query)
    }
}
