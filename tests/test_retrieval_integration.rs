//! Hybrid retrieval end to end: schema, repository writes, both search legs,
//! fusion and materialization against a real database file.

use findex::config::SearchConfig;
use findex::embedding::{EmbeddingError, EmbeddingProvider};
use findex::retrieval::{HybridSearcher, SearchQuery};
use findex::search::{bm25_search, vector_search};
use findex::storage::{Database, FindingStore, FindingType, NewFinding, Severity};
use findex::FindexError;
use std::sync::Arc;
use tempfile::TempDir;

const DIM: usize = 4;

/// Deterministic embedder: one axis per keyword, so nearest neighbours are predictable
struct KeywordEmbedder;

impl EmbeddingProvider for KeywordEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|text| {
                let text = text.to_lowercase();
                ["memory", "test", "naming", "docs"]
                    .iter()
                    .map(|kw| if text.contains(kw) { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "keyword-embedder"
    }
}

struct Fixture {
    _temp: TempDir,
    db: Arc<Database>,
    store: FindingStore,
    searcher: HybridSearcher,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let db = Arc::new(Database::open_and_apply(&temp.path().join("findings.db"), DIM).unwrap());
    let store = FindingStore::new(db.clone());
    let searcher = HybridSearcher::new(db.clone(), SearchConfig::default());
    Fixture {
        _temp: temp,
        db,
        store,
        searcher,
    }
}

fn add(fx: &Fixture, finding_type: FindingType, content: &str, embedding: Option<[f32; DIM]>) -> i64 {
    let finding = NewFinding::new("session-1", finding_type, content, Severity::Medium);
    fx.store
        .insert(&finding, embedding.as_ref().map(|e| e.as_slice()))
        .unwrap()
}

#[test]
fn test_both_sources_fuse_ahead_of_single_source() {
    let fx = fixture();

    // Matches the text and sits nearest to the query vector.
    let both = add(&fx, FindingType::Blocker, "memory leak in cache", Some([1.0, 0.0, 0.0, 0.0]));
    // Only close in vector space.
    let vector_only = add(&fx, FindingType::Suggestion, "unbounded buffer growth", Some([0.9, 0.1, 0.0, 0.0]));
    // Only a lexical match.
    let lexical_only = add(&fx, FindingType::Nitpick, "leak wording in docs", None);

    let response = fx
        .searcher
        .search(&SearchQuery::new("leak", vec![1.0, 0.0, 0.0, 0.0]))
        .unwrap();

    let ids: Vec<i64> = response.iter().map(|r| r.finding.id).collect();
    assert_eq!(ids[0], both);
    assert!(ids.contains(&vector_only));
    assert!(ids.contains(&lexical_only));

    let top = &response.results[0];
    assert_eq!(top.vector_rank, Some(1));
    assert!(top.lexical_rank.is_some());

    let vector_result = response.iter().find(|r| r.finding.id == vector_only).unwrap();
    assert_eq!(vector_result.lexical_rank, None);
    assert_eq!(vector_result.vector_rank, Some(2));

    let lexical_result = response.iter().find(|r| r.finding.id == lexical_only).unwrap();
    assert_eq!(lexical_result.vector_rank, None);
}

#[test]
fn test_results_capped_at_twenty() {
    let fx = fixture();

    for i in 0..30 {
        add(
            &fx,
            FindingType::Suggestion,
            &format!("refactor candidate number {}", i),
            Some([1.0, i as f32, 0.0, 0.0]),
        );
    }

    let response = fx
        .searcher
        .search(&SearchQuery::new("refactor", vec![1.0, 0.0, 0.0, 0.0]))
        .unwrap();

    assert_eq!(response.len(), 20);
    assert!(response
        .results
        .windows(2)
        .all(|w| w[0].fused_score >= w[1].fused_score));
}

#[test]
fn test_syntax_heavy_query_falls_back_to_vector() {
    let fx = fixture();
    let id = add(&fx, FindingType::Praise, "great test coverage", Some([0.0, 1.0, 0.0, 0.0]));

    for query in [r#""quote""#, "AND", "*", r#"NEAR("x" AND) *"#] {
        let response = fx
            .searcher
            .search(&SearchQuery::new(query, vec![0.0, 1.0, 0.0, 0.0]))
            .unwrap();

        assert_eq!(response.len(), 1, "query {:?}", query);
        assert_eq!(response.results[0].finding.id, id);
        assert_eq!(response.results[0].lexical_rank, None);
    }
}

#[test]
fn test_type_filter_applies_to_both_legs() {
    let fx = fixture();
    add(&fx, FindingType::Blocker, "naming collision breaks build", Some([0.0, 0.0, 1.0, 0.0]));
    let nit = add(&fx, FindingType::Nitpick, "naming is inconsistent", Some([0.0, 0.0, 1.0, 0.0]));

    let response = fx
        .searcher
        .search(
            &SearchQuery::new("naming", vec![0.0, 0.0, 1.0, 0.0])
                .with_type_filter(FindingType::Nitpick),
        )
        .unwrap();

    assert_eq!(response.len(), 1);
    assert_eq!(response.results[0].finding.id, nit);
    assert_eq!(response.results[0].vector_rank, Some(1));
    assert_eq!(response.results[0].lexical_rank, Some(1));
}

#[test]
fn test_deleted_finding_leaves_both_sources() {
    let fx = fixture();
    let id = add(&fx, FindingType::Blocker, "memory corruption on resize", Some([1.0, 0.0, 0.0, 0.0]));

    let conn = fx.db.get_conn().unwrap();
    assert_eq!(bm25_search(&conn, "corruption", 10, None).unwrap().len(), 1);
    assert_eq!(vector_search(&conn, &[1.0, 0.0, 0.0, 0.0], DIM, 10, None).unwrap().len(), 1);

    assert!(fx.store.delete(id).unwrap());

    assert!(bm25_search(&conn, "corruption", 10, None).unwrap().is_empty());
    assert!(vector_search(&conn, &[1.0, 0.0, 0.0, 0.0], DIM, 10, None).unwrap().is_empty());

    let response = fx
        .searcher
        .search(&SearchQuery::new("corruption", vec![1.0, 0.0, 0.0, 0.0]))
        .unwrap();
    assert!(response.is_empty());
}

#[test]
fn test_session_delete_cascades_to_indexes() {
    let fx = fixture();
    add(&fx, FindingType::Praise, "docs are thorough", Some([0.0, 0.0, 0.0, 1.0]));

    let conn = fx.db.get_conn().unwrap();
    conn.execute("DELETE FROM sessions WHERE id = 'session-1'", [])
        .unwrap();

    assert!(bm25_search(&conn, "thorough", 10, None).unwrap().is_empty());
    assert!(vector_search(&conn, &[0.0, 0.0, 0.0, 1.0], DIM, 10, None).unwrap().is_empty());
    assert_eq!(fx.db.stats().unwrap().finding_count, 0);
}

#[test]
fn test_reanalysis_swaps_session_atomically() {
    let fx = fixture();
    let embedder = KeywordEmbedder;

    add(&fx, FindingType::Blocker, "memory usage spikes", Some([1.0, 0.0, 0.0, 0.0]));

    let fresh = vec![
        NewFinding::new("session-1", FindingType::Praise, "test suite is fast", Severity::Low),
        NewFinding::new("session-1", FindingType::Nitpick, "docs typo", Severity::Low),
    ];
    let texts: Vec<String> = fresh.iter().map(|f| f.content.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).unwrap();
    let items: Vec<(NewFinding, Vec<f32>)> = fresh.into_iter().zip(embeddings).collect();

    fx.store.replace_session_findings("session-1", &items).unwrap();

    let stats = fx.db.stats().unwrap();
    assert_eq!(stats.finding_count, 2);
    assert_eq!(stats.embedding_count, 2);
    assert_eq!(stats.lexical_count, 2);

    let response = fx
        .searcher
        .search_text("memory", None, &embedder)
        .unwrap();
    assert!(response.iter().all(|r| !r.finding.content.contains("memory")));
    assert!(response.iter().all(|r| r.lexical_rank.is_none()));

    let response = fx.searcher.search_text("test", None, &embedder).unwrap();
    assert_eq!(response.results[0].finding.content, "test suite is fast");
}

#[test]
fn test_configuration_errors_are_distinct_from_no_results() {
    let temp = TempDir::new().unwrap();
    let db = Arc::new(Database::open(&temp.path().join("findings.db"), DIM).unwrap());
    let searcher = HybridSearcher::new(db.clone(), SearchConfig::default());

    let err = searcher
        .search(&SearchQuery::new("x", vec![0.0; DIM]))
        .unwrap_err();
    assert!(matches!(err, FindexError::SchemaMissing { .. }));

    db.apply_schema().unwrap();
    let response = searcher.search(&SearchQuery::new("x", vec![0.0; DIM])).unwrap();
    assert!(response.is_empty());

    let err = searcher.search(&SearchQuery::new("x", vec![0.0; 2])).unwrap_err();
    assert!(matches!(
        err,
        FindexError::DimensionMismatch {
            expected: DIM,
            actual: 2
        }
    ));
}

#[test]
fn test_json_output_marks_missing_ranks_null() {
    let fx = fixture();
    add(&fx, FindingType::Suggestion, "split this function", Some([0.0, 0.0, 1.0, 0.0]));

    let response = fx
        .searcher
        .search(&SearchQuery::new("unrelated", vec![0.0, 0.0, 1.0, 0.0]))
        .unwrap();

    let json = serde_json::to_value(&response).unwrap();
    let first = &json["results"][0];
    assert_eq!(first["vector_rank"], 1);
    assert!(first["lexical_rank"].is_null());
    assert_eq!(first["finding"]["type"], "suggestion");
}
