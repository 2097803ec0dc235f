//! Tests for the in-memory vector store: bulk insertion, search and stats.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{FailingProvider, FixedDimensionProvider, SlowProvider, WordHashProvider};
use ragline::document::{CHUNK_INDEX, SIMILARITY_METHOD};
use ragline::{
    EmbeddingClient, InMemoryVectorStore, Metadata, MetadataValue, RagError, SimilarityMethod,
};
use proptest::prelude::*;

fn word_store() -> InMemoryVectorStore {
    InMemoryVectorStore::with_provider(Arc::new(WordHashProvider::new(257)))
}

fn wellness_docs() -> Vec<String> {
    vec![
        "Regular exercise improves mood and sleep quality.".to_string(),
        "Deep breathing techniques calm the nervous system.".to_string(),
        "A balanced diet supports long term health.".to_string(),
        "Journaling helps people process difficult emotions.".to_string(),
    ]
}

fn indexed_metadata(n: usize) -> Vec<Metadata> {
    (0..n)
        .map(|i| Metadata::from([(CHUNK_INDEX.to_string(), MetadataValue::from(i))]))
        .collect()
}

#[tokio::test]
async fn bulk_add_then_search_finds_the_relevant_chunk() {
    let store = word_store();
    store.add_documents(wellness_docs(), Some(indexed_metadata(4))).await.unwrap();

    let results = store.search("breathing techniques", 2, SimilarityMethod::Cosine).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].text, "Deep breathing techniques calm the nervous system.");
    assert!(results[0].score >= results[1].score);
    assert_eq!(results[0].metadata[CHUNK_INDEX], MetadataValue::Integer(1));
}

#[tokio::test]
async fn results_carry_the_similarity_method() {
    let store = word_store();
    store.add_documents(wellness_docs(), None).await.unwrap();

    for method in SimilarityMethod::ALL {
        let results = store.search("healthy diet", 4, method).await.unwrap();
        assert_eq!(results.len(), 4);
        for result in &results {
            assert_eq!(result.metadata[SIMILARITY_METHOD].as_str(), Some(method.as_str()));
        }
    }
}

#[tokio::test]
async fn stored_metadata_is_not_mutated_by_search() {
    let store = word_store();
    store.add_documents(wellness_docs(), Some(indexed_metadata(4))).await.unwrap();

    store.search("sleep", 1, SimilarityMethod::Euclidean).await.unwrap();
    let results = store.search("sleep", 4, SimilarityMethod::Cosine).await.unwrap();
    for result in results {
        assert_eq!(result.metadata.len(), 2);
        assert_eq!(result.metadata[SIMILARITY_METHOD].as_str(), Some("cosine"));
    }
}

#[tokio::test]
async fn empty_store_search_returns_nothing_without_calling_the_provider() {
    let provider = Arc::new(FailingProvider::default());
    let store = InMemoryVectorStore::with_provider(provider.clone());

    let results = store.search("anything", 5, SimilarityMethod::Cosine).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn top_k_is_clamped_to_corpus_size() {
    let store = word_store();
    store.add_documents(wellness_docs(), None).await.unwrap();

    let results = store.search("health", 50, SimilarityMethod::Cosine).await.unwrap();
    assert_eq!(results.len(), 4);

    let results = store.search("health", 0, SimilarityMethod::Cosine).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn empty_query_is_a_validation_error() {
    let store = word_store();
    store.add_documents(wellness_docs(), None).await.unwrap();

    let err = store.search("   ", 2, SimilarityMethod::Cosine).await.unwrap_err();
    assert!(matches!(err, RagError::ValidationError(_)));
}

#[tokio::test]
async fn bulk_validation_failures_leave_store_unchanged() {
    let store = word_store();
    store.add_documents(vec!["existing chunk".to_string()], None).await.unwrap();

    let err = store.add_documents(Vec::new(), None).await.unwrap_err();
    assert!(matches!(err, RagError::ValidationError(msg) if msg.contains("cannot be empty")));

    let err = store.add_documents(wellness_docs(), Some(indexed_metadata(3))).await.unwrap_err();
    assert!(
        matches!(err, RagError::ValidationError(msg) if msg.contains("(3)") && msg.contains("(4)"))
    );

    let err = store
        .add_documents(vec!["fine".to_string(), String::new()], None)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::ValidationError(_)));

    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn provider_failure_leaves_store_unchanged() {
    let store = InMemoryVectorStore::with_provider(Arc::new(FailingProvider::default()));
    store.insert("seed", vec![1.0, 0.0, 0.0, 0.0], None).await.unwrap();

    let err = store.add_documents(wellness_docs(), None).await.unwrap_err();

    assert!(matches!(err, RagError::EmbeddingError { .. }));
    assert_eq!(store.len().await, 1);
    assert_eq!(store.dimension().await, Some(4));
}

#[tokio::test]
async fn provider_dimension_disagreeing_with_store_is_rejected() {
    let store = InMemoryVectorStore::with_provider(Arc::new(FixedDimensionProvider { dimensions: 3 }));
    store.insert("seed", vec![1.0; 5], None).await.unwrap();

    let err = store.add_documents(vec!["new".to_string()], None).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 5, actual: 3 }));

    let err = store.search("query", 1, SimilarityMethod::Cosine).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 5, actual: 3 }));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn insert_enforces_first_dimension() {
    let store = word_store();
    store.insert("a", vec![1.0, 2.0], None).await.unwrap();

    let err = store.insert("b", vec![1.0, 2.0, 3.0], None).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 3 }));

    let err = store.insert("c", Vec::new(), None).await.unwrap_err();
    assert!(matches!(err, RagError::ValidationError(_)));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn clear_resets_contents_and_dimension() {
    let store = word_store();
    store.add_documents(wellness_docs(), None).await.unwrap();
    assert_eq!(store.dimension().await, Some(257));

    store.clear().await;
    assert!(store.is_empty().await);
    assert_eq!(store.dimension().await, None);

    store.insert("different shape", vec![1.0, 0.0], None).await.unwrap();
    assert_eq!(store.dimension().await, Some(2));
}

#[tokio::test]
async fn equal_scores_keep_insertion_order() {
    let store = word_store();
    for name in ["first", "second", "third"] {
        store.insert(name, vec![1.0, 1.0], None).await.unwrap();
    }
    store.insert("best", vec![1.0, 0.9], None).await.unwrap();

    let results = store
        .search_by_embedding(&[1.0, 1.0], 3, SimilarityMethod::Euclidean)
        .await
        .unwrap();
    let texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn signed_zero_cosine_scores_tie_in_insertion_order() {
    let store = word_store();
    store.insert("first", vec![0.0, -1.0], None).await.unwrap();
    store.insert("second", vec![0.0, 1.0], None).await.unwrap();

    // Both rows are orthogonal to the query; one dot product is `-0.0`.
    let results =
        store.search_by_embedding(&[-1.0, 0.0], 2, SimilarityMethod::Cosine).await.unwrap();

    let texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
    for result in &results {
        assert_eq!(result.score, 0.0);
        assert!(result.score.is_sign_positive());
    }
}

#[tokio::test]
async fn zero_norm_query_fails_cosine_but_not_euclidean() {
    let store = word_store();
    store.insert("a", vec![1.0, 0.0], None).await.unwrap();

    let err = store
        .search_by_embedding(&[0.0, 0.0], 1, SimilarityMethod::Cosine)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::ValidationError(_)));

    let results = store
        .search_by_embedding(&[0.0, 0.0], 1, SimilarityMethod::Euclidean)
        .await
        .unwrap();
    assert!((results[0].score - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn euclidean_and_cosine_can_rank_differently() {
    let store = word_store();
    store.insert("same direction, far", vec![10.0, 0.0], None).await.unwrap();
    store.insert("other direction, near", vec![0.8, 0.6], None).await.unwrap();

    let cosine = store.search_by_embedding(&[1.0, 0.0], 1, SimilarityMethod::Cosine).await.unwrap();
    let euclid =
        store.search_by_embedding(&[1.0, 0.0], 1, SimilarityMethod::Euclidean).await.unwrap();

    assert_eq!(cosine[0].text, "same direction, far");
    assert_eq!(euclid[0].text, "other direction, near");
}

#[tokio::test]
async fn stats_report_count_dimension_and_size() {
    let store = word_store();
    assert_eq!(store.stats().await.embedding_dimension, None);
    assert_eq!(store.stats().await.total_size_mb, 0.0);

    // 512 rows of 512 f32 values is exactly one megabyte.
    for i in 0..512 {
        store.insert(format!("row {i}"), vec![0.5; 512], None).await.unwrap();
    }
    let stats = store.stats().await;
    assert_eq!(stats.num_documents, 512);
    assert_eq!(stats.embedding_dimension, Some(512));
    assert_eq!(stats.total_size_mb, 1.0);
}

#[tokio::test]
async fn build_from_list_returns_populated_store() {
    let store = word_store().build_from_list(wellness_docs(), None).await.unwrap();
    assert_eq!(store.len().await, 4);

    let err = word_store().build_from_list(Vec::new(), None).await.unwrap_err();
    assert!(matches!(err, RagError::ValidationError(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_observe_partial_batches() {
    const WRITERS: usize = 8;
    const BATCH: usize = 5;

    let provider = Arc::new(SlowProvider { delay: Duration::from_millis(2) });
    let client = EmbeddingClient::new(provider).with_batch_size(2).with_max_concurrency(2);
    let store = Arc::new(InMemoryVectorStore::new(client));

    let writers: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let texts = (0..BATCH).map(|row| format!("writer {writer} row {row}")).collect();
                store.add_documents(texts, None).await.unwrap();
                if writer == WRITERS / 2 {
                    store.clear().await;
                }
            })
        })
        .collect();

    let reader = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for _ in 0..200 {
                let stats = store.stats().await;
                assert_eq!(stats.num_documents % BATCH, 0, "saw {} rows", stats.num_documents);

                let results = store
                    .search_by_embedding(&[1.0, 1.0], usize::MAX, SimilarityMethod::Euclidean)
                    .await
                    .unwrap();
                let mut rows_per_writer: HashMap<String, usize> = HashMap::new();
                for result in &results {
                    let writer = result.text.split(" row ").next().unwrap().to_string();
                    *rows_per_writer.entry(writer).or_default() += 1;
                }
                for (writer, rows) in rows_per_writer {
                    assert_eq!(rows, BATCH, "{writer} is only partially visible");
                }
                tokio::task::yield_now().await;
            }
        })
    };

    for writer in writers {
        writer.await.unwrap();
    }
    reader.await.unwrap();

    let len = store.len().await;
    assert_eq!(len % BATCH, 0);
    assert!(len <= WRITERS * BATCH);
}

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero embedding", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-8 {
            return None;
        }
        for val in &mut v {
            *val /= norm;
        }
        Some(v)
    })
}

/// For any stored rows, search returns at most `min(top_k, len)` results in
/// descending score order under either method, and the store keeps its three
/// arrays the same length.
mod prop_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            rows in proptest::collection::vec(("[a-z ]{5,30}", arb_normalized_embedding(DIM)), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
            euclidean in any::<bool>(),
        ) {
            let method = if euclidean { SimilarityMethod::Euclidean } else { SimilarityMethod::Cosine };
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, count) = rt.block_on(async {
                let store = word_store();
                for (text, embedding) in &rows {
                    store.insert(text.clone(), embedding.clone(), None).await.unwrap();
                }
                let results = store.search_by_embedding(&query, top_k, method).await.unwrap();
                (results, store.stats().await.num_documents)
            });

            prop_assert_eq!(count, rows.len());
            prop_assert_eq!(results.len(), top_k.min(rows.len()));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }
    }
}
