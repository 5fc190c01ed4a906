//! End-to-end scenarios across chunking, ingestion, and retrieval.

use std::collections::HashMap;

use quarry_embed::EmbeddingService;
use quarry_embed::mock::MockEmbedder;
use quarry_index::{
    Chunker, ChunkerConfig, FilterValue, IngestionPipeline, LocalVectorStore, RetrievalConfig,
    Retriever, SearchFilters, SearchQuery,
};

const DIMENSION: usize = 16;

fn offline_service() -> EmbeddingService<MockEmbedder> {
    EmbeddingService::new(None, 10, DIMENSION)
}

fn chunker(max_characters: usize, overlap: usize, max_tokens: usize) -> Chunker {
    Chunker::new(ChunkerConfig {
        max_characters,
        overlap,
        max_tokens,
        approx_tokens_per_char: 0.25,
    })
    .unwrap()
}

async fn open_store(dir: &tempfile::TempDir) -> LocalVectorStore {
    LocalVectorStore::open(dir.path().join("store.json"))
        .await
        .unwrap()
}

#[tokio::test]
async fn three_paragraph_document_yields_three_positioned_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline =
        IngestionPipeline::new(chunker(50, 5, 1000), offline_service(), open_store(&dir).await);

    let text = "The intake stage reads files.\n\n\
                The parsing stage splits text.\n\n\
                The final stage writes output.";
    let result = pipeline
        .ingest_bytes(text.as_bytes(), "stages.txt", &HashMap::new())
        .await
        .unwrap();
    assert_eq!(result.chunks_indexed, 3);

    let store = open_store(&dir).await;
    let hits = store
        .search("stage", &[], None, &[], 0.0, 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);
    let mut positions: Vec<String> = hits
        .iter()
        .map(|h| h.metadata["chunk_position"].clone())
        .collect();
    positions.sort();
    assert_eq!(positions, vec!["0", "1", "2"]);
    for hit in &hits {
        assert!(hit.content.chars().count() <= 50);
        assert_eq!(hit.metadata["document_id"], result.document_id);
    }
}

#[tokio::test]
async fn semantic_query_identical_to_stored_text_ranks_first() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline =
        IngestionPipeline::new(chunker(200, 5, 1000), offline_service(), open_store(&dir).await);

    pipeline
        .ingest_bytes(
            b"quantum entanglement experiments",
            "physics.txt",
            &HashMap::new(),
        )
        .await
        .unwrap();
    pipeline
        .ingest_bytes(
            b"baking sourdough bread at home",
            "kitchen.txt",
            &HashMap::new(),
        )
        .await
        .unwrap();

    let retriever = Retriever::new(offline_service(), open_store(&dir).await, RetrievalConfig {
        hybrid_weight: 1.0,
        ..RetrievalConfig::default()
    });

    // The offline service embeds query and chunk text identically, so an
    // identical question reproduces the stored vector exactly.
    let results = retriever
        .retrieve(&SearchQuery {
            question: "quantum entanglement experiments".into(),
            max_results: 2,
            filters: None,
        })
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].content.contains("quantum"));
    assert!((results[0].score - 1.0).abs() < 1e-5);
    assert!(results[1].score < results[0].score);
}

#[tokio::test]
async fn lexical_only_query_scores_half_for_two_of_four_terms() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline =
        IngestionPipeline::new(chunker(200, 5, 1000), offline_service(), open_store(&dir).await);

    pipeline
        .ingest_bytes(
            b"alpha beta something unrelated",
            "partial.txt",
            &HashMap::new(),
        )
        .await
        .unwrap();

    let retriever = Retriever::new(offline_service(), open_store(&dir).await, RetrievalConfig {
        hybrid_weight: 0.0,
        ..RetrievalConfig::default()
    });
    let results = retriever
        .retrieve(&SearchQuery {
            question: "alpha beta gamma delta".into(),
            max_results: 5,
            filters: None,
        })
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert!((results[0].score - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn reingesting_identical_bytes_keeps_one_record() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline =
        IngestionPipeline::new(chunker(200, 5, 1000), offline_service(), open_store(&dir).await);

    let first = pipeline
        .ingest_bytes(b"The same exact content.", "v1.txt", &HashMap::new())
        .await
        .unwrap();
    let second = pipeline
        .ingest_bytes(b"The same exact content.", "v2.txt", &HashMap::new())
        .await
        .unwrap();

    assert_eq!(first.document_id, second.document_id);
    assert!(second.duplicate);
    assert_eq!(second.chunks_indexed, 0);

    let store = open_store(&dir).await;
    assert_eq!(store.list_documents().await.unwrap().len(), 1);
}

#[tokio::test]
async fn metadata_filter_excludes_non_matching_document() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline =
        IngestionPipeline::new(chunker(200, 5, 1000), offline_service(), open_store(&dir).await);

    let mut nature = HashMap::new();
    nature.insert("journal".to_owned(), serde_json::json!("Nature"));
    pipeline
        .ingest_bytes(b"matching corpus text", "a.txt", &nature)
        .await
        .unwrap();

    let mut science = HashMap::new();
    science.insert("journal".to_owned(), serde_json::json!("Science"));
    pipeline
        .ingest_bytes(b"matching corpus text too", "b.txt", &science)
        .await
        .unwrap();

    let retriever = Retriever::new(
        offline_service(),
        open_store(&dir).await,
        RetrievalConfig::default(),
    );
    let results = retriever
        .retrieve(&SearchQuery {
            question: "matching corpus text".into(),
            max_results: 10,
            filters: Some(SearchFilters {
                year_range: None,
                fields: HashMap::from([(
                    "journal".to_owned(),
                    FilterValue::One("nature".to_owned()),
                )]),
            }),
        })
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].metadata["journal"], "Nature");
}

#[tokio::test]
async fn removal_clears_document_and_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline =
        IngestionPipeline::new(chunker(200, 5, 1000), offline_service(), open_store(&dir).await);

    let result = pipeline
        .ingest_bytes(b"short lived document", "tmp.txt", &HashMap::new())
        .await
        .unwrap();
    assert!(pipeline.remove_document(&result.document_id).await.unwrap());

    let store = open_store(&dir).await;
    assert!(store.list_documents().await.unwrap().is_empty());
    let hits = store
        .search("short lived document", &[], None, &[], 0.0, 10)
        .await
        .unwrap();
    assert!(hits.is_empty());
}
