use crate::db::models::DocumentChunk;
use crate::db::Database;
use crate::embedding::{bytes_to_embedding, cosine_similarity, Embedder};
use crate::error::{RagError, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Read-only set of embedded chunks, kept in insertion order.
pub struct VectorIndex {
    entries: Vec<(DocumentChunk, Vec<f32>)>,
}

impl VectorIndex {
    pub fn from_entries(entries: Vec<(DocumentChunk, Vec<f32>)>) -> Self {
        Self { entries }
    }

    pub fn load(db: &Database) -> Result<Self> {
        let entries = db
            .load_chunks()?
            .into_iter()
            .map(|(chunk, bytes)| (chunk, bytes_to_embedding(&bytes)))
            .collect();
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Loads the index file on first use and hands out the same instance afterwards.
pub struct IndexProvider {
    path: PathBuf,
    index: OnceCell<Arc<VectorIndex>>,
}

impl IndexProvider {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            index: OnceCell::new(),
        }
    }

    /// A provider that is already initialised with `index`.
    pub fn preloaded(index: VectorIndex) -> Self {
        Self {
            path: PathBuf::new(),
            index: OnceCell::new_with(Some(Arc::new(index))),
        }
    }

    pub async fn get(&self) -> Result<Arc<VectorIndex>> {
        self.index
            .get_or_try_init(|| async {
                if !self.path.is_file() {
                    return Err(RagError::NotFound(format!(
                        "vector index {}",
                        self.path.display()
                    )));
                }
                let db = Database::open(&self.path)?;
                let index = VectorIndex::load(&db)?;
                info!(path = %self.path.display(), chunks = index.len(), "vector index loaded");
                Ok::<_, RagError>(Arc::new(index))
            })
            .await
            .cloned()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

pub struct Retriever {
    index: Arc<IndexProvider>,
    embedder: Arc<dyn Embedder>,
    min_score: f32,
}

impl Retriever {
    pub fn new(index: Arc<IndexProvider>, embedder: Arc<dyn Embedder>, min_score: f32) -> Self {
        Self {
            index,
            embedder,
            min_score,
        }
    }

    /// Top `k` chunks by descending similarity; equal scores keep index order.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(RagError::Validation("k must be positive".into()));
        }
        let index = self.index.get().await?;

        let query_embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::ExternalService("no embedding returned for query".into()))?;

        let mut scored: Vec<ScoredChunk> = index
            .entries
            .iter()
            .map(|(chunk, embedding)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(&query_embedding, embedding),
            })
            .filter(|s| s.score > self.min_score)
            .collect();

        // sort_by is stable, so ties stay in insertion order.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        for s in &scored {
            debug!(source = %s.chunk.source, score = s.score, "retrieved chunk");
        }
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::embedding_to_bytes;
    use crate::testing::FakeEmbedder;

    const CORPUS: [(&str, &str); 3] = [
        ("Paris is the capital of France", "doc1"),
        ("Lyon is a city in France", "doc1"),
        ("Berlin is the capital of Germany", "doc2"),
    ];

    async fn retriever_over(texts: &[(&str, &str)], embedder: Arc<FakeEmbedder>) -> Retriever {
        let owned: Vec<String> = texts.iter().map(|(t, _)| t.to_string()).collect();
        let embeddings = embedder.embed(&owned).await.unwrap();
        let entries = texts
            .iter()
            .zip(embeddings)
            .map(|((text, source), emb)| {
                (
                    DocumentChunk {
                        text: text.to_string(),
                        source: source.to_string(),
                    },
                    emb,
                )
            })
            .collect();
        let provider = IndexProvider::preloaded(VectorIndex::from_entries(entries));
        Retriever::new(Arc::new(provider), embedder, 0.0)
    }

    #[tokio::test]
    async fn test_top_match_for_capital_of_france() {
        let retriever = retriever_over(&CORPUS, Arc::new(FakeEmbedder::default())).await;
        let results = retriever.search("What is the capital of France?", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.text, "Paris is the capital of France");
        assert_eq!(results[0].chunk.source, "doc1");
    }

    #[tokio::test]
    async fn test_results_bounded_and_descending() {
        let retriever = retriever_over(&CORPUS, Arc::new(FakeEmbedder::default())).await;
        for k in 1..=5 {
            let results = retriever.search("capital of France", k).await.unwrap();
            assert!(results.len() <= k);
            assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        }
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let corpus = [("apple pie", "first"), ("apple pie", "second")];
        let retriever = retriever_over(&corpus, Arc::new(FakeEmbedder::default())).await;
        let results = retriever.search("apple", 2).await.unwrap();
        let sources: Vec<&str> = results.iter().map(|s| s.chunk.source.as_str()).collect();
        assert_eq!(sources, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_unrelated_query_returns_nothing() {
        let retriever = retriever_over(&CORPUS, Arc::new(FakeEmbedder::default())).await;
        let results = retriever.search("quantum chromodynamics lectures", 3).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_zero_k_rejected_before_embedding() {
        let embedder = Arc::new(FakeEmbedder::default());
        let retriever = retriever_over(&CORPUS, embedder.clone()).await;
        let before = embedder.queries().len();
        let err = retriever.search("anything", 0).await.unwrap_err();
        assert!(matches!(err, RagError::Validation(_)));
        assert_eq!(embedder.queries().len(), before);
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let provider = IndexProvider::preloaded(VectorIndex::from_entries(vec![]));
        let retriever = Retriever::new(Arc::new(provider), Arc::new(FakeEmbedder::failing()), 0.0);
        let err = retriever.search("anything", 3).await.unwrap_err();
        assert!(matches!(err, RagError::ExternalService(_)));
    }

    #[tokio::test]
    async fn test_provider_loads_index_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_document(
                "faq.csv",
                "faq.csv",
                "csv",
                None,
                &[("hello world".into(), embedding_to_bytes(&[1.0, 0.0]))],
            )
            .unwrap();
        }
        let provider = IndexProvider::new(path);
        let first = provider.get().await.unwrap();
        let second = provider.get().await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_provider_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let provider = IndexProvider::new(dir.path().join("missing.db"));
        assert!(matches!(provider.get().await, Err(RagError::NotFound(_))));
    }
}
