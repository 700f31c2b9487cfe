use crate::actors::messages::{ActorError, AppError, RagMessage};
use crate::actors::traits::RagActor;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

// E5 models are trained with these role prefixes.
const QUERY_PREFIX: &str = "query: ";
const PASSAGE_PREFIX: &str = "passage: ";

/// Reads the retrieval corpus: a JSON array of strings.
pub fn load_corpus(path: &Path) -> Result<Vec<String>, AppError> {
    let raw = std::fs::read_to_string(path)?;
    let documents: Vec<String> = serde_json::from_str(&raw)?;
    Ok(documents
        .into_iter()
        .map(|doc| doc.trim().to_string())
        .filter(|doc| !doc.is_empty())
        .collect())
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// Indices of the `k` most similar documents, best first. Ties keep corpus order.
pub fn top_k_indices(query: &[f32], documents: &[Vec<f32>], k: usize) -> Vec<usize> {
    let mut scored: Vec<(usize, f32)> = documents
        .iter()
        .enumerate()
        .map(|(i, doc)| (i, cosine_similarity(query, doc)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.into_iter().take(k).map(|(i, _)| i).collect()
}

/// A handle to the `RagActor`.
///
/// This provides a public, cloneable interface for sending messages to the running
/// retrieval actor, which owns the embedding model and the embedded corpus.
#[derive(Clone)]
pub struct RagActorHandle {
    sender: mpsc::Sender<RagMessage>,
}

impl RagActorHandle {
    /// Spawns the retrieval actor.
    ///
    /// # Arguments
    ///
    /// * `corpus_path` - JSON corpus file; `None` disables retrieval (searches return nothing).
    /// * `cache_dir` - Where fastembed keeps downloaded model files.
    pub fn new(corpus_path: Option<PathBuf>, cache_dir: PathBuf) -> Self {
        let (sender, receiver) = mpsc::channel(32);
        let actor = RagActorRunner::new(receiver, corpus_path, cache_dir);
        tokio::spawn(async move { actor.run().await });
        Self { sender }
    }
}

#[async_trait]
impl RagActor for RagActorHandle {
    async fn search(&self, query: String, k: usize) -> Result<Vec<String>, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = RagMessage::Search {
            query,
            limit: k,
            responder: send,
        };
        self.sender
            .send(msg)
            .await
            .map_err(|_| AppError::Actor(ActorError::Internal("RAG Actor closed".to_string())))?;
        recv.await
            .map_err(|_| AppError::Actor(ActorError::Internal("RAG Actor failed to respond".to_string())))?
    }
}

// --- Actor Runner (Internal Logic) ---
struct RagActorRunner {
    receiver: mpsc::Receiver<RagMessage>,
    corpus_path: Option<PathBuf>,
    cache_dir: PathBuf,
    embedding_model: Option<TextEmbedding>,
    embedding_cache: LruCache<String, Vec<f32>>,
    documents: Vec<String>,
    document_embeddings: Vec<Vec<f32>>,
    loaded: bool,
}

impl RagActorRunner {
    const CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(256) {
        Some(size) => size,
        None => panic!("Cache size must be non-zero"),
    };

    fn new(receiver: mpsc::Receiver<RagMessage>, corpus_path: Option<PathBuf>, cache_dir: PathBuf) -> Self {
        Self {
            receiver,
            corpus_path,
            cache_dir,
            embedding_model: None,
            embedding_cache: LruCache::new(Self::CACHE_SIZE),
            documents: Vec::new(),
            document_embeddings: Vec::new(),
            loaded: false,
        }
    }

    async fn run(mut self) {
        info!("RagActor started");
        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg).await;
        }
        info!("RagActor stopped");
    }

    async fn handle_message(&mut self, msg: RagMessage) {
        match msg {
            RagMessage::Search {
                query,
                limit,
                responder,
            } => {
                let result = self.search_documents(query, limit);
                if responder.send(result.map_err(AppError::from)).is_err() {
                    warn!("Failed to send search response (channel closed)");
                }
            }
        }
    }

    /// Loads the corpus and, if it has documents, the model. Runs once.
    fn ensure_loaded(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;

        let Some(path) = self.corpus_path.clone() else {
            info!("No retrieval corpus configured");
            return;
        };
        match load_corpus(&path) {
            Ok(documents) => self.documents = documents,
            Err(e) => {
                error!("Failed to load corpus {:?}: {}", path, e);
                return;
            }
        }
        if self.documents.is_empty() {
            warn!("Retrieval corpus {:?} is empty", path);
            return;
        }

        let mut options = InitOptions::new(EmbeddingModel::MultilingualE5Small);
        options.show_download_progress = false;
        options.cache_dir = self.cache_dir.clone();

        let model = match TextEmbedding::try_new(options) {
            Ok(model) => model,
            Err(e) => {
                error!("Failed to load embedding model: {}", e);
                return;
            }
        };

        let passages: Vec<String> = self
            .documents
            .iter()
            .map(|doc| format!("{}{}", PASSAGE_PREFIX, doc))
            .collect();
        match model.embed(passages, None) {
            Ok(embeddings) => {
                info!("Embedded {} corpus documents", embeddings.len());
                self.document_embeddings = embeddings;
                self.embedding_model = Some(model);
            }
            Err(e) => error!("Failed to embed corpus: {}", e),
        }
    }

    fn search_documents(&mut self, query: String, limit: usize) -> Result<Vec<String>, ActorError> {
        self.ensure_loaded();

        if self.documents.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let model = self.embedding_model.as_ref().ok_or(ActorError::RagError(
            "Embedding model not loaded".to_string(),
        ))?;

        let query_vec = match self.embedding_cache.get(&query) {
            Some(embedding) => embedding.clone(),
            None => {
                let query_embedding = model
                    .embed(vec![format!("{}{}", QUERY_PREFIX, query)], None)
                    .map_err(|e| ActorError::RagError(format!("Embedding failed: {}", e)))?;
                let embedding = query_embedding
                    .into_iter()
                    .next()
                    .ok_or(ActorError::RagError("No embedding generated".to_string()))?;
                self.embedding_cache.put(query.clone(), embedding.clone());
                embedding
            }
        };

        Ok(top_k_indices(&query_vec, &self.document_embeddings, limit)
            .into_iter()
            .filter_map(|i| self.documents.get(i).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c) - 0.0).abs() < 0.001);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }

    #[test]
    fn test_top_k_indices() {
        let docs = vec![vec![0.0, 1.0], vec![1.0, 0.1], vec![1.0, 0.0], vec![-1.0, 0.0]];
        assert_eq!(top_k_indices(&[1.0, 0.0], &docs, 2), vec![2, 1]);
        assert_eq!(top_k_indices(&[1.0, 0.0], &docs, 10).len(), 4);
        assert!(top_k_indices(&[1.0, 0.0], &docs, 0).is_empty());
    }

    #[test]
    fn test_load_corpus() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["HRV는 심박 변이도입니다.", "  ", "PPG는 광용적맥파입니다."]"#).unwrap();

        let docs = load_corpus(file.path()).unwrap();
        assert_eq!(docs, vec!["HRV는 심박 변이도입니다.", "PPG는 광용적맥파입니다."]);
    }

    #[test]
    fn test_load_corpus_rejects_non_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"docs": []}}"#).unwrap();
        assert!(matches!(load_corpus(file.path()), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_search_without_corpus_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let handle = RagActorHandle::new(None, dir.path().to_path_buf());
        let results = handle.search("HRV 정상 범위".to_string(), 3).await.unwrap();
        assert!(results.is_empty());
    }
}
