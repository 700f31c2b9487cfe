use crate::actors::messages::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Decoding mode for a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sampling {
    /// Greedy decoding (temperature 0).
    Deterministic,
    /// Sampled decoding at the server's configured temperature.
    Stochastic,
}

impl Sampling {
    pub fn temperature(&self) -> Option<f32> {
        match self {
            Sampling::Deterministic => Some(0.0),
            Sampling::Stochastic => None,
        }
    }
}

/// Defines the public interface for an LLM (Large Language Model) actor.
///
/// This trait abstracts the text-completion backend so the orchestrator can be
/// driven by a llama.cpp server in production and by mocks in tests.
#[async_trait]
pub trait LlmActor: Send + Sync + 'static {
    /// Completes `prompt`, generating at most `max_tokens` tokens.
    async fn complete(&self, prompt: String, max_tokens: u32, sampling: Sampling) -> Result<String, AppError>;
}

/// Defines the public interface for a RAG (Retrieval-Augmented Generation) actor.
///
/// The retriever answers top-k nearest documents from a fixed corpus.
#[async_trait]
pub trait RagActor: Send + Sync + 'static {
    /// Returns up to `k` corpus documents, most relevant first.
    async fn search(&self, query: String, k: usize) -> Result<Vec<String>, AppError>;
}
