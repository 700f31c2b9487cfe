use crate::actors::traits::Sampling;
use crate::models::AskResponse;
use serde::Serialize;
use tokio::sync::oneshot;

/// Defines errors that can occur within the actor system.
#[derive(Debug, thiserror::Error, Serialize, Clone)]
pub enum ActorError {
    /// An error originating from the LLM actor.
    #[error("LLM request failed: {0}")]
    LlmError(String),
    /// An error originating from the RAG actor.
    #[error("RAG request failed: {0}")]
    RagError(String),
    /// A generic internal error within an actor.
    #[error("Internal system error: {0}")]
    Internal(String),
    /// An error indicating that an actor operation timed out.
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl From<tokio::time::error::Elapsed> for ActorError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ActorError::Timeout(format!("Actor operation timed out: {}", err))
    }
}

// Re-export AppError for convenience
pub use crate::error::AppError;

/// Messages that can be sent to the `LlmActor`.
#[derive(Debug)]
pub enum LlmMessage {
    /// A request to generate a complete text response.
    Complete {
        prompt: String,
        max_tokens: u32,
        sampling: Sampling,
        /// A channel to send the final `String` result back.
        responder: oneshot::Sender<Result<String, AppError>>,
    },
}

/// Messages that can be sent to the `RagActor`.
#[derive(Debug)]
pub enum RagMessage {
    /// A request to search the corpus.
    Search {
        query: String,
        /// The maximum number of documents to return.
        limit: usize,
        /// A channel to send the matching documents back.
        responder: oneshot::Sender<Result<Vec<String>, AppError>>,
    },
}

/// Messages that can be sent to the `SupervisorActor`.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// A free-text question from the user.
    Ask {
        question: String,
        /// A channel to send the formatted answer back.
        responder: oneshot::Sender<Result<AskResponse, AppError>>,
    },
    /// Drops the conversation history.
    ResetHistory {
        responder: oneshot::Sender<()>,
    },
    /// A command to shut down the supervisor.
    Shutdown,
}
