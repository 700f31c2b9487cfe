use crate::actors::messages::{ActorError, AppError, SupervisorMessage};
use crate::actors::traits::{LlmActor, RagActor};
use crate::brain::fallback::LlmIntentFallback;
use crate::brain::slots::detect_unknown_metric_keyword;
use crate::brain::{BrainAnalyzer, Intent};
use crate::config::AppConfig;
use crate::handlers::{self, HandlerContext, EMPTY_QUESTION};
use crate::history::ConversationHistory;
use crate::models::{AskResponse, Role};
use crate::names::{NameCache, NameRefresh};
use chrono::NaiveDate;
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};

/// Orchestrator knobs taken from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub rag_top_k: usize,
    pub history_window: usize,
    pub name_refresh: NameRefresh,
    /// Fixed anchor for relative windows; today when `None`.
    pub reference_date: Option<NaiveDate>,
    /// Upper bound on one `ask` round trip.
    pub request_timeout: Duration,
}

impl SupervisorSettings {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            rag_top_k: config.rag_top_k,
            history_window: config.history_window,
            name_refresh: config.name_refresh,
            reference_date: config.reference_date,
            // Intent fallback and the handler may each hit the LLM once.
            request_timeout: config.llm_timeout() * 2 + Duration::from_secs(30),
        }
    }

    fn reference_date(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

/// A handle to the `SupervisorActor`.
///
/// This is the primary entry point for all business logic in the application. It owns the
/// conversation history and the candidate-name cache, and orchestrates the `LlmActor` and
/// `RagActor` to answer questions one at a time.
#[derive(Clone)]
pub struct SupervisorHandle {
    sender: mpsc::Sender<SupervisorMessage>,
    request_timeout: Duration,
}

impl SupervisorHandle {
    /// Spawns the supervisor actor.
    ///
    /// # Arguments
    ///
    /// * `pool` - The readings store.
    /// * `llm` - Completion backend, shared with the intent fallback.
    /// * `rag` - Retrieval backend.
    /// * `settings` - History window, retrieval depth, name refresh policy and timeouts.
    pub fn new<L: LlmActor, R: RagActor>(pool: SqlitePool, llm: Arc<L>, rag: Arc<R>, settings: SupervisorSettings) -> Self {
        let (sender, receiver) = mpsc::channel(32);
        let request_timeout = settings.request_timeout;
        let actor = SupervisorRunner::new(receiver, pool, llm, rag, settings);
        tokio::spawn(async move { actor.run().await });
        Self {
            sender,
            request_timeout,
        }
    }

    /// Answers one free-text question.
    ///
    /// Input problems, empty results, store and downstream service failures all come
    /// back as `Ok` with a user-facing message. `Err` means the orchestrator itself
    /// could not answer (closed mailbox or timeout).
    #[instrument(skip(self))]
    pub async fn ask(&self, question: String) -> Result<AskResponse, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = SupervisorMessage::Ask {
            question,
            responder: send,
        };
        self.sender
            .send(msg)
            .await
            .map_err(|_| ActorError::Internal("Supervisor closed".to_string()))?;
        timeout(self.request_timeout, recv)
            .await
            .map_err(ActorError::from)?
            .map_err(|e| ActorError::Internal(e.to_string()))?
    }

    /// Drops the conversation history.
    pub async fn reset_history(&self) -> Result<(), AppError> {
        let (send, recv) = oneshot::channel();
        self.sender
            .send(SupervisorMessage::ResetHistory { responder: send })
            .await
            .map_err(|_| ActorError::Internal("Supervisor closed".to_string()))?;
        recv.await
            .map_err(|e| AppError::Actor(ActorError::Internal(e.to_string())))
    }

    pub async fn shutdown(&self) {
        if self.sender.send(SupervisorMessage::Shutdown).await.is_err() {
            warn!("Supervisor already stopped");
        }
    }
}

// --- Actor Runner ---
struct SupervisorRunner<L, R>
where
    L: LlmActor,
    R: RagActor,
{
    receiver: mpsc::Receiver<SupervisorMessage>,
    pool: SqlitePool,
    llm: Arc<L>,
    rag: Arc<R>,
    analyzer: BrainAnalyzer,
    fallback: LlmIntentFallback<L>,
    names: NameCache,
    history: ConversationHistory,
    settings: SupervisorSettings,
}

impl<L, R> SupervisorRunner<L, R>
where
    L: LlmActor,
    R: RagActor,
{
    fn new(
        receiver: mpsc::Receiver<SupervisorMessage>,
        pool: SqlitePool,
        llm: Arc<L>,
        rag: Arc<R>,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            receiver,
            pool,
            fallback: LlmIntentFallback::new(llm.clone()),
            llm,
            rag,
            analyzer: BrainAnalyzer::new(),
            names: NameCache::new(settings.name_refresh),
            history: ConversationHistory::new(),
            settings,
        }
    }

    async fn run(mut self) {
        info!("Supervisor started");
        if self.names.policy() == NameRefresh::Startup {
            if let Err(e) = self.names.reload(&self.pool).await {
                error!("Failed to load candidate names: {}", e);
            }
        }

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                SupervisorMessage::Ask { question, responder } => {
                    let result = self.answer(question).await;
                    if let Err(e) = &result {
                        error!("Error answering question: {}", e);
                    }
                    let _ = responder.send(result);
                }
                SupervisorMessage::ResetHistory { responder } => {
                    info!("Clearing {} history turns", self.history.len());
                    self.history.clear();
                    let _ = responder.send(());
                }
                SupervisorMessage::Shutdown => break,
            }
        }
        info!("Supervisor stopped");
    }

    #[instrument(skip(self), fields(intent))]
    async fn answer(&mut self, question: String) -> Result<AskResponse, AppError> {
        let question = question.trim().to_string();
        if question.is_empty() {
            return Ok(AskResponse::text(Intent::Ambiguous, EMPTY_QUESTION));
        }

        // Unsupported vital signs short-circuit everything else.
        if let Some(message) = detect_unknown_metric_keyword(&question) {
            info!("Rejected unsupported metric keyword");
            return Ok(self.record(&question, AskResponse::text(Intent::UnknownKeyword, message)));
        }

        let names = match self.names.current(&self.pool).await {
            Ok(names) => names.to_vec(),
            Err(e) => {
                error!("Failed to refresh candidate names: {}", e);
                let message = handlers::failure_message(Intent::Ambiguous, &e);
                return Ok(self.record(&question, AskResponse::text(Intent::Ambiguous, message)));
            }
        };
        let reference = self.settings.reference_date();
        let packet = self
            .analyzer
            .analyze_with_fallback(&question, &names, reference, &self.fallback)
            .await;
        tracing::Span::current().record("intent", packet.intent().label());
        info!("{}", packet.summary());

        if packet.is_missing_target() {
            let response = AskResponse::text(packet.intent(), handlers::missing_target_message(&names));
            return Ok(self.record(&question, response));
        }

        let ctx = HandlerContext {
            pool: &self.pool,
            llm: &*self.llm,
            rag: &*self.rag,
            names: &names,
            history: self.history.window(self.settings.history_window),
            rag_top_k: self.settings.rag_top_k,
        };
        let response = match handlers::dispatch(&ctx, &packet).await {
            Ok(response) => response,
            Err(e) => {
                error!("Handler for {} failed: {}", packet.intent(), e);
                AskResponse::text(packet.intent(), handlers::failure_message(packet.intent(), &e))
            }
        };

        Ok(self.record(&question, response))
    }

    /// Appends the exchange to the history and hands the response back.
    fn record(&mut self, question: &str, response: AskResponse) -> AskResponse {
        self.history.push(Role::User, question);
        self.history.push(Role::Assistant, response.response.clone());
        response
    }
}
