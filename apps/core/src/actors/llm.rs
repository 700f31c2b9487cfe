use crate::actors::messages::{ActorError, AppError, LlmMessage};
use crate::actors::traits::{LlmActor, Sampling};
use crate::config::AppConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info};

/// Connection settings for the completion server.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub server_url: String,
    pub auth_token: Option<String>,
    pub timeout: Duration,
}

impl LlmClientConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            server_url: config.llm_server_url.trim_end_matches('/').to_string(),
            auth_token: config.llama_auth_token.clone(),
            timeout: config.llm_timeout(),
        }
    }
}

/// A handle to the `LlmActor`.
///
/// This struct provides a public, cloneable interface for sending messages to the
/// running LLM actor. It abstracts away the `mpsc::Sender`.
#[derive(Clone)]
pub struct LlmActorHandle {
    sender: mpsc::Sender<LlmMessage>,
    timeout: Duration,
}

impl LlmActorHandle {
    /// Creates a new `LlmActor` and returns a handle to it.
    ///
    /// This will spawn the `LlmActorRunner` in a new Tokio task.
    pub fn new(config: LlmClientConfig) -> Self {
        let (sender, receiver) = mpsc::channel(32);
        let timeout = config.timeout;
        let actor = LlmActorRunner::new(receiver, config);
        tokio::spawn(async move { actor.run().await });
        Self { sender, timeout }
    }
}

#[async_trait]
impl LlmActor for LlmActorHandle {
    async fn complete(&self, prompt: String, max_tokens: u32, sampling: Sampling) -> Result<String, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = LlmMessage::Complete {
            prompt,
            max_tokens,
            sampling,
            responder: send,
        };

        self.sender
            .send(msg)
            .await
            .map_err(|e| ActorError::LlmError(e.to_string()))?;
        // The runner enforces the request timeout; this one only guards a stuck mailbox.
        timeout(self.timeout + MAILBOX_GRACE, recv)
            .await
            .map_err(ActorError::from)?
            .map_err(|e| ActorError::Internal(e.to_string()))?
    }
}

// --- Constants ---
const MAILBOX_GRACE: Duration = Duration::from_secs(5);

// --- Actor Runner (Internal Logic) ---
struct LlmActorRunner {
    receiver: mpsc::Receiver<LlmMessage>,
    server_url: String,
    client: Client,
    auth_token: Option<String>,
    timeout: Duration,
}

impl LlmActorRunner {
    fn new(receiver: mpsc::Receiver<LlmMessage>, config: LlmClientConfig) -> Self {
        Self {
            receiver,
            server_url: config.server_url,
            client: Client::new(),
            auth_token: config.auth_token,
            timeout: config.timeout,
        }
    }

    async fn run(mut self) {
        info!("LlmActor started (server: {})", self.server_url);

        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg).await;
        }

        info!("LlmActor stopped");
    }

    fn build_request(&self, endpoint: &str, payload: &serde_json::Value) -> Result<reqwest::RequestBuilder, AppError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.auth_token {
            let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| AppError::Config(format!("Invalid LLAMA_AUTH_TOKEN: {}", e)))?;
            headers.insert(AUTHORIZATION, auth_value);
        }

        Ok(self
            .client
            .post(format!("{}/{}", self.server_url, endpoint))
            .headers(headers)
            .json(payload))
    }

    async fn handle_message(&mut self, msg: LlmMessage) {
        match msg {
            LlmMessage::Complete {
                prompt,
                max_tokens,
                sampling,
                responder,
            } => {
                let result = self.generate_completion(prompt, max_tokens, sampling).await;
                if let Err(e) = &result {
                    error!("Completion failed: {}", e);
                }
                let _ = responder.send(result);
            }
        }
    }

    async fn generate_completion(&self, prompt: String, max_tokens: u32, sampling: Sampling) -> Result<String, AppError> {
        debug!("LLM generating ({} chars, n_predict={})", prompt.len(), max_tokens);

        let mut payload = serde_json::json!({
            "prompt": prompt,
            "stream": false,
            "n_predict": max_tokens
        });

        if let Some(temp) = sampling.temperature() {
            payload["temperature"] = serde_json::json!(temp);
        }

        let request_future = self.build_request("completion", &payload)?.send();

        let res = timeout(self.timeout, request_future)
            .await
            .map_err(ActorError::from)?
            .map_err(|e| ActorError::LlmError(e.to_string()))?;

        let status = res.status();

        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ActorError::LlmError(format!(
                "Completion request failed with status {}: {}",
                status, body
            ))
            .into());
        }

        let json: serde_json::Value = res
            .json()
            .await
            .map_err(|e| ActorError::LlmError(e.to_string()))?;

        Ok(json["content"].as_str().unwrap_or("").to_string())
    }
}
