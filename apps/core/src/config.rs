use crate::error::AppError;
use crate::names::NameRefresh;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" | "bunyan" => Ok(LogFormat::Json),
            other => Err(AppError::Config(format!("Unknown LOG_FORMAT: {}", other))),
        }
    }
}

/// Service configuration, read from the environment.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(length(min = 1))]
    pub database_url: String,
    #[validate(range(min = 1, max = 64))]
    pub database_max_connections: u32,
    #[validate(url)]
    pub llm_server_url: String,
    pub llama_auth_token: Option<String>,
    #[validate(range(min = 1, max = 600))]
    pub llm_timeout_secs: u64,
    pub rag_corpus_path: Option<String>,
    #[validate(range(min = 1, max = 20))]
    pub rag_top_k: usize,
    #[validate(range(min = 0, max = 100))]
    pub history_window: usize,
    pub name_refresh: NameRefresh,
    #[validate(length(min = 1))]
    pub bind_addr: String,
    pub log_format: LogFormat,
    /// Anchor for relative windows; today when unset.
    pub reference_date: Option<NaiveDate>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/vitalchat.sqlite".to_string(),
            database_max_connections: 5,
            llm_server_url: "http://localhost:8080".to_string(),
            llama_auth_token: None,
            llm_timeout_secs: 60,
            rag_corpus_path: None,
            rag_top_k: 3,
            history_window: 6,
            name_refresh: NameRefresh::Startup,
            bind_addr: "0.0.0.0:8000".to_string(),
            log_format: LogFormat::Pretty,
            reference_date: None,
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env_string(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("Invalid value for {}: {}", key, raw))),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Reads `.env` (if present) and the process environment, then validates.
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();
        Self::from_process_env()
    }

    /// Like [`AppConfig::from_env`] without touching `.env`.
    pub fn from_process_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let config = Self {
            database_url: env_string("DATABASE_URL").unwrap_or(defaults.database_url),
            database_max_connections: env_parse(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            llm_server_url: env_string("LLM_SERVER_URL").unwrap_or(defaults.llm_server_url),
            llama_auth_token: env_string("LLAMA_AUTH_TOKEN"),
            llm_timeout_secs: env_parse("LLM_TIMEOUT_SECS", defaults.llm_timeout_secs)?,
            rag_corpus_path: env_string("RAG_CORPUS_PATH"),
            rag_top_k: env_parse("RAG_TOP_K", defaults.rag_top_k)?,
            history_window: env_parse("HISTORY_WINDOW", defaults.history_window)?,
            name_refresh: env_string("NAME_REFRESH")
                .map(|raw| raw.parse())
                .transpose()?
                .unwrap_or(defaults.name_refresh),
            bind_addr: env_string("BIND_ADDR").unwrap_or(defaults.bind_addr),
            log_format: env_string("LOG_FORMAT")
                .map(|raw| raw.parse())
                .transpose()?
                .unwrap_or(defaults.log_format),
            reference_date: env_string("REFERENCE_DATE")
                .map(|raw| NaiveDate::parse_from_str(&raw, "%Y-%m-%d"))
                .transpose()?,
        };

        config.validate()?;
        config.llm_url()?;
        Ok(config)
    }

    pub fn llm_url(&self) -> Result<Url, AppError> {
        Ok(Url::parse(&self.llm_server_url)?)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }
}
