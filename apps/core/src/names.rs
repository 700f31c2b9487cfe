//! Cache of candidate person names.
//!
//! Owned by the orchestrator; when it re-reads the store is decided by an
//! explicit [`NameRefresh`] policy.

use crate::database;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// When the cached name set is re-read from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameRefresh {
    /// Loaded once; rows inserted later are not seen until restart.
    Startup,
    /// Re-read before every question.
    OnDemand,
    /// Re-read when the cached set is older than the given age.
    Ttl(Duration),
}

impl FromStr for NameRefresh {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_ascii_lowercase();
        match raw.as_str() {
            "startup" => Ok(NameRefresh::Startup),
            "on_demand" | "on-demand" | "always" => Ok(NameRefresh::OnDemand),
            _ => {
                let secs = raw
                    .strip_prefix("ttl:")
                    .and_then(|secs| secs.trim().parse::<u64>().ok())
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| AppError::Config(format!("Unknown NAME_REFRESH policy: {}", s)))?;
                Ok(NameRefresh::Ttl(Duration::from_secs(secs)))
            }
        }
    }
}

impl fmt::Display for NameRefresh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameRefresh::Startup => f.write_str("startup"),
            NameRefresh::OnDemand => f.write_str("on_demand"),
            NameRefresh::Ttl(ttl) => write!(f, "ttl:{}", ttl.as_secs()),
        }
    }
}

/// Whether a cache loaded at `loaded_at` must be re-read at `now`.
pub fn needs_refresh(policy: NameRefresh, loaded_at: Option<Instant>, now: Instant) -> bool {
    match (policy, loaded_at) {
        (_, None) => true,
        (NameRefresh::Startup, Some(_)) => false,
        (NameRefresh::OnDemand, Some(_)) => true,
        (NameRefresh::Ttl(ttl), Some(loaded)) => now.saturating_duration_since(loaded) >= ttl,
    }
}

/// Candidate names in first-insertion order.
#[derive(Debug)]
pub struct NameCache {
    policy: NameRefresh,
    names: Vec<String>,
    loaded_at: Option<Instant>,
}

impl NameCache {
    pub fn new(policy: NameRefresh) -> Self {
        Self {
            policy,
            names: Vec::new(),
            loaded_at: None,
        }
    }

    pub fn policy(&self) -> NameRefresh {
        self.policy
    }

    /// Re-reads the store if the policy says so; returns the current set.
    pub async fn current(&mut self, pool: &SqlitePool) -> Result<&[String], AppError> {
        if needs_refresh(self.policy, self.loaded_at, Instant::now()) {
            self.reload(pool).await?;
        }
        Ok(&self.names)
    }

    pub async fn reload(&mut self, pool: &SqlitePool) -> Result<(), AppError> {
        let names = database::fetch_candidate_names(pool).await?;
        if self.loaded_at.is_none() {
            info!("Loaded {} candidate names (refresh policy: {})", names.len(), self.policy);
        } else {
            debug!("Reloaded {} candidate names", names.len());
        }
        self.names = names;
        self.loaded_at = Some(Instant::now());
        Ok(())
    }
}
