//! Context Packet - Output structure for question analysis.
//!
//! Contains every slot extracted from a question plus the resolved intent,
//! so handlers never re-parse the raw text.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::intent::{Intent, IntentResult};
use super::slots::{Metric, NumericCondition};
use crate::analytics::cohort::StabilityQuery;
use crate::analytics::window::ReadingWindow;

/// Complete context packet from question analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPacket {
    /// Question as typed by the user
    pub question: String,

    /// Question with metric synonyms rewritten to canonical tokens
    pub normalized: String,

    /// Whether any synonym group matched
    pub synonyms_matched: bool,

    /// Detected intent
    pub intent: IntentResult,

    /// Person named in the question, first candidate in list order
    pub target: Option<String>,

    /// Metric the question talks about (`ppg` when none is named)
    pub metric: Metric,

    /// Window for per-person aggregates
    pub window: ReadingWindow,

    /// Lower date bound for numeric-condition queries
    pub since: Option<NaiveDate>,

    /// Strict numeric condition, if the question carries one
    pub condition: Option<NumericCondition>,

    /// Stable / unstable branch for cohort questions
    pub stability: Option<StabilityQuery>,

    /// Processing time in milliseconds
    pub processing_time_ms: u64,

    /// Timestamp of analysis
    pub timestamp: DateTime<Utc>,
}

impl ContextPacket {
    /// Create a packet with no slots filled
    pub fn new(question: String) -> Self {
        Self {
            normalized: question.clone(),
            question,
            synonyms_matched: false,
            intent: IntentResult::ambiguous(),
            target: None,
            metric: Metric::Ppg,
            window: ReadingWindow::All,
            since: None,
            condition: None,
            stability: None,
            processing_time_ms: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn intent(&self) -> Intent {
        self.intent.intent
    }

    /// True when the intent needs a person and none was found.
    pub fn is_missing_target(&self) -> bool {
        self.intent().requires_target() && self.target.is_none()
    }

    /// Get a summary for logging
    pub fn summary(&self) -> String {
        format!(
            "Intent: {} ({:?}), Target: {}, Metric: {}, Window: {}, Condition: {}",
            self.intent.intent,
            self.intent.source,
            self.target.as_deref().unwrap_or("-"),
            self.metric,
            self.window.label(),
            self.condition
                .map(|c| format!("{} {} {}", c.metric, c.comparator.sql_operator(), c.threshold))
                .unwrap_or_else(|| "-".to_string())
        )
    }
}
