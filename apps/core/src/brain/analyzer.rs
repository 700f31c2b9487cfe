//! Brain Analyzer - Main entry point of question analysis.
//!
//! Runs slot extraction and intent classification over one question.
//!
//! Uses a two-tier intent classification:
//! 1. Ordered rule cascade (no I/O)
//! 2. LLM fallback, only when the rules end in `Ambiguous`

use chrono::{NaiveDate, Utc};
use std::time::Instant;
use tracing::info;

use super::context_packet::ContextPacket;
use super::fallback::LlmIntentFallback;
use super::intent::{Intent, IntentClassifier};
use super::slots::{extract_metric, extract_recent_days, extract_target_name, normalize_metric_synonyms, ALL_METRICS};
use crate::actors::traits::LlmActor;
use crate::analytics::cohort::StabilityQuery;
use crate::analytics::condition::ConditionQuery;
use crate::analytics::window::{recent_since, ReadingWindow};

/// Main analyzer that fills a [`ContextPacket`]
pub struct BrainAnalyzer {
    intent_classifier: IntentClassifier,
}

impl Default for BrainAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl BrainAnalyzer {
    pub fn new() -> Self {
        Self {
            intent_classifier: IntentClassifier::new(),
        }
    }

    /// Rules-only analysis. `reference` anchors relative windows and the
    /// default year.
    pub fn analyze(&self, question: &str, candidate_names: &[String], reference: NaiveDate) -> ContextPacket {
        let start = Instant::now();
        let mut packet = ContextPacket::new(question.to_string());

        // 1. Canonical metric tokens
        let (normalized, matched) = normalize_metric_synonyms(question);
        packet.synonyms_matched = matched;

        // 2. Classify on the normalized text
        packet.intent = self.intent_classifier.classify(&normalized, candidate_names);

        // 3. Slots, independent of intent
        packet.target = extract_target_name(&normalized, candidate_names).map(str::to_string);
        packet.metric = extract_metric(&normalized, &ALL_METRICS);
        packet.window = ReadingWindow::resolve(&normalized, reference);
        packet.since = extract_recent_days(&normalized).map(|days| recent_since(reference, days));
        packet.condition = ConditionQuery::compile(&normalized, packet.since).map(|q| q.condition);
        packet.stability = StabilityQuery::from_question(&normalized);
        packet.normalized = normalized;

        packet.processing_time_ms = start.elapsed().as_millis() as u64;
        packet.timestamp = Utc::now();
        packet
    }

    /// Rules first, then the LLM when the rules find nothing.
    pub async fn analyze_with_fallback<L: LlmActor>(
        &self,
        question: &str,
        candidate_names: &[String],
        reference: NaiveDate,
        fallback: &LlmIntentFallback<L>,
    ) -> ContextPacket {
        let mut packet = self.analyze(question, candidate_names, reference);
        if packet.intent() != Intent::Ambiguous {
            return packet;
        }

        let start = Instant::now();
        let resolved = fallback.classify(&packet.normalized).await;
        if resolved.intent != Intent::Ambiguous {
            info!("Rules were ambiguous, LLM fallback chose {}", resolved.intent);
        }
        packet.intent = resolved;
        packet.processing_time_ms += start.elapsed().as_millis() as u64;
        packet
    }
}
