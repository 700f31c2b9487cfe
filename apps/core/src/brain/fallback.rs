//! Second-tier intent classification through the completion service.
//!
//! Consulted only when the rule cascade ends in `Ambiguous`. The model is
//! asked once, deterministically, and its output is scanned for
//! `Intent: <label>`. Anything else keeps the question ambiguous.

use crate::actors::traits::{LlmActor, Sampling};
use crate::brain::intent::{mentions_stability, ClassificationSource, Intent, IntentResult};
use crate::prompts::{intent_prompt, INTENT_MAX_TOKENS};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

pub const INTENT_MARKER: &str = "Intent:";

/// Labels the model may answer with.
pub const FALLBACK_LABELS: [Intent; 6] = [
    Intent::Report,
    Intent::Visual,
    Intent::FilterCondition,
    Intent::SemanticQa,
    Intent::StressReason,
    Intent::Chitchat,
];

// The label ends at anything but an ASCII word character, so Korean text may
// follow it directly ("report입니다").
static INTENT_LABEL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)intent\s*:\s*(report|visual|filter_condition|semantic_qa|stress_reason|chitchat)(?:[^A-Za-z0-9_]|$)",
    )
    .expect("Invalid regex: intent label")
});

/// First `Intent: <label>` in a completion.
///
/// The prompt itself ends with the marker, so a bare label at the start of
/// the completion counts as well.
pub fn parse_fallback_label(completion: &str) -> Option<Intent> {
    let scanned = format!("{}{}", INTENT_MARKER, completion);
    let caps = INTENT_LABEL_PATTERN.captures(&scanned)?;
    Intent::from_label(&caps[1]).filter(|intent| FALLBACK_LABELS.contains(intent))
}

/// The model has no separate stability label; a stability question it
/// files under `filter_condition` is routed to the cohort classifier.
pub fn fold_stability(intent: Intent, question: &str) -> Intent {
    if intent == Intent::FilterCondition && mentions_stability(question) {
        Intent::FilterStability
    } else {
        intent
    }
}

/// LLM-backed fallback classifier.
pub struct LlmIntentFallback<L: LlmActor> {
    llm: Arc<L>,
}

impl<L: LlmActor> LlmIntentFallback<L> {
    pub fn new(llm: Arc<L>) -> Self {
        Self { llm }
    }

    /// Never fails: a completion error is logged and treated as no label.
    pub async fn classify(&self, question: &str) -> IntentResult {
        let completion = match self
            .llm
            .complete(intent_prompt(question), INTENT_MAX_TOKENS, Sampling::Deterministic)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("Intent fallback unavailable: {}", e);
                return IntentResult::ambiguous();
            }
        };

        match parse_fallback_label(&completion) {
            Some(intent) => {
                let intent = fold_stability(intent, question);
                debug!("Intent fallback resolved {:?}", intent);
                IntentResult {
                    intent,
                    matched_rule: Some("llm_fallback".to_string()),
                    source: ClassificationSource::LlmFallback,
                }
            }
            None => {
                debug!("Intent fallback returned no label: {:?}", completion);
                IntentResult::ambiguous()
            }
        }
    }
}
