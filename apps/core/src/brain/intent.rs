//! Intent classification using an ordered rule cascade.
//!
//! Each rule is a (predicate, intent) pair; rules are evaluated once, in
//! order, and the first match wins. When nothing matches the result is
//! `Ambiguous` and the caller may consult the LLM fallback.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Detected intent type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Per-person statistics summary (mean, max, min...)
    Report,
    /// Per-person time series chart
    Visual,
    /// Persons/days satisfying a numeric condition
    FilterCondition,
    /// Stable / unstable cohort detection
    FilterStability,
    /// Reference question answered from the document corpus
    SemanticQa,
    /// Why is stress high or low
    StressReason,
    /// Greeting or filler
    Chitchat,
    /// The question is just a person's name
    NameOnly,
    /// The question names an unsupported vital sign
    UnknownKeyword,
    /// Nothing matched, even after the LLM fallback
    Ambiguous,
}

pub const ALL_INTENTS: [Intent; 10] = [
    Intent::Report,
    Intent::Visual,
    Intent::FilterCondition,
    Intent::FilterStability,
    Intent::SemanticQa,
    Intent::StressReason,
    Intent::Chitchat,
    Intent::NameOnly,
    Intent::UnknownKeyword,
    Intent::Ambiguous,
];

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Intent {
    /// Wire label for the intent
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Report => "report",
            Intent::Visual => "visual",
            Intent::FilterCondition => "filter_condition",
            Intent::FilterStability => "filter_stability",
            Intent::SemanticQa => "semantic_qa",
            Intent::StressReason => "stress_reason",
            Intent::Chitchat => "chitchat",
            Intent::NameOnly => "name_only",
            Intent::UnknownKeyword => "unknown_keyword",
            Intent::Ambiguous => "ambiguous",
        }
    }

    /// Case-insensitive inverse of [`Intent::label`].
    pub fn from_label(label: &str) -> Option<Intent> {
        let label = label.trim().to_ascii_lowercase();
        ALL_INTENTS.iter().copied().find(|intent| intent.label() == label)
    }

    /// Intents whose handler needs a resolved person.
    pub fn requires_target(&self) -> bool {
        matches!(self, Intent::Report | Intent::Visual)
    }
}

/// Where the final label came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Rules,
    LlmFallback,
}

/// Result of intent classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResult {
    /// Detected intent
    pub intent: Intent,
    /// Name of the rule that fired, if any
    pub matched_rule: Option<String>,
    pub source: ClassificationSource,
}

impl IntentResult {
    pub fn ambiguous() -> Self {
        Self {
            intent: Intent::Ambiguous,
            matched_rule: None,
            source: ClassificationSource::Rules,
        }
    }
}

type RulePredicate = fn(&str, &[String]) -> bool;

/// One step of the cascade.
pub struct IntentRule {
    pub name: &'static str,
    pub intent: Intent,
    predicate: RulePredicate,
}

impl IntentRule {
    pub fn matches(&self, text: &str, candidate_names: &[String]) -> bool {
        (self.predicate)(text, candidate_names)
    }
}

/// Greetings and filler, compared against the whole trimmed question.
const CHITCHAT_WHITELIST: &[&str] = &[
    "안녕",
    "안녕하세요",
    "안녕하세요!",
    "하이",
    "hi",
    "hello",
    "ㅎㅇ",
    "반가워",
    "반갑습니다",
    "고마워",
    "고맙습니다",
    "감사합니다",
    "땡큐",
    "ㅎㅎ",
    "ㅋㅋ",
    "ㅋㅋㅋ",
    "네",
    "응",
    "그래",
    "좋아",
    "오케이",
    "ok",
    "잘가",
    "바이",
    "bye",
];

// Compile patterns once at startup
static SUMMARY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(평균|최대|최소|중앙값|요약|통계)").expect("Invalid regex: summary vocabulary")
});

static CHART_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(그래프|추이|그려|시계열|차트|변화|\bplot\b|\bgraph\b|\btrend\b)")
        .expect("Invalid regex: chart vocabulary")
});

static STABILITY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(안정)").expect("Invalid regex: stability keyword"));

static COMPARATOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(이상|이하|초과|미만|보다\s*(?:크|큰|높|많|작|낮|적)|높은 사람|낮은 사람|조건에 맞는|조건)")
        .expect("Invalid regex: comparator phrases")
});

static PERSON_REF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(사람|누구|누가|유저|사용자|이름|찾아|있어|있나|있는지|명단)")
        .expect("Invalid regex: person reference")
});

static INTERPRETIVE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(높은 편|낮은 편|높은가|낮은가|높은 건가|낮은 건가|기준|정상|의미|뜻|정의|어때|어떤가|어떤지|맞아|맞지|맞나|그렇지|뭐야|무엇|이란)",
    )
    .expect("Invalid regex: interpretive vocabulary")
});

static REASON_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(왜|이유|원인|때문)").expect("Invalid regex: reason keywords"));

static DIRECTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(높|낮|올라|떨어|증가|감소|심해)").expect("Invalid regex: direction keywords")
});

fn is_chitchat(text: &str, _names: &[String]) -> bool {
    let trimmed = text.trim().to_lowercase();
    CHITCHAT_WHITELIST.contains(&trimmed.as_str())
}

fn is_name_only(text: &str, names: &[String]) -> bool {
    let trimmed = text.trim();
    names.iter().any(|name| name == trimmed)
}

fn is_report(text: &str, _names: &[String]) -> bool {
    SUMMARY_PATTERN.is_match(text)
}

fn is_visual(text: &str, _names: &[String]) -> bool {
    CHART_PATTERN.is_match(text)
}

fn is_stability_filter(text: &str, _names: &[String]) -> bool {
    STABILITY_PATTERN.is_match(text) && PERSON_REF_PATTERN.is_match(text)
}

fn is_condition_filter(text: &str, _names: &[String]) -> bool {
    COMPARATOR_PATTERN.is_match(text) && PERSON_REF_PATTERN.is_match(text)
}

fn is_semantic_qa(text: &str, _names: &[String]) -> bool {
    INTERPRETIVE_PATTERN.is_match(text)
}

fn is_stress_reason(text: &str, _names: &[String]) -> bool {
    REASON_PATTERN.is_match(text)
        && text.to_lowercase().contains("stress")
        && DIRECTION_PATTERN.is_match(text)
}

/// True if the text mentions stability at all (stable or unstable).
pub fn mentions_stability(text: &str) -> bool {
    STABILITY_PATTERN.is_match(text)
}

/// Intent classifier using an ordered rule list
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    /// Create a classifier with the standard cascade.
    pub fn new() -> Self {
        let rules = vec![
            IntentRule {
                name: "chitchat_whitelist",
                intent: Intent::Chitchat,
                predicate: is_chitchat,
            },
            IntentRule {
                name: "exact_name",
                intent: Intent::NameOnly,
                predicate: is_name_only,
            },
            IntentRule {
                name: "summary_vocabulary",
                intent: Intent::Report,
                predicate: is_report,
            },
            IntentRule {
                name: "chart_vocabulary",
                intent: Intent::Visual,
                predicate: is_visual,
            },
            IntentRule {
                name: "stability_with_person",
                intent: Intent::FilterStability,
                predicate: is_stability_filter,
            },
            IntentRule {
                name: "comparator_with_person",
                intent: Intent::FilterCondition,
                predicate: is_condition_filter,
            },
            IntentRule {
                name: "interpretive_vocabulary",
                intent: Intent::SemanticQa,
                predicate: is_semantic_qa,
            },
            IntentRule {
                name: "stress_cause",
                intent: Intent::StressReason,
                predicate: is_stress_reason,
            },
        ];

        Self { rules }
    }

    /// Classify a (synonym-normalized) question.
    pub fn classify(&self, text: &str, candidate_names: &[String]) -> IntentResult {
        if text.trim().is_empty() {
            return IntentResult::ambiguous();
        }

        self.rules
            .iter()
            .find(|rule| rule.matches(text, candidate_names))
            .map(|rule| IntentResult {
                intent: rule.intent,
                matched_rule: Some(rule.name.to_string()),
                source: ClassificationSource::Rules,
            })
            .unwrap_or_else(IntentResult::ambiguous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["김민지".to_string(), "이지훈".to_string()]
    }

    #[test]
    fn test_chitchat_detection() {
        let classifier = IntentClassifier::new();
        assert_eq!(classifier.classify("  안녕하세요 ", &names()).intent, Intent::Chitchat);
        assert_eq!(classifier.classify("Hello", &names()).intent, Intent::Chitchat);
        // Whitelist is whole-utterance only.
        assert_ne!(classifier.classify("안녕 김민지 평균", &names()).intent, Intent::Chitchat);
    }

    #[test]
    fn test_name_only_detection() {
        let classifier = IntentClassifier::new();
        let result = classifier.classify(" 김민지 ", &names());
        assert_eq!(result.intent, Intent::NameOnly);
        assert_eq!(result.matched_rule.as_deref(), Some("exact_name"));
    }

    #[test]
    fn test_report_before_visual() {
        let classifier = IntentClassifier::new();
        assert_eq!(
            classifier.classify("김민지 stress 평균 그래프", &names()).intent,
            Intent::Report
        );
        assert_eq!(
            classifier.classify("김민지 hrv 추이 보여줘", &names()).intent,
            Intent::Visual
        );
    }

    #[test]
    fn test_filter_condition_needs_person_reference() {
        let classifier = IntentClassifier::new();
        assert_eq!(
            classifier.classify("stress가 90 이상인 사람", &names()).intent,
            Intent::FilterCondition
        );
        assert_ne!(
            classifier.classify("stress 90 이상", &names()).intent,
            Intent::FilterCondition
        );
    }

    #[test]
    fn test_stability_filter() {
        let classifier = IntentClassifier::new();
        assert_eq!(
            classifier.classify("불안정한 사람 알려줘", &names()).intent,
            Intent::FilterStability
        );
        assert_eq!(
            classifier.classify("최근 7일 안정적인 사람은 누구야", &names()).intent,
            Intent::FilterStability
        );
    }

    #[test]
    fn test_semantic_qa_and_stress_reason() {
        let classifier = IntentClassifier::new();
        assert_eq!(
            classifier.classify("hrv 50이면 정상이야?", &names()).intent,
            Intent::SemanticQa
        );
        assert_eq!(
            classifier.classify("김민지 stress가 왜 이렇게 높아", &names()).intent,
            Intent::StressReason
        );
    }

    #[test]
    fn test_ambiguous_fallthrough() {
        let classifier = IntentClassifier::new();
        let result = classifier.classify("음 그냥 궁금해서", &names());
        assert_eq!(result.intent, Intent::Ambiguous);
        assert!(result.matched_rule.is_none());
        assert_eq!(classifier.classify("   ", &names()).intent, Intent::Ambiguous);
    }

    #[test]
    fn test_label_round_trip() {
        for intent in ALL_INTENTS {
            assert_eq!(Intent::from_label(intent.label()), Some(intent));
        }
        assert_eq!(Intent::from_label("REPORT"), Some(Intent::Report));
        assert_eq!(Intent::from_label("weather"), None);
    }
}
