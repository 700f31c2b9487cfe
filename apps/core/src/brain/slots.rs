//! Slot extraction from raw Korean questions.
//!
//! Pure functions that turn free text into structured fields: canonical metric,
//! requested person, date window, numeric condition. Nothing here touches the
//! store or the LLM; a pattern that does not match simply yields `None`.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Biosignal columns the system knows how to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Ppg,
    Hrv,
    Stress,
}

/// Allowed metrics in lookup order.
pub const ALL_METRICS: [Metric; 3] = [Metric::Ppg, Metric::Hrv, Metric::Stress];

impl Metric {
    /// Canonical token, as produced by [`normalize_metric_synonyms`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Ppg => "ppg",
            Metric::Hrv => "hrv",
            Metric::Stress => "stress",
        }
    }

    /// Display name used in Korean responses.
    pub fn label_ko(&self) -> &'static str {
        match self {
            Metric::Ppg => "PPG",
            Metric::Hrv => "HRV",
            Metric::Stress => "스트레스",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ppg" => Ok(Metric::Ppg),
            "hrv" => Ok(Metric::Hrv),
            "stress" => Ok(Metric::Stress),
            other => Err(format!("unsupported metric: {}", other)),
        }
    }
}

/// Threshold comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// 이상 (>=)
    AtLeast,
    /// 초과 (>)
    GreaterThan,
    /// 이하 (<=)
    AtMost,
    /// 미만 (<)
    LessThan,
}

impl Comparator {
    /// Maps one of the four Korean comparator phrases.
    pub fn from_phrase(phrase: &str) -> Option<Self> {
        match phrase {
            "이상" => Some(Comparator::AtLeast),
            "초과" => Some(Comparator::GreaterThan),
            "이하" => Some(Comparator::AtMost),
            "미만" => Some(Comparator::LessThan),
            _ => None,
        }
    }

    /// SQL operator. Only ever one of four literals.
    pub fn sql_operator(&self) -> &'static str {
        match self {
            Comparator::AtLeast => ">=",
            Comparator::GreaterThan => ">",
            Comparator::AtMost => "<=",
            Comparator::LessThan => "<",
        }
    }

    pub fn phrase_ko(&self) -> &'static str {
        match self {
            Comparator::AtLeast => "이상",
            Comparator::GreaterThan => "초과",
            Comparator::AtMost => "이하",
            Comparator::LessThan => "미만",
        }
    }

    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::AtLeast => value >= threshold,
            Comparator::GreaterThan => value > threshold,
            Comparator::AtMost => value <= threshold,
            Comparator::LessThan => value < threshold,
        }
    }
}

/// A recognised "metric comparator threshold" condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericCondition {
    pub metric: Metric,
    pub comparator: Comparator,
    pub threshold: f64,
}

impl NumericCondition {
    pub fn matches(&self, value: f64) -> bool {
        self.comparator.evaluate(value, self.threshold)
    }
}

/// Absolute date reference found in a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DateSpec {
    Day { date: NaiveDate },
    Month { year: i32, month: u32 },
}

// Synonym groups, longest alternatives first so "스트레스 지수" is consumed whole.
static STRESS_SYNONYMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(스트레스\s*지수|스트레스|피로도|stress)").expect("Invalid regex: stress synonyms")
});

static PPG_SYNONYMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(광용적\s*맥파|맥파|혈류|ppg)").expect("Invalid regex: ppg synonyms")
});

static HRV_SYNONYMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(심박\s*변이도|자율\s*신경|hrv)").expect("Invalid regex: hrv synonyms")
});

static RECENT_DAYS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"최근\s*(\d+)\s*일").expect("Invalid regex: recent N days"),
        Regex::new(r"(\d+)\s*일\s*(?:간|동안)").expect("Invalid regex: N days span"),
    ]
});

/// Fixed phrase table for relative windows.
const RECENT_DAY_KEYWORDS: &[(&str, u32)] = &[
    ("일주일", 7),
    ("1주일", 7),
    ("한 주", 7),
    ("한주", 7),
    ("이번 주", 7),
    ("이번주", 7),
    ("지난 주", 7),
    ("지난주", 7),
    ("최근 주", 7),
    ("한 달", 30),
    ("한달", 30),
    ("1개월", 30),
    ("이번 달", 30),
    ("이번달", 30),
    ("지난 달", 30),
    ("지난달", 30),
    ("최근 한 달", 30),
];

static KOREAN_DAY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(\d{4})\s*년\s*)?(\d{1,2})\s*월\s*(\d{1,2})\s*일").expect("Invalid regex: Korean day")
});

static ISO_DAY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").expect("Invalid regex: ISO day")
});

static KOREAN_MONTH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(\d{4})\s*년\s*)?(\d{1,2})\s*월").expect("Invalid regex: Korean month")
});

static ISO_MONTH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})-(\d{1,2})").expect("Invalid regex: ISO month")
});

static NUMERIC_CONDITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(stress|ppg|hrv)\s*(?:이|가|은|는)?\s*(\d+(?:\.\d+)?)\s*(이상|초과|이하|미만)")
        .expect("Invalid regex: numeric condition")
});

static LOOSE_METRIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(stress|ppg|hrv)").expect("Invalid regex: loose metric"));

static LOOSE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("Invalid regex: loose number"));

static LOOSE_COMPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(이상|초과|이하|미만|보다\s*(?:크|큰|높|많)|보다\s*(?:작|낮|적))")
        .expect("Invalid regex: loose comparator")
});

/// Vital-sign terms the dataset does not carry.
const UNSUPPORTED_METRIC_TERMS: &[&str] = &[
    "맥박률",
    "심박수",
    "심박률",
    "맥박수",
    "산소포화도",
    "체온",
    "호흡수",
];

/// Rewrites every metric synonym to its canonical token.
///
/// All groups are applied, each globally. Returns whether anything matched.
pub fn normalize_metric_synonyms(text: &str) -> (String, bool) {
    let groups: [(&Regex, &str); 3] = [
        (&STRESS_SYNONYMS, Metric::Stress.as_str()),
        (&PPG_SYNONYMS, Metric::Ppg.as_str()),
        (&HRV_SYNONYMS, Metric::Hrv.as_str()),
    ];

    let mut normalized = text.to_string();
    let mut matched = false;
    for (pattern, canonical) in groups {
        if pattern.is_match(&normalized) {
            normalized = pattern.replace_all(&normalized, canonical).into_owned();
            matched = true;
        }
    }
    (normalized, matched)
}

/// First allowed metric present in the text, `ppg` otherwise.
pub fn extract_metric(text: &str, allowed: &[Metric]) -> Metric {
    let lower = text.to_lowercase();
    allowed
        .iter()
        .find(|metric| lower.contains(metric.as_str()))
        .copied()
        .unwrap_or(Metric::Ppg)
}

/// First candidate, in list order, that occurs in the text.
pub fn extract_target_name<'a>(text: &str, candidates: &'a [String]) -> Option<&'a str> {
    candidates
        .iter()
        .find(|name| !name.is_empty() && text.contains(name.as_str()))
        .map(String::as_str)
}

/// Relative window length in days, or `None` when the question has no temporal phrase.
pub fn extract_recent_days(text: &str) -> Option<u32> {
    for pattern in RECENT_DAYS_PATTERNS.iter() {
        if let Some(days) = pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|days| *days > 0)
        {
            return Some(days);
        }
    }

    RECENT_DAY_KEYWORDS
        .iter()
        .find(|(keyword, _)| text.contains(keyword))
        .map(|(_, days)| *days)
}

/// Day-level or month-level date reference.
///
/// Day patterns win over month patterns. A missing year falls back to
/// `default_year`. Impossible dates (month 13, April 31st) do not match.
pub fn extract_date_or_month(text: &str, default_year: i32) -> Option<DateSpec> {
    if let Some(date) = match_day(text, default_year) {
        return Some(DateSpec::Day { date });
    }
    match_month(text, default_year).map(|(year, month)| DateSpec::Month { year, month })
}

fn match_day(text: &str, default_year: i32) -> Option<NaiveDate> {
    if let Some(caps) = ISO_DAY_PATTERN.captures(text) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    let caps = KOREAN_DAY_PATTERN.captures(text)?;
    let year = match caps.get(1) {
        Some(m) => m.as_str().parse().ok()?,
        None => default_year,
    };
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn match_month(text: &str, default_year: i32) -> Option<(i32, u32)> {
    let (year, month) = if let Some(caps) = KOREAN_MONTH_PATTERN.captures(text) {
        let year = match caps.get(1) {
            Some(m) => m.as_str().parse().ok()?,
            None => default_year,
        };
        (year, caps[2].parse::<u32>().ok()?)
    } else {
        let caps = ISO_MONTH_PATTERN.captures(text)?;
        (caps[1].parse().ok()?, caps[2].parse::<u32>().ok()?)
    };

    NaiveDate::from_ymd_opt(year, month, 1).map(|_| (year, month))
}

/// Strict "metric [particle] number comparator" condition.
pub fn extract_numeric_condition(text: &str) -> Option<NumericCondition> {
    let caps = NUMERIC_CONDITION.captures(text)?;
    let metric = caps[1].parse().ok()?;
    let threshold = caps[2].parse().ok()?;
    let comparator = Comparator::from_phrase(&caps[3])?;
    Some(NumericCondition {
        metric,
        comparator,
        threshold,
    })
}

/// Relaxed condition used by the per-person average ranking.
///
/// Metric, number and comparator may be separated by other words, and
/// "보다 큰 / 보다 낮은" style comparisons are accepted.
pub fn extract_loose_condition(text: &str) -> Option<NumericCondition> {
    let metric = LOOSE_METRIC.captures(text)?[1].parse().ok()?;
    let comparator_match = LOOSE_COMPARATOR.find(text)?;
    // The threshold is the last number before the comparator phrase.
    let threshold = LOOSE_NUMBER
        .find_iter(&text[..comparator_match.start()])
        .last()?
        .as_str()
        .parse()
        .ok()?;
    let phrase = comparator_match.as_str();

    let comparator = Comparator::from_phrase(phrase).or_else(|| {
        if ["크", "큰", "높", "많"].iter().any(|s| phrase.contains(s)) {
            Some(Comparator::GreaterThan)
        } else {
            Some(Comparator::LessThan)
        }
    })?;

    Some(NumericCondition {
        metric,
        comparator,
        threshold,
    })
}

/// Rejection message when the question asks for a vital sign we do not record.
pub fn detect_unknown_metric_keyword(text: &str) -> Option<String> {
    UNSUPPORTED_METRIC_TERMS
        .iter()
        .find(|term| text.contains(*term))
        .map(|term| {
            format!(
                "'{}'은(는) 인식할 수 없는 항목입니다. 예: '스트레스', 'ppg', 'hrv' 등으로 다시 입력해보세요.",
                term
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_all_groups() {
        let (text, matched) = normalize_metric_synonyms("스트레스 지수와 광용적맥파, 심박 변이도 비교");
        assert!(matched);
        assert_eq!(text, "stress와 ppg, hrv 비교");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let (once, _) = normalize_metric_synonyms("피로도랑 PPG랑 자율신경");
        let (twice, matched) = normalize_metric_synonyms(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "stress랑 ppg랑 hrv");
        assert!(matched);
    }

    #[test]
    fn test_normalize_no_match() {
        let (text, matched) = normalize_metric_synonyms("오늘 날씨 어때");
        assert!(!matched);
        assert_eq!(text, "오늘 날씨 어때");
    }

    #[test]
    fn test_extract_metric_default() {
        assert_eq!(extract_metric("HRV 그래프", &ALL_METRICS), Metric::Hrv);
        assert_eq!(extract_metric("그래프 보여줘", &ALL_METRICS), Metric::Ppg);
        assert_eq!(extract_metric("stress 추이", &[Metric::Hrv]), Metric::Ppg);
    }

    #[test]
    fn test_extract_target_name_list_order() {
        let names = vec!["김민".to_string(), "김민지".to_string()];
        // Substring collision resolves to list order.
        assert_eq!(extract_target_name("김민지의 hrv", &names), Some("김민"));
        assert_eq!(extract_target_name("이지훈 hrv", &names), None);
    }

    #[test]
    fn test_extract_recent_days() {
        assert_eq!(extract_recent_days("최근 7일 stress"), Some(7));
        assert_eq!(extract_recent_days("일주일 동안 hrv"), Some(7));
        assert_eq!(extract_recent_days("14일간 변화"), Some(14));
        assert_eq!(extract_recent_days("지난달 평균"), Some(30));
        assert_eq!(extract_recent_days("김민지 평균"), None);
        assert_eq!(extract_recent_days(""), None);
    }

    #[test]
    fn test_extract_date_day_wins_over_month() {
        assert_eq!(
            extract_date_or_month("4월 3일 불안정한 사람", 2025),
            Some(DateSpec::Day {
                date: NaiveDate::from_ymd_opt(2025, 4, 3).unwrap()
            })
        );
        assert_eq!(
            extract_date_or_month("2024년 12월 안정적인 사람", 2025),
            Some(DateSpec::Month { year: 2024, month: 12 })
        );
        assert_eq!(
            extract_date_or_month("2025-04-02 stress", 2020),
            Some(DateSpec::Day {
                date: NaiveDate::from_ymd_opt(2025, 4, 2).unwrap()
            })
        );
    }

    #[test]
    fn test_extract_date_invalid_values() {
        assert_eq!(extract_date_or_month("13월 stress", 2025), None);
        // An impossible day falls back to the month it names.
        assert_eq!(
            extract_date_or_month("4월 31일", 2025),
            Some(DateSpec::Month { year: 2025, month: 4 })
        );
        assert_eq!(extract_date_or_month("최근 7일", 2025), None);
    }

    #[test]
    fn test_extract_numeric_condition() {
        let cond = extract_numeric_condition("stress가 90 이상인 사람").unwrap();
        assert_eq!(cond.metric, Metric::Stress);
        assert_eq!(cond.comparator, Comparator::AtLeast);
        assert_eq!(cond.threshold, 90.0);

        let cond = extract_numeric_condition("ppg 0.95 미만").unwrap();
        assert_eq!(cond.comparator, Comparator::LessThan);
        assert!((cond.threshold - 0.95).abs() < f64::EPSILON);

        assert!(extract_numeric_condition("stress가 높은 사람").is_none());
        assert!(extract_numeric_condition("ppg 수치가 1.0보다 큰 사람").is_none());
    }

    #[test]
    fn test_extract_loose_condition() {
        let cond = extract_loose_condition("ppg 수치가 1.0보다 큰 사람").unwrap();
        assert_eq!(cond.metric, Metric::Ppg);
        assert_eq!(cond.comparator, Comparator::GreaterThan);

        let cond = extract_loose_condition("hrv 평균이 40보다 낮은 사람").unwrap();
        assert_eq!(cond.comparator, Comparator::LessThan);
        assert_eq!(cond.threshold, 40.0);

        let cond = extract_loose_condition("최근 7일 ppg가 1.0보다 큰 사람").unwrap();
        assert_eq!(cond.threshold, 1.0);

        assert!(extract_loose_condition("누가 제일 높아").is_none());
    }

    #[test]
    fn test_comparator_evaluate() {
        assert!(Comparator::AtLeast.evaluate(90.0, 90.0));
        assert!(!Comparator::GreaterThan.evaluate(90.0, 90.0));
        assert!(Comparator::AtMost.evaluate(90.0, 90.0));
        assert!(!Comparator::LessThan.evaluate(90.0, 90.0));
    }

    #[test]
    fn test_detect_unknown_metric_keyword() {
        let msg = detect_unknown_metric_keyword("김민지 체온 알려줘").unwrap();
        assert!(msg.contains("'체온'"));
        assert!(msg.contains("hrv"));
        assert!(detect_unknown_metric_keyword("김민지 hrv 알려줘").is_none());
    }
}
