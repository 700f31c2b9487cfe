//! Rule-based stability classification over aggregated vitals.
//!
//! A person is *stable* when every signal sits in its healthy band, and
//! *unstable* when at least two of the four warning signals fire. A person
//! can be neither.

use crate::analytics::stats::{flatten, mean, population_std};
use crate::brain::korean::join_with_topic;
use crate::models::Reading;
use serde::{Deserialize, Serialize};

const STABLE_MIN_HRV: f64 = 50.0;
const STABLE_MAX_STRESS: f64 = 55.0;
const STABLE_PPG_RANGE: (f64, f64) = (0.95, 1.05);
const STABLE_MAX_PPG_STD: f64 = 0.08;

const UNSTABLE_MAX_HRV: f64 = 40.0;
const UNSTABLE_MIN_STRESS: f64 = 80.0;
const UNSTABLE_PPG_RANGE: (f64, f64) = (0.85, 1.15);
const UNSTABLE_MIN_PPG_STD: f64 = 0.10;
const UNSTABLE_MIN_SIGNALS: usize = 2;

/// Aggregates for one person over one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalStats {
    pub days: usize,
    pub hrv_mean: f64,
    pub stress_mean: f64,
    /// Mean of all PPG samples in the window; `None` when no sample parsed.
    pub ppg_mean: Option<f64>,
    pub ppg_std: f64,
}

impl VitalStats {
    /// `None` when there are no readings.
    pub fn from_readings(readings: &[Reading]) -> Option<Self> {
        let hrv: Vec<f64> = readings.iter().map(|r| r.hrv).collect();
        let stress: Vec<f64> = readings.iter().map(|r| r.stress).collect();
        let ppg: Vec<Vec<f64>> = readings.iter().map(Reading::ppg_samples).collect();
        Self::from_series(&hrv, &stress, &ppg)
    }

    pub fn from_series(hrv: &[f64], stress: &[f64], ppg: &[Vec<f64>]) -> Option<Self> {
        let hrv_mean = mean(hrv)?;
        let stress_mean = mean(stress)?;
        let samples = flatten(ppg);
        Some(Self {
            days: hrv.len(),
            hrv_mean,
            stress_mean,
            ppg_mean: mean(&samples),
            ppg_std: population_std(&samples),
        })
    }

    pub fn is_stable(&self) -> bool {
        let ppg_in_band = self
            .ppg_mean
            .is_some_and(|m| (STABLE_PPG_RANGE.0..=STABLE_PPG_RANGE.1).contains(&m));

        self.hrv_mean >= STABLE_MIN_HRV
            && self.stress_mean <= STABLE_MAX_STRESS
            && ppg_in_band
            && self.ppg_std <= STABLE_MAX_PPG_STD
    }

    /// Number of warning signals that fire.
    pub fn unstable_signals(&self) -> usize {
        let ppg_out_of_band = self
            .ppg_mean
            .is_some_and(|m| !(UNSTABLE_PPG_RANGE.0..=UNSTABLE_PPG_RANGE.1).contains(&m));

        [
            self.hrv_mean <= UNSTABLE_MAX_HRV,
            self.stress_mean >= UNSTABLE_MIN_STRESS,
            ppg_out_of_band,
            self.ppg_std >= UNSTABLE_MIN_PPG_STD,
        ]
        .iter()
        .filter(|fired| **fired)
        .count()
    }

    pub fn is_unstable(&self) -> bool {
        self.unstable_signals() >= UNSTABLE_MIN_SIGNALS
    }
}

/// Which side of the classification a question asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilityQuery {
    Stable,
    Unstable,
}

impl StabilityQuery {
    /// "불안정" contains "안정", so the unstable keyword is checked first.
    pub fn from_question(text: &str) -> Option<Self> {
        if text.contains("불안정") {
            Some(StabilityQuery::Unstable)
        } else if text.contains("안정") {
            Some(StabilityQuery::Stable)
        } else {
            None
        }
    }

    pub fn label_ko(&self) -> &'static str {
        match self {
            StabilityQuery::Stable => "안정적인",
            StabilityQuery::Unstable => "불안정한",
        }
    }

    pub fn accepts(&self, stats: &VitalStats) -> bool {
        match self {
            StabilityQuery::Stable => stats.is_stable(),
            StabilityQuery::Unstable => stats.is_unstable(),
        }
    }
}

/// A person together with their readings in the window.
#[derive(Debug, Clone)]
pub struct PersonWindow {
    pub name: String,
    pub readings: Vec<Reading>,
}

/// Names (in input order) matching the query. People without readings are skipped.
pub fn classify_cohort(people: &[PersonWindow], query: StabilityQuery) -> Vec<String> {
    people
        .iter()
        .filter_map(|person| {
            VitalStats::from_readings(&person.readings).map(|stats| (person, stats))
        })
        .filter(|(_, stats)| query.accepts(stats))
        .map(|(person, _)| person.name.clone())
        .collect()
}

/// "[최근 7일 기준] 김민지, 이지훈은 불안정한 상태입니다."
pub fn render_cohort(names: &[String], query: StabilityQuery, window_label: &str) -> String {
    if names.is_empty() {
        return format!(
            "{} 기준 {} 상태로 분류된 사람이 없습니다.",
            window_label,
            query.label_ko()
        );
    }
    format!(
        "{} 기준 {} {} 상태입니다.",
        window_label,
        join_with_topic(names),
        query.label_ko()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn reading(name: &str, day: u32, hrv: f64, stress: f64, ppg: &str) -> Reading {
        Reading {
            id: i64::from(day),
            name: name.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 4, day).unwrap(),
            ppg_json: ppg.to_string(),
            hrv,
            stress,
        }
    }

    #[test]
    fn test_stable_example() {
        let stats = VitalStats::from_series(
            &[55.0, 58.0],
            &[20.0, 25.0],
            &[vec![0.97, 0.99], vec![1.00, 1.01]],
        )
        .unwrap();
        assert!((stats.hrv_mean - 56.5).abs() < 1e-9);
        assert!((stats.stress_mean - 22.5).abs() < 1e-9);
        assert!((stats.ppg_mean.unwrap() - 0.9925).abs() < 1e-9);
        assert!(stats.ppg_std < 0.02);
        assert!(stats.is_stable());
        assert!(!stats.is_unstable());
    }

    #[test]
    fn test_unstable_example() {
        let stats = VitalStats::from_series(
            &[35.0, 38.0],
            &[85.0, 90.0],
            &[vec![0.6, 0.7], vec![0.65, 0.75]],
        )
        .unwrap();
        assert!(stats.unstable_signals() >= 2);
        assert!(stats.is_unstable());
        assert!(!stats.is_stable());
    }

    #[test]
    fn test_single_signal_is_not_unstable() {
        let stats =
            VitalStats::from_series(&[35.0], &[50.0], &[vec![1.0, 1.0]]).unwrap();
        assert_eq!(stats.unstable_signals(), 1);
        assert!(!stats.is_unstable());
        assert!(!stats.is_stable());
    }

    fn calm() -> VitalStats {
        VitalStats {
            days: 1,
            hrv_mean: 60.0,
            stress_mean: 20.0,
            ppg_mean: Some(1.0),
            ppg_std: 0.0,
        }
    }

    #[test]
    fn test_stable_thresholds_are_inclusive() {
        let cases = [
            (VitalStats { hrv_mean: 50.0, ..calm() }, true),
            (VitalStats { hrv_mean: 49.99, ..calm() }, false),
            (VitalStats { stress_mean: 55.0, ..calm() }, true),
            (VitalStats { stress_mean: 55.01, ..calm() }, false),
            (VitalStats { ppg_mean: Some(0.95), ..calm() }, true),
            (VitalStats { ppg_mean: Some(0.949), ..calm() }, false),
            (VitalStats { ppg_mean: Some(1.05), ..calm() }, true),
            (VitalStats { ppg_mean: Some(1.051), ..calm() }, false),
            (VitalStats { ppg_std: 0.08, ..calm() }, true),
            (VitalStats { ppg_std: 0.081, ..calm() }, false),
        ];

        for (stats, expected) in cases {
            assert_eq!(stats.is_stable(), expected, "{:?}", stats);
        }
    }

    #[test]
    fn test_unstable_signal_thresholds_are_inclusive() {
        let cases = [
            (VitalStats { hrv_mean: 40.0, ..calm() }, 1),
            (VitalStats { hrv_mean: 40.01, ..calm() }, 0),
            (VitalStats { stress_mean: 80.0, ..calm() }, 1),
            (VitalStats { stress_mean: 79.99, ..calm() }, 0),
            (VitalStats { ppg_mean: Some(0.85), ..calm() }, 0),
            (VitalStats { ppg_mean: Some(0.849), ..calm() }, 1),
            (VitalStats { ppg_mean: Some(1.15), ..calm() }, 0),
            (VitalStats { ppg_mean: Some(1.151), ..calm() }, 1),
            (VitalStats { ppg_std: 0.10, ..calm() }, 1),
            (VitalStats { ppg_std: 0.099, ..calm() }, 0),
        ];

        for (stats, expected) in cases {
            assert_eq!(stats.unstable_signals(), expected, "{:?}", stats);
        }
    }

    #[test]
    fn test_empty_window_yields_no_stats() {
        assert!(VitalStats::from_readings(&[]).is_none());
    }

    #[test]
    fn test_unparseable_ppg_blocks_stable() {
        let stats = VitalStats::from_readings(&[reading("a", 1, 60.0, 20.0, "garbage")]).unwrap();
        assert_eq!(stats.ppg_mean, None);
        assert!(!stats.is_stable());
    }

    #[test]
    fn test_unstable_keyword_wins() {
        assert_eq!(
            StabilityQuery::from_question("안정적인 사람 말고 불안정한 사람"),
            Some(StabilityQuery::Unstable)
        );
        assert_eq!(
            StabilityQuery::from_question("안정적인 사람"),
            Some(StabilityQuery::Stable)
        );
        assert_eq!(StabilityQuery::from_question("stress 높은 사람"), None);
    }

    #[test]
    fn test_classify_cohort_skips_empty_people() {
        let people = vec![
            PersonWindow {
                name: "김민지".to_string(),
                readings: vec![
                    reading("김민지", 1, 33.0, 90.0, "[0.91, 0.88, 1.02]"),
                    reading("김민지", 2, 30.0, 91.0, "[0.95, 0.89, 1.01]"),
                ],
            },
            PersonWindow {
                name: "박서준".to_string(),
                readings: vec![],
            },
            PersonWindow {
                name: "이지훈".to_string(),
                readings: vec![reading("이지훈", 1, 55.0, 32.0, "[0.99, 1.0, 1.01]")],
            },
        ];

        assert_eq!(classify_cohort(&people, StabilityQuery::Unstable), vec!["김민지"]);
        assert_eq!(classify_cohort(&people, StabilityQuery::Stable), vec!["이지훈"]);
    }

    #[test]
    fn test_render_cohort() {
        let names = vec!["김민지".to_string(), "이지훈".to_string()];
        assert_eq!(
            render_cohort(&names, StabilityQuery::Unstable, "최근 7일"),
            "최근 7일 기준 김민지, 이지훈은 불안정한 상태입니다."
        );
        assert_eq!(
            render_cohort(&[], StabilityQuery::Stable, "전체 기간"),
            "전체 기간 기준 안정적인 상태로 분류된 사람이 없습니다."
        );
    }
}
