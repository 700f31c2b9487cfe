//! Numeric condition → parameterized readings query.
//!
//! Column expressions come from a closed allow-list keyed by [`Metric`];
//! thresholds and dates are always bound, never formatted into SQL.

use crate::analytics::stats::{flatten, mean};
use crate::brain::slots::{
    extract_loose_condition, extract_numeric_condition, normalize_metric_synonyms, Metric,
    NumericCondition,
};
use crate::models::Reading;
use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite};
use std::collections::BTreeMap;

/// Daily PPG mean in SQL, decoded the way [`crate::analytics::stats::parse_ppg`] does:
/// a bare number or a list of numbers. Anything else, including a list with a
/// non-number in it, yields NULL.
const PPG_DAILY_MEAN: &str = "(CASE \
    WHEN NOT json_valid(ppg_json) THEN NULL \
    WHEN json_type(ppg_json) IN ('integer', 'real') THEN json_extract(ppg_json, '$') \
    WHEN json_type(ppg_json) = 'array' \
        AND NOT EXISTS (SELECT 1 FROM json_each(ppg_json) WHERE type NOT IN ('integer', 'real')) \
        THEN (SELECT AVG(value) FROM json_each(ppg_json)) \
    END)";

/// SQL expression yielding the daily value of a metric.
pub fn metric_expression(metric: Metric) -> &'static str {
    match metric {
        Metric::Stress => "stress",
        Metric::Hrv => "hrv",
        Metric::Ppg => PPG_DAILY_MEAN,
    }
}

/// Tracks whether a `WHERE` clause has been opened.
pub(crate) struct FilterClause {
    started: bool,
}

impl FilterClause {
    pub(crate) fn new() -> Self {
        Self { started: false }
    }

    /// Pushes ` WHERE ` the first time, ` AND ` afterwards.
    pub(crate) fn push<'args>(&mut self, builder: &mut QueryBuilder<'args, Sqlite>) {
        builder.push(if self.started { " AND " } else { " WHERE " });
        self.started = true;
    }
}

/// A compiled "who/when satisfies metric ⋚ threshold" query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionQuery {
    pub condition: NumericCondition,
    /// Lower date bound from a "recent N days" phrase.
    pub since: Option<NaiveDate>,
}

impl ConditionQuery {
    /// Compiles a question; `None` when no strict numeric condition is present.
    pub fn compile(question: &str, since: Option<NaiveDate>) -> Option<Self> {
        let (normalized, _) = normalize_metric_synonyms(question);
        extract_numeric_condition(&normalized).map(|condition| Self { condition, since })
    }

    /// Builds `SELECT name, date, <expr> AS value FROM readings ...`.
    pub fn to_query_builder(&self) -> QueryBuilder<'static, Sqlite> {
        let expr = metric_expression(self.condition.metric);
        let mut builder = QueryBuilder::new(format!(
            "SELECT name, date, {} AS value FROM readings",
            expr
        ));
        let mut filter = FilterClause::new();

        filter.push(&mut builder);
        builder.push(expr);
        builder.push(" ");
        builder.push(self.condition.comparator.sql_operator());
        builder.push(" ");
        builder.push_bind(self.condition.threshold);

        if let Some(since) = self.since {
            filter.push(&mut builder);
            builder.push("date >= ");
            builder.push_bind(since);
        }

        builder.push(" ORDER BY date ASC, name ASC");
        builder
    }
}

/// Per-person mean of `metric`, for persons whose mean satisfies the condition.
///
/// PPG samples are flattened across days before averaging. Sorted by the
/// aggregate, highest first.
pub fn rank_by_average(readings: &[Reading], condition: &NumericCondition) -> Vec<(String, f64)> {
    let mut per_person: BTreeMap<&str, Vec<&Reading>> = BTreeMap::new();
    for reading in readings {
        per_person.entry(reading.name.as_str()).or_default().push(reading);
    }

    let mut ranked: Vec<(String, f64)> = per_person
        .into_iter()
        .filter_map(|(name, rows)| {
            let aggregate = match condition.metric {
                Metric::Ppg => {
                    let series: Vec<Vec<f64>> = rows.iter().map(|r| r.ppg_samples()).collect();
                    mean(&flatten(&series))
                }
                Metric::Hrv => mean(&rows.iter().map(|r| r.hrv).collect::<Vec<_>>()),
                Metric::Stress => mean(&rows.iter().map(|r| r.stress).collect::<Vec<_>>()),
            }?;
            condition
                .matches(aggregate)
                .then(|| (name.to_string(), aggregate))
        })
        .collect();

    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

/// Numbered list, aggregate shown to three decimals.
pub fn render_ranking(ranked: &[(String, f64)], condition: &NumericCondition) -> String {
    let header = format!(
        "평균 {} {} {} 조건을 만족하는 사람:",
        condition.metric.label_ko(),
        condition.threshold,
        condition.comparator.phrase_ko()
    );
    let lines = ranked
        .iter()
        .enumerate()
        .map(|(i, (name, value))| format!("{}. {} ({:.3})", i + 1, name, value))
        .collect::<Vec<_>>();
    format!("{}\n{}", header, lines.join("\n"))
}

/// Relaxed condition for the average fallback.
pub fn compile_average_condition(question: &str) -> Option<NumericCondition> {
    let (normalized, _) = normalize_metric_synonyms(question);
    extract_loose_condition(&normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::slots::Comparator;

    fn reading(id: i64, name: &str, ppg: &str, stress: f64) -> Reading {
        Reading {
            id,
            name: name.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 4, id as u32).unwrap(),
            ppg_json: ppg.to_string(),
            hrv: 50.0,
            stress,
        }
    }

    #[test]
    fn test_compile_stress_condition() {
        let query = ConditionQuery::compile("stress가 90 이상인 사람", None).unwrap();
        assert_eq!(query.condition.metric, Metric::Stress);
        assert_eq!(query.condition.comparator, Comparator::AtLeast);
        assert_eq!(query.condition.threshold, 90.0);

        let builder = query.to_query_builder();
        assert_eq!(
            builder.sql(),
            "SELECT name, date, stress AS value FROM readings WHERE stress >= ? ORDER BY date ASC, name ASC"
        );
    }

    #[test]
    fn test_compile_normalizes_synonyms() {
        let query = ConditionQuery::compile("스트레스 120 이상인 사람", None).unwrap();
        assert_eq!(query.condition.metric, Metric::Stress);
        assert_eq!(query.condition.threshold, 120.0);
    }

    #[test]
    fn test_date_filter_appends_with_and() {
        let since = NaiveDate::from_ymd_opt(2025, 4, 1);
        let query = ConditionQuery::compile("hrv 30 미만인 사람", since).unwrap();
        let builder = query.to_query_builder();
        let sql = builder.sql();
        assert!(sql.contains("WHERE hrv < ? AND date >= ?"));
        assert_eq!(sql.matches("WHERE").count(), 1);
    }

    #[test]
    fn test_ppg_uses_allow_listed_expression() {
        let query = ConditionQuery::compile("ppg 1.0 초과인 사람", None).unwrap();
        let builder = query.to_query_builder();
        assert!(builder.sql().contains("json_each(ppg_json)"));
        assert!(!builder.sql().contains("1.0"));
    }

    #[test]
    fn test_compile_without_condition() {
        assert!(ConditionQuery::compile("ppg가 높은 사람", None).is_none());
    }

    #[test]
    fn test_rank_by_average_ppg() {
        let readings = vec![
            reading(1, "김민지", "[1.0, 1.1]", 90.0),
            reading(2, "김민지", "[1.2]", 95.0),
            reading(3, "이지훈", "[0.5, 0.5]", 30.0),
            reading(4, "박서준", "[1.05, 1.05]", 40.0),
        ];
        let condition = compile_average_condition("ppg 평균이 1.0보다 큰 사람").unwrap();
        let ranked = rank_by_average(&readings, &condition);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0, "김민지");
        assert!((ranked[0].1 - 1.1).abs() < 1e-9);
        assert_eq!(ranked[1].0, "박서준");

        let text = render_ranking(&ranked, &condition);
        assert!(text.contains("1. 김민지 (1.100)"));
        assert!(text.contains("2. 박서준 (1.050)"));
    }
}
