use crate::analytics::stats::{mean, parse_ppg};
use crate::brain::intent::Intent;
use crate::brain::slots::Metric;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
#[cfg(test)]
use validator::Validate;

/// One person's vitals for one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reading {
    pub id: i64,
    /// Person name, unique per (name, date).
    pub name: String,
    pub date: NaiveDate,
    /// Serialized PPG samples: a JSON list of numbers or a bare number.
    pub ppg_json: String,
    pub hrv: f64,
    pub stress: f64,
}

impl Reading {
    /// Raw PPG samples; malformed JSON yields an empty series.
    pub fn ppg_samples(&self) -> Vec<f64> {
        parse_ppg(&self.ppg_json)
    }

    /// Daily value for a metric. PPG is the day's sample mean.
    pub fn metric_value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Ppg => mean(&self.ppg_samples()),
            Metric::Hrv => Some(self.hrv),
            Metric::Stress => Some(self.stress),
        }
    }
}

/// A reading to be inserted.
#[cfg(test)]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewReading {
    #[validate(length(min = 1))]
    pub name: String,
    pub date: NaiveDate,
    pub ppg: Vec<f64>,
    #[validate(range(min = 0.0))]
    pub hrv: f64,
    #[validate(range(min = 0.0))]
    pub stress: f64,
}

/// Row returned by a compiled numeric-condition query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ConditionRow {
    pub name: String,
    pub date: NaiveDate,
    pub value: f64,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Series handed to the client for chart rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub name: String,
    pub metric: Metric,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

/// Body of `POST /ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub message: String,
}

/// Answer to a single question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub intent: Intent,
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSeries>,
}

impl AskResponse {
    pub fn text(intent: Intent, response: impl Into<String>) -> Self {
        Self {
            intent,
            response: response.into(),
            chart: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(ppg_json: &str) -> Reading {
        Reading {
            id: 1,
            name: "김민지".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            ppg_json: ppg_json.to_string(),
            hrv: 33.0,
            stress: 90.0,
        }
    }

    #[test]
    fn test_metric_value() {
        let r = reading("[0.9, 1.1]");
        assert!((r.metric_value(Metric::Ppg).unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(r.metric_value(Metric::Hrv), Some(33.0));
        assert_eq!(r.metric_value(Metric::Stress), Some(90.0));
    }

    #[test]
    fn test_invalid_ppg_is_empty() {
        let r = reading("not json");
        assert!(r.ppg_samples().is_empty());
        assert_eq!(r.metric_value(Metric::Ppg), None);
    }

    #[test]
    fn test_ask_response_serialization() {
        let response = AskResponse::text(Intent::FilterCondition, "조건에 맞는 결과가 없습니다.");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["intent"], "filter_condition");
        assert!(json.get("chart").is_none());
    }
}
