//! Per-person descriptive statistics fed to the report prompt.

use crate::analytics::stats::{flatten, mean, median};
use crate::brain::slots::{Metric, ALL_METRICS};
use crate::models::Reading;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub samples: usize,
}

impl MetricSummary {
    /// `None` for an empty series.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mean = mean(values)?;
        let median = median(values)?;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            mean,
            min,
            max,
            median,
            samples: values.len(),
        })
    }
}

/// Statistics for one person over one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonSummary {
    pub name: String,
    pub days: usize,
    pub ppg: Option<MetricSummary>,
    pub hrv: Option<MetricSummary>,
    pub stress: Option<MetricSummary>,
}

impl PersonSummary {
    /// PPG samples are pooled across days. Readings of other people are ignored.
    pub fn from_readings(name: &str, readings: &[Reading]) -> Option<Self> {
        let own: Vec<&Reading> = readings.iter().filter(|r| r.name == name).collect();
        if own.is_empty() {
            return None;
        }

        let ppg: Vec<Vec<f64>> = own.iter().map(|r| r.ppg_samples()).collect();
        let hrv: Vec<f64> = own.iter().map(|r| r.hrv).collect();
        let stress: Vec<f64> = own.iter().map(|r| r.stress).collect();

        Some(Self {
            name: name.to_string(),
            days: own.len(),
            ppg: MetricSummary::from_values(&flatten(&ppg)),
            hrv: MetricSummary::from_values(&hrv),
            stress: MetricSummary::from_values(&stress),
        })
    }

    pub fn metric(&self, metric: Metric) -> Option<&MetricSummary> {
        match metric {
            Metric::Ppg => self.ppg.as_ref(),
            Metric::Hrv => self.hrv.as_ref(),
            Metric::Stress => self.stress.as_ref(),
        }
    }

    /// Prompt context, one line per metric.
    pub fn render(&self) -> String {
        let mut lines = vec![format!("- {} ({}일):", self.name, self.days)];
        for metric in ALL_METRICS {
            let line = match self.metric(metric) {
                Some(s) => format!(
                    "  {}: 평균 {:.3}, 최소 {:.3}, 최대 {:.3}, 중앙값 {:.3}",
                    metric.label_ko(),
                    s.mean,
                    s.min,
                    s.max,
                    s.median
                ),
                None => format!("  {}: 데이터 없음", metric.label_ko()),
            };
            lines.push(line);
        }
        lines.join("\n")
    }
}
