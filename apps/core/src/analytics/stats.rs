//! Numeric helpers over reading series.

use serde_json::Value;

/// Decodes stored PPG text into samples.
///
/// Accepts a JSON list of numbers or a bare number. Anything else, including
/// a list holding a non-number, is treated as an empty series.
pub fn parse_ppg(raw: &str) -> Vec<f64> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Number(n)) => n.as_f64().into_iter().collect(),
        Ok(Value::Array(items)) => items
            .iter()
            .map(Value::as_f64)
            .collect::<Option<Vec<f64>>>()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation; 0 for fewer than two samples.
pub fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let Some(mu) = mean(values) else {
        return 0.0;
    };
    let variance = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Median of a series (mean of the two middle values for even lengths).
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

pub fn flatten(series: &[Vec<f64>]) -> Vec<f64> {
    series.iter().flatten().copied().collect()
}
