//! Resolution of the date window a question applies to.

use crate::brain::slots::{extract_date_or_month, extract_recent_days, DateSpec};
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Which readings a question covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReadingWindow {
    Day { date: NaiveDate },
    Month { year: i32, month: u32 },
    /// The last `days` calendar days up to and including the reference date.
    Recent { days: u32, since: NaiveDate },
    All,
}

/// Inclusive date bounds; `None` means unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// First day of the `days`-long window ending on `reference`.
pub fn recent_since(reference: NaiveDate, days: u32) -> NaiveDate {
    reference
        .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN)
}

impl ReadingWindow {
    /// Picks the window for a question: explicit day, then explicit month,
    /// then "recent N days", then the whole history.
    pub fn resolve(text: &str, reference: NaiveDate) -> Self {
        match extract_date_or_month(text, reference.year()) {
            Some(DateSpec::Day { date }) => ReadingWindow::Day { date },
            Some(DateSpec::Month { year, month }) => ReadingWindow::Month { year, month },
            None => match extract_recent_days(text) {
                Some(days) => ReadingWindow::Recent {
                    days,
                    since: recent_since(reference, days),
                },
                None => ReadingWindow::All,
            },
        }
    }

    pub fn range(&self) -> DateRange {
        match *self {
            ReadingWindow::Day { date } => DateRange {
                from: Some(date),
                to: Some(date),
            },
            ReadingWindow::Month { year, month } => {
                let first = NaiveDate::from_ymd_opt(year, month, 1);
                let last = first
                    .and_then(|d| d.checked_add_months(chrono::Months::new(1)))
                    .and_then(|d| d.pred_opt());
                DateRange { from: first, to: last }
            }
            ReadingWindow::Recent { since, .. } => DateRange {
                from: Some(since),
                to: None,
            },
            ReadingWindow::All => DateRange::default(),
        }
    }

    /// Korean description, e.g. "2025년 4월 3일", "최근 7일", "전체 기간".
    pub fn label(&self) -> String {
        match *self {
            ReadingWindow::Day { date } => {
                format!("{}년 {}월 {}일", date.year(), date.month(), date.day())
            }
            ReadingWindow::Month { year, month } => format!("{}년 {}월", year, month),
            ReadingWindow::Recent { days, .. } => format!("최근 {}일", days),
            ReadingWindow::All => "전체 기간".to_string(),
        }
    }
}
