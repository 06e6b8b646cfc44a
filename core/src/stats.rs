//! Per-metric averages over a trailing date window.
//!
//! A window is given either as `Nd` / `Nm` / `Ny` (months are 30 days, years
//! 365) or as a plain day count. The window ends at the latest entry date and
//! covers exactly `N` calendar days, inclusive at both ends.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{HealthEntry, round2};

const DAYS_PER_MONTH: i64 = 30;
const DAYS_PER_YEAR: i64 = 365;

/// A parsed window: its display label and length in days (`None` = all-time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    pub label: String,
    pub days: Option<i64>,
}

impl WindowSpec {
    #[must_use]
    pub fn all_time() -> Self {
        Self {
            label: "all".to_string(),
            days: None,
        }
    }

    #[must_use]
    pub fn last_days(days: i64) -> Self {
        Self {
            label: format!("{days}d"),
            days: Some(days),
        }
    }

    /// Resolve the `window` and `days` request parameters.
    ///
    /// `window` takes precedence: when both are supplied `days` is ignored.
    pub fn parse(window: Option<&str>, days: Option<&str>) -> Result<Self> {
        if let Some(window) = window.map(str::trim).filter(|w| !w.is_empty()) {
            return Self::parse_window(window);
        }
        match days.map(str::trim).filter(|d| !d.is_empty()) {
            Some(raw) => {
                let n: i64 = raw.parse().map_err(|_| {
                    Error::validation(format!("Invalid days '{raw}'. Expected a whole number"))
                })?;
                if n <= 0 {
                    return Err(Error::validation("days must be greater than 0"));
                }
                Ok(Self::last_days(n))
            }
            None => Ok(Self::all_time()),
        }
    }

    fn parse_window(window: &str) -> Result<Self> {
        let invalid = || {
            Error::validation(format!(
                "Invalid window '{window}'. Use <number><d|m|y>, e.g. 7d, 3m, 1y"
            ))
        };

        let lower = window.to_ascii_lowercase();
        let unit = lower.chars().last().ok_or_else(invalid)?;
        let digits = &lower[..lower.len() - unit.len_utf8()];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let count: i64 = digits.parse().map_err(|_| invalid())?;
        if count == 0 {
            return Err(Error::validation("window must cover at least one day"));
        }

        let multiplier = match unit {
            'd' => 1,
            'm' => DAYS_PER_MONTH,
            'y' => DAYS_PER_YEAR,
            _ => return Err(invalid()),
        };
        let days = count.checked_mul(multiplier).ok_or_else(invalid)?;

        Ok(Self {
            label: lower,
            days: Some(days),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAverages {
    pub avg_weight: Option<f64>,
    pub avg_body_fat: Option<f64>,
    pub avg_calories: Option<f64>,
    pub avg_steps: Option<f64>,
    pub avg_sleep: Option<f64>,
    pub total_entries: usize,
}

/// Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsWindow {
    pub window: String,
    pub window_days: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub stats: MetricAverages,
}

/// Average every metric over the entries that fall inside `spec`.
///
/// `today` anchors the window only when there are no entries at all.
pub fn compute_stats(
    entries: &[HealthEntry],
    spec: &WindowSpec,
    today: NaiveDate,
) -> Result<StatsWindow> {
    let end_date = entries.iter().map(|e| e.date).max().unwrap_or(today);
    let start_date = match spec.days {
        Some(days) => Duration::try_days(days - 1)
            .and_then(|span| end_date.checked_sub_signed(span))
            .unwrap_or(NaiveDate::MIN),
        None => entries.iter().map(|e| e.date).min().unwrap_or(today),
    };

    let in_window: Vec<&HealthEntry> = entries
        .iter()
        .filter(|e| e.date >= start_date && e.date <= end_date)
        .collect();

    if in_window.is_empty() {
        return Err(Error::NotFound(format!(
            "No entries between {start_date} and {end_date}"
        )));
    }

    #[allow(clippy::cast_precision_loss)]
    let stats = MetricAverages {
        avg_weight: mean(in_window.iter().map(|e| e.weight)),
        avg_body_fat: mean(in_window.iter().map(|e| e.body_fat)),
        avg_calories: mean(in_window.iter().map(|e| e.calories.map(|v| v as f64))),
        avg_steps: mean(in_window.iter().map(|e| e.steps.map(|v| v as f64))),
        avg_sleep: mean(in_window.iter().map(|e| e.sleep_total)),
        total_entries: in_window.len(),
    };

    tracing::debug!(
        window = %spec.label,
        %start_date,
        %end_date,
        total = stats.total_entries,
        "computed stats window"
    );

    Ok(StatsWindow {
        window: spec.label.clone(),
        window_days: spec.days,
        start_date,
        end_date,
        stats,
    })
}

/// Like [`compute_stats`], but an empty window yields `None` so callers can
/// show placeholders.
pub fn window_stats(
    entries: &[HealthEntry],
    spec: &WindowSpec,
    today: NaiveDate,
) -> Result<Option<StatsWindow>> {
    match compute_stats(entries, spec, today) {
        Ok(stats) => Ok(Some(stats)),
        Err(Error::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Mean of the present values, rounded to two decimals. Missing values are
/// left out of the denominator.
#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| round2(sum / count as f64))
}
