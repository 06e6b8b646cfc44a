use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// One calendar day's recorded health metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthEntry {
    pub id: i64,
    pub date: NaiveDate,
    pub weight: Option<f64>,
    pub body_fat: Option<f64>,
    pub calories: Option<i64>,
    pub steps: Option<i64>,
    pub sleep_total: Option<f64>,
    pub sleep_quality: Option<String>,
    pub observations: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewHealthEntry {
    pub date: Option<NaiveDate>,
    pub weight: Option<f64>,
    pub body_fat: Option<f64>,
    pub calories: Option<i64>,
    pub steps: Option<i64>,
    pub sleep_total: Option<f64>,
    pub sleep_quality: Option<String>,
    pub observations: Option<String>,
}

impl NewHealthEntry {
    #[must_use]
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Self::default()
        }
    }

    /// Check the date is present and every metric is in a plausible range.
    ///
    /// Returns the entry date so callers don't have to unwrap it again.
    pub fn validate(&self) -> Result<NaiveDate> {
        let date = self
            .date
            .ok_or_else(|| Error::validation("date is required"))?;

        if self.weight.is_some_and(|v| v <= 0.0) {
            return Err(Error::validation("weight must be greater than 0"));
        }
        if self.body_fat.is_some_and(|v| !(0.0..=100.0).contains(&v)) {
            return Err(Error::validation("body_fat must be between 0 and 100"));
        }
        if self.calories.is_some_and(|v| v < 0) {
            return Err(Error::validation("calories must not be negative"));
        }
        if self.steps.is_some_and(|v| v < 0) {
            return Err(Error::validation("steps must not be negative"));
        }
        if self.sleep_total.is_some_and(|v| !(0.0..=24.0).contains(&v)) {
            return Err(Error::validation("sleep_total must be between 0 and 24 hours"));
        }
        Ok(date)
    }
}

/// Raw entry as submitted by the dashboard form.
///
/// Numeric fields may arrive as JSON numbers, numeric strings, empty strings
/// or null.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EntryForm {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub weight: Option<Value>,
    #[serde(default)]
    pub body_fat: Option<Value>,
    #[serde(default)]
    pub calories: Option<Value>,
    #[serde(default)]
    pub steps: Option<Value>,
    #[serde(default)]
    pub sleep_total: Option<Value>,
    #[serde(default)]
    pub sleep_quality: Option<String>,
    #[serde(default)]
    pub observations: Option<String>,
}

impl EntryForm {
    pub fn into_new_entry(self) -> Result<NewHealthEntry> {
        let date = match self.date.as_deref().map(str::trim) {
            None | Some("") => return Err(Error::validation("date is required")),
            Some(raw) => parse_iso_date(raw)?,
        };

        let sleep_total = match self.sleep_total {
            Some(Value::String(s)) if s.contains(':') => Some(
                parse_sleep_hours(&s)
                    .ok_or_else(|| Error::validation(format!("Invalid sleep_total '{s}'")))?,
            ),
            other => form_decimal("sleep_total", other)?,
        };

        let entry = NewHealthEntry {
            date: Some(date),
            weight: form_decimal("weight", self.weight)?,
            body_fat: form_decimal("body_fat", self.body_fat)?,
            calories: form_decimal("calories", self.calories)?.map(round_to_i64),
            steps: form_decimal("steps", self.steps)?.map(round_to_i64),
            sleep_total,
            sleep_quality: clean_text(self.sleep_quality.as_deref()),
            observations: clean_text(self.observations.as_deref()),
        };
        entry.validate()?;
        Ok(entry)
    }
}

fn form_decimal(field: &str, value: Option<Value>) -> Result<Option<f64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => parse_decimal(&s)
            .map_err(|_| Error::validation(format!("Invalid {field} '{s}'. Expected a number"))),
        Some(other) => Err(Error::validation(format!(
            "Invalid {field} {other}. Expected a number"
        ))),
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_iso_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| Error::validation(format!("Invalid date '{raw}'. Use YYYY-MM-DD")))
}

/// Parse a decimal number, accepting a comma as decimal separator.
///
/// Blank values and the `--` placeholder are absent, not zero.
pub fn parse_decimal(raw: &str) -> Result<Option<f64>> {
    let trimmed = raw.trim();
    if is_placeholder(trimmed) {
        return Ok(None);
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| Error::validation(format!("'{raw}' is not a number")))
}

/// Convert `h:mm` or `h:mm:ss` into decimal hours rounded to two places.
#[must_use]
pub fn parse_sleep_hours(raw: &str) -> Option<f64> {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }
    let hours: u32 = parts[0].trim().parse().ok()?;
    let minutes: u32 = parts[1].trim().parse().ok()?;
    let seconds: u32 = match parts.get(2) {
        Some(s) => s.trim().parse().ok()?,
        None => 0,
    };
    if hours > 24 || minutes >= 60 || seconds >= 60 {
        return None;
    }
    let total = f64::from(hours) + f64::from(minutes) / 60.0 + f64::from(seconds) / 3600.0;
    Some(round2(total))
}

pub(crate) fn clean_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !is_placeholder(s))
        .map(ToString::to_string)
}

fn is_placeholder(s: &str) -> bool {
    s.is_empty() || s == "--"
}

pub(crate) fn round_to_i64(v: f64) -> i64 {
    v.round() as i64
}

/// Round to two decimal places.
#[must_use]
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
