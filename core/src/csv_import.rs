use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{NewHealthEntry, clean_text, parse_decimal, parse_sleep_hours, round_to_i64};

/// Accepted date layouts, tried in order. Day-first wins when ambiguous.
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Date,
    Weight,
    BodyFat,
    Calories,
    Steps,
    SleepTotal,
    SleepQuality,
    Observations,
}

impl Field {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Date => "date",
            Field::Weight => "weight",
            Field::BodyFat => "body_fat",
            Field::Calories => "calories",
            Field::Steps => "steps",
            Field::SleepTotal => "sleep_total",
            Field::SleepQuality => "sleep_quality",
            Field::Observations => "observations",
        }
    }
}

struct ColumnRule {
    all_of: &'static [&'static str],
    none_of: &'static [&'static str],
    field: Field,
}

// Order matters: the first rule whose keywords all appear in a header wins.
const COLUMN_RULES: &[ColumnRule] = &[
    ColumnRule { all_of: &["date"], none_of: &[], field: Field::Date },
    ColumnRule { all_of: &["body", "fat"], none_of: &[], field: Field::BodyFat },
    ColumnRule { all_of: &["weight"], none_of: &["body"], field: Field::Weight },
    ColumnRule { all_of: &["calorie"], none_of: &[], field: Field::Calories },
    ColumnRule { all_of: &["step"], none_of: &[], field: Field::Steps },
    ColumnRule { all_of: &["sleep", "quality"], none_of: &[], field: Field::SleepQuality },
    ColumnRule { all_of: &["sleep"], none_of: &[], field: Field::SleepTotal },
    ColumnRule { all_of: &["observation"], none_of: &[], field: Field::Observations },
    ColumnRule { all_of: &["note"], none_of: &[], field: Field::Observations },
];

/// Map one header name to its target field, if any rule recognizes it.
#[must_use]
pub fn match_header(header: &str) -> Option<Field> {
    let lower = header.trim().to_lowercase();
    COLUMN_RULES
        .iter()
        .find(|rule| {
            rule.all_of.iter().all(|k| lower.contains(k))
                && !rule.none_of.iter().any(|k| lower.contains(k))
        })
        .map(|rule| rule.field)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    pub field: Field,
    pub header: String,
    pub index: usize,
}

/// Bind each field to the first header that maps to it.
#[must_use]
pub fn map_columns(headers: &csv::StringRecord) -> Vec<ColumnMapping> {
    let mut mapped: Vec<ColumnMapping> = Vec::new();
    for (index, header) in headers.iter().enumerate() {
        let Some(field) = match_header(header) else {
            tracing::debug!(header, "ignoring unrecognized column");
            continue;
        };
        if mapped.iter().any(|m| m.field == field) {
            tracing::warn!(header, field = field.as_str(), "field already mapped, ignoring column");
            continue;
        }
        mapped.push(ColumnMapping {
            field,
            header: header.trim().to_string(),
            index,
        });
    }
    mapped
}

/// Tab when the header line carries more tabs than commas.
#[must_use]
pub fn detect_delimiter(first_line: &str) -> u8 {
    let tabs = first_line.matches('\t').count();
    let commas = first_line.matches(',').count();
    if tabs > commas { b'\t' } else { b',' }
}

/// Parse a date in any of the accepted layouts.
#[must_use]
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// A data row: the entry it describes, or why it can't be imported.
#[derive(Debug, Clone)]
pub struct ParsedRow {
    /// 1-based line number in the source file, header included.
    pub line: usize,
    pub entry: std::result::Result<NewHealthEntry, String>,
}

#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub columns: Vec<ColumnMapping>,
    pub rows: Vec<ParsedRow>,
}

/// Parse the text of a CSV or TSV export.
pub fn parse_health_str(text: &str) -> Result<ParsedFile> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let delimiter = detect_delimiter(text.lines().next().unwrap_or_default());

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = rdr.headers()?.clone();
    let columns = map_columns(&headers);

    if !columns.iter().any(|c| c.field == Field::Date) {
        let found: Vec<&str> = headers.iter().collect();
        return Err(Error::validation(format!(
            "Could not find a date column. Found columns: {}",
            found.join(", ")
        )));
    }

    let rows = rdr
        .records()
        .enumerate()
        .map(|(i, record)| ParsedRow {
            line: i + 2,
            entry: record
                .map_err(|e| e.to_string())
                .and_then(|r| row_to_entry(&r, &columns)),
        })
        .collect();

    Ok(ParsedFile { columns, rows })
}

fn row_to_entry(
    record: &csv::StringRecord,
    columns: &[ColumnMapping],
) -> std::result::Result<NewHealthEntry, String> {
    let cell = |field: Field| {
        columns
            .iter()
            .find(|c| c.field == field)
            .and_then(|c| record.get(c.index))
    };
    let number = |field: Field| {
        cell(field).and_then(|raw| parse_decimal(raw).ok().flatten())
    };

    let raw_date = cell(Field::Date).unwrap_or_default();
    let date = parse_flexible_date(raw_date)
        .ok_or_else(|| format!("no parsable date in '{raw_date}'"))?;

    let sleep_total = cell(Field::SleepTotal).and_then(|raw| {
        if raw.contains(':') {
            parse_sleep_hours(raw)
        } else {
            parse_decimal(raw).ok().flatten()
        }
    });

    let entry = NewHealthEntry {
        date: Some(date),
        weight: number(Field::Weight),
        body_fat: number(Field::BodyFat),
        calories: number(Field::Calories).map(round_to_i64),
        steps: number(Field::Steps).map(round_to_i64),
        sleep_total,
        sleep_quality: clean_text(cell(Field::SleepQuality)),
        observations: clean_text(cell(Field::Observations)),
    };
    entry.validate().map_err(|e| e.to_string())?;
    Ok(entry)
}

/// Outcome counts of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub rows_read: usize,
    pub added: usize,
    pub skipped_existing: usize,
    pub skipped_invalid: usize,
}

impl ImportSummary {
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped_existing + self.skipped_invalid
    }
}

/// Insert parsed rows, skipping dates that are already stored.
///
/// Rows are independent: a bad row is counted and the rest still go in.
/// When `dry_run` is true nothing is written.
pub fn import_entries(db: &Database, rows: &[ParsedRow], dry_run: bool) -> Result<ImportSummary> {
    let mut summary = ImportSummary {
        rows_read: rows.len(),
        ..ImportSummary::default()
    };
    let mut seen: HashSet<NaiveDate> = HashSet::new();

    for row in rows {
        let entry = match &row.entry {
            Ok(entry) => entry,
            Err(reason) => {
                tracing::warn!(line = row.line, reason = %reason, "skipping row");
                summary.skipped_invalid += 1;
                continue;
            }
        };

        if dry_run {
            let Some(date) = entry.date else {
                summary.skipped_invalid += 1;
                continue;
            };
            if !seen.insert(date) || db.get_entry(date)?.is_some() {
                summary.skipped_existing += 1;
            } else {
                summary.added += 1;
            }
            continue;
        }

        match db.create_entry(entry) {
            Ok(_) => summary.added += 1,
            Err(Error::Conflict(date)) => {
                tracing::debug!(line = row.line, %date, "entry already exists");
                summary.skipped_existing += 1;
            }
            Err(Error::Validation(reason)) => {
                tracing::warn!(line = row.line, reason = %reason, "skipping row");
                summary.skipped_invalid += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(summary)
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub dry_run: bool,
    pub columns: Vec<ColumnMapping>,
    #[serde(flatten)]
    pub summary: ImportSummary,
    pub total_entries: usize,
}

/// Read a CSV/TSV file from disk and import it.
///
/// A missing or unreadable file fails the whole import; row-level problems do not.
pub fn import_path(db: &Database, path: &Path, dry_run: bool) -> Result<ImportReport> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let parsed = parse_health_str(&text)?;
    tracing::info!(
        path = %path.display(),
        columns = ?parsed.columns.iter().map(|c| c.field.as_str()).collect::<Vec<_>>(),
        rows = parsed.rows.len(),
        "parsed import file"
    );

    let summary = import_entries(db, &parsed.rows, dry_run)?;
    let total_entries = db.count_entries()?;
    tracing::info!(
        added = summary.added,
        skipped_existing = summary.skipped_existing,
        skipped_invalid = summary.skipped_invalid,
        dry_run,
        "import finished"
    );

    Ok(ImportReport {
        dry_run,
        columns: parsed.columns,
        summary,
        total_entries,
    })
}
