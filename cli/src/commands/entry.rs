use anyhow::Result;
use chrono::Duration;
use serde_json::json;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use physio_core::dashboard::{Dashboard, RangeFilter};
use physio_core::db::Database;
use physio_core::models::{EntryForm, HealthEntry};
use physio_core::stats::WindowSpec;

use super::dashboard::{Source, print_stat_cards, refresh};
use super::helpers::{fmt_count, fmt_metric, json_error, parse_date, truncate};

/// Submit one entry, then reload stats and charts the way the dashboard does
/// after a form post.
pub(crate) async fn cmd_add(
    source: &Source<'_>,
    date: Option<&str>,
    mut form: EntryForm,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    form.date = Some(date.format("%Y-%m-%d").to_string());

    let entry = source.create(form).await?;
    tracing::info!(date = %entry.date, "entry added");

    let mut dashboard = Dashboard::new();
    refresh(source, &mut dashboard, &WindowSpec::all_time()).await?;
    dashboard.apply_range(RangeFilter::DEFAULT);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "success": true,
                "entry": entry,
                "dashboard": dashboard.view(),
            }))?
        );
    } else {
        println!("Added entry for {}", entry.date);
        print_entry(&entry);
        println!();
        print_stat_cards(&dashboard);
    }

    Ok(())
}

pub(crate) fn cmd_list(db: &Database, days: Option<u32>, json: bool) -> Result<()> {
    let mut entries = db.list_entries()?;
    entries.sort_by_key(|e| e.date);

    // counted back from the latest entry, like the dashboard range
    if let (Some(days), Some(latest)) = (days, entries.last().map(|e| e.date)) {
        let from = Duration::try_days(i64::from(days.max(1)) - 1)
            .and_then(|span| latest.checked_sub_signed(span));
        if let Some(from) = from {
            entries.retain(|e| e.date >= from);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        eprintln!("No entries found. Use `physio add` or `physio import` to record some.");
    } else {
        print_entry_table(&entries);
    }

    Ok(())
}

pub(crate) fn cmd_show(db: &Database, date: Option<&str>, json: bool) -> Result<()> {
    let date = parse_date(date)?;

    if let Some(entry) = db.get_entry(date)? {
        if json {
            println!("{}", serde_json::to_string_pretty(&entry)?);
        } else {
            println!("{}", entry.date);
            print_entry(&entry);
        }
    } else {
        let message = format!("No entry for {date}");
        if json {
            println!("{}", json_error(&message));
        } else {
            eprintln!("{message}");
        }
    }

    Ok(())
}

fn print_entry(entry: &HealthEntry) {
    println!("  Weight:       {} kg", fmt_metric(entry.weight, 1));
    println!("  Body fat:     {} %", fmt_metric(entry.body_fat, 1));
    println!("  Calories:     {}", fmt_count(entry.calories));
    println!("  Steps:        {}", fmt_count(entry.steps));
    println!("  Sleep:        {} h", fmt_metric(entry.sleep_total, 2));
    if let Some(ref q) = entry.sleep_quality {
        println!("  Sleep quality: {q}");
    }
    if let Some(ref o) = entry.observations {
        println!("  Notes:        {o}");
    }
}

fn print_entry_table(entries: &[HealthEntry]) {
    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Weight (kg)")]
        weight: String,
        #[tabled(rename = "Body fat (%)")]
        body_fat: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Steps")]
        steps: String,
        #[tabled(rename = "Sleep (h)")]
        sleep: String,
        #[tabled(rename = "Quality")]
        quality: String,
        #[tabled(rename = "Notes")]
        notes: String,
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| EntryRow {
            date: e.date.format("%Y-%m-%d").to_string(),
            weight: fmt_metric(e.weight, 1),
            body_fat: fmt_metric(e.body_fat, 1),
            calories: fmt_count(e.calories),
            steps: fmt_count(e.steps),
            sleep: fmt_metric(e.sleep_total, 2),
            quality: e.sleep_quality.clone().unwrap_or_default(),
            notes: e
                .observations
                .as_deref()
                .map(|o| truncate(o, 30))
                .unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..6)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(weight: &str) -> EntryForm {
        EntryForm {
            weight: Some(serde_json::Value::String(weight.to_string())),
            ..EntryForm::default()
        }
    }

    #[tokio::test]
    async fn add_fills_date_and_stores_entry() {
        let db = Database::open_in_memory().unwrap();
        let source = Source::Store(&db);

        cmd_add(&source, Some("2026-02-10"), form("70.2"), true)
            .await
            .unwrap();

        let date = parse_date(Some("2026-02-10")).unwrap();
        let stored = db.get_entry(date).unwrap().unwrap();
        assert_eq!(stored.weight, Some(70.2));
    }

    #[tokio::test]
    async fn add_rejects_duplicates_and_bad_dates() {
        let db = Database::open_in_memory().unwrap();
        let source = Source::Store(&db);

        cmd_add(&source, Some("2026-02-10"), form("70"), true)
            .await
            .unwrap();
        assert!(cmd_add(&source, Some("2026-02-10"), form("71"), true).await.is_err());
        assert!(cmd_add(&source, Some("02/10/2026"), form("71"), true).await.is_err());
        assert_eq!(db.count_entries().unwrap(), 1);
    }

    #[test]
    fn list_and_show_run_on_empty_store() {
        let db = Database::open_in_memory().unwrap();
        cmd_list(&db, Some(7), true).unwrap();
        cmd_show(&db, Some("2026-02-10"), false).unwrap();
    }
}
