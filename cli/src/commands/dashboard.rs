use anyhow::Result;
use chrono::Local;
use tabled::{
    Table, Tabled,
    builder::Builder,
    settings::{Alignment, Modify, Style, object::Columns},
};

use crate::client::DashboardClient;
use physio_core::dashboard::{Dashboard, Metric, RangeFilter};
use physio_core::db::Database;
use physio_core::models::{EntryForm, HealthEntry};
use physio_core::stats::{StatsWindow, WindowSpec, window_stats};

use super::helpers::fmt_metric;

/// Where dashboard data comes from: the local store or a running server.
pub(crate) enum Source<'a> {
    Store(&'a Database),
    Server(&'a DashboardClient),
}

impl Source<'_> {
    async fn entries(&self) -> Result<Vec<HealthEntry>> {
        match self {
            Source::Store(db) => Ok(db.list_entries()?),
            Source::Server(client) => client.list_entries().await,
        }
    }

    async fn stats(&self, spec: &WindowSpec) -> Result<Option<StatsWindow>> {
        match self {
            Source::Store(db) => {
                let entries = db.list_entries()?;
                Ok(window_stats(&entries, spec, Local::now().date_naive())?)
            }
            Source::Server(client) => {
                let window = spec.days.map(|_| spec.label.as_str());
                client.stats(window).await
            }
        }
    }

    pub(crate) async fn create(&self, form: EntryForm) -> Result<HealthEntry> {
        match self {
            Source::Store(db) => Ok(db.create_entry(&form.into_new_entry()?)?),
            Source::Server(client) => client.create_entry(&form).await,
        }
    }
}

/// Reload entries and stats, then redraw every chart.
pub(crate) async fn refresh(
    source: &Source<'_>,
    dashboard: &mut Dashboard,
    spec: &WindowSpec,
) -> Result<()> {
    let entries = source.entries().await?;
    let stats = source.stats(spec).await?;
    tracing::debug!(entries = entries.len(), has_stats = stats.is_some(), "dashboard refreshed");
    dashboard.replace(entries, stats);
    Ok(())
}

pub(crate) async fn cmd_dashboard(
    source: &Source<'_>,
    range: &str,
    window: Option<&str>,
    json: bool,
) -> Result<()> {
    let range = RangeFilter::parse(range)?;
    let spec = WindowSpec::parse(window, None)?;

    let mut dashboard = Dashboard::new();
    refresh(source, &mut dashboard, &spec).await?;
    dashboard.apply_range(range);

    if json {
        println!("{}", serde_json::to_string_pretty(&dashboard.view())?);
    } else {
        print_dashboard(&dashboard);
    }
    Ok(())
}

fn decimals(metric: Metric) -> usize {
    match metric {
        Metric::Weight | Metric::BodyFat => 1,
        Metric::Calories | Metric::Steps => 0,
        Metric::Sleep => 2,
    }
}

pub(crate) fn print_stat_cards(dashboard: &Dashboard) {
    #[derive(Tabled)]
    struct CardRow {
        #[tabled(rename = "Metric")]
        label: &'static str,
        #[tabled(rename = "Value")]
        value: String,
    }

    match dashboard.stats() {
        Some(stats) => println!(
            "Stats ({}): {} to {}",
            stats.window, stats.start_date, stats.end_date
        ),
        None => println!("Stats: no entries in window"),
    }

    let rows: Vec<CardRow> = dashboard
        .stat_cards()
        .into_iter()
        .map(|card| {
            let value = fmt_metric(card.value, card.metric.map_or(0, decimals));
            CardRow {
                label: card.label,
                value: if card.value.is_some() && !card.unit.is_empty() {
                    format!("{value} {}", card.unit)
                } else {
                    value
                },
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

fn print_dashboard(dashboard: &Dashboard) {
    let Some(latest) = dashboard.latest_date() else {
        eprintln!("No entries yet. Use `physio add` or `physio import` to record some.");
        return;
    };
    let from = dashboard.visible_from().unwrap_or(latest);
    println!(
        "Range {}: {from} to {latest} (moving average over {} entries)\n",
        dashboard.range(),
        dashboard.average_window()
    );

    print_stat_cards(dashboard);
    println!();

    let series: Vec<_> = dashboard
        .charts()
        .iter()
        .flat_map(|chart| chart.series.iter())
        .collect();

    let mut builder = Builder::default();
    let mut header = vec!["Date".to_string()];
    for s in &series {
        header.push(format!("{} ({})", s.label, s.unit));
        header.push("avg".to_string());
    }
    builder.push_record(header);

    // every series is cut from the same entries, so points line up by index
    if let Some(first) = series.first() {
        for (i, anchor) in first.points.iter().enumerate() {
            let mut record = vec![anchor.date.to_string()];
            for s in &series {
                let point = &s.points[i];
                let places = decimals(s.metric);
                record.push(fmt_metric(point.value, places));
                record.push(fmt_metric(point.average, places));
            }
            builder.push_record(record);
        }
    }

    let table = builder
        .build()
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}
