use anyhow::Result;
use chrono::Local;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use physio_core::db::Database;
use physio_core::stats::{StatsWindow, WindowSpec, compute_stats};

use super::helpers::fmt_metric;

pub(crate) fn cmd_stats(
    db: &Database,
    window: Option<&str>,
    days: Option<&str>,
    json: bool,
) -> Result<()> {
    let spec = WindowSpec::parse(window, days)?;
    let entries = db.list_entries()?;
    let stats = compute_stats(&entries, &spec, Local::now().date_naive())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&stats);
    }

    Ok(())
}

fn print_stats(stats: &StatsWindow) {
    #[derive(Tabled)]
    struct StatRow {
        #[tabled(rename = "Metric")]
        metric: &'static str,
        #[tabled(rename = "Average")]
        average: String,
    }

    println!(
        "Window {}: {} to {} ({} entries)",
        stats.window, stats.start_date, stats.end_date, stats.stats.total_entries
    );

    let avg = &stats.stats;
    let rows = vec![
        StatRow {
            metric: "Weight (kg)",
            average: fmt_metric(avg.avg_weight, 2),
        },
        StatRow {
            metric: "Body fat (%)",
            average: fmt_metric(avg.avg_body_fat, 2),
        },
        StatRow {
            metric: "Calories",
            average: fmt_metric(avg.avg_calories, 2),
        },
        StatRow {
            metric: "Steps",
            average: fmt_metric(avg.avg_steps, 2),
        },
        StatRow {
            metric: "Sleep (h)",
            average: fmt_metric(avg.avg_sleep, 2),
        },
    ];

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}
