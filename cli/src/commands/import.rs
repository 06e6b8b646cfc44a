use std::path::Path;

use anyhow::{Context, Result};
use tabled::{Table, Tabled, settings::Style};

use physio_core::csv_import::{ImportReport, import_path};
use physio_core::db::Database;

pub(crate) fn cmd_import(db: &Database, path: &Path, dry_run: bool, json: bool) -> Result<()> {
    let report = import_path(db, path, dry_run)
        .with_context(|| format!("Import of {} failed", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &ImportReport) {
    #[derive(Tabled)]
    struct ColumnRow {
        #[tabled(rename = "Column")]
        header: String,
        #[tabled(rename = "Field")]
        field: &'static str,
    }

    if report.columns.is_empty() {
        eprintln!("No recognized columns.");
    } else {
        let rows: Vec<ColumnRow> = report
            .columns
            .iter()
            .map(|c| ColumnRow {
                header: c.header.clone(),
                field: c.field.as_str(),
            })
            .collect();
        println!("{}", Table::new(&rows).with(Style::rounded()));
    }

    let summary = &report.summary;
    if report.dry_run {
        println!("Dry run, no changes made.\n");
        println!("  Rows read:                {}", summary.rows_read);
        println!("  Would add:                {}", summary.added);
    } else {
        println!("Import complete.\n");
        println!("  Rows read:                {}", summary.rows_read);
        println!("  Added:                    {}", summary.added);
    }
    println!("  Skipped (already exist):  {}", summary.skipped_existing);
    println!("  Skipped (invalid):        {}", summary.skipped_invalid);
    println!("  Total in database:        {}", report.total_entries);
}
