mod client;
mod commands;
mod config;
mod server;

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::client::DashboardClient;
use crate::commands::{
    Source, cmd_add, cmd_dashboard, cmd_import, cmd_list, cmd_show, cmd_stats,
};
use crate::config::Config;
use physio_core::db::Database;
use physio_core::models::EntryForm;

#[derive(Parser)]
#[command(
    name = "physio",
    version,
    about = "A personal health-metrics dashboard",
    long_about = "Track weight, body fat, calories, steps and sleep in a local SQLite \
                  store, import CSV/TSV exports, and chart trends with moving averages."
)]
struct Cli {
    /// Path to the SQLite database (overrides PHYSIO_DATABASE_URL / PHYSIO_DATA_DIR)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "5000")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
    /// Import entries from a CSV or TSV export
    Import {
        /// Path to the CSV/TSV file
        file: PathBuf,
        /// Preview import without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record one day's metrics
    Add {
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Weight in kg
        #[arg(long)]
        weight: Option<String>,
        /// Body fat percentage
        #[arg(long)]
        body_fat: Option<String>,
        /// Calories eaten
        #[arg(long)]
        calories: Option<String>,
        /// Step count
        #[arg(long)]
        steps: Option<String>,
        /// Total sleep in hours (e.g. "7.5" or "7:30")
        #[arg(long)]
        sleep: Option<String>,
        /// Sleep quality (free text, e.g. "good")
        #[arg(long)]
        sleep_quality: Option<String>,
        /// Notes for the day
        #[arg(long)]
        observations: Option<String>,
        /// Submit to a running server instead of the local database
        #[arg(long, value_name = "URL")]
        server: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List entries
    List {
        /// Only the last N days, counted back from the latest entry
        #[arg(short, long)]
        days: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the entry for one date (default: today)
    Show {
        /// Date (YYYY-MM-DD or today/yesterday)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Average each metric over a window
    Stats {
        /// Window such as 7d, 3m or 1y (default: all time)
        #[arg(short, long)]
        window: Option<String>,
        /// Window length in days (ignored when --window is given)
        #[arg(short, long)]
        days: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show stat cards and chart series
    Dashboard {
        /// Visible range: 30d, 90d, any Nd, or all
        #[arg(short, long, default_value = "90d")]
        range: String,
        /// Stats window for the cards (default: all time)
        #[arg(short, long)]
        window: Option<String>,
        /// Read from a running server instead of the local database
        #[arg(long, value_name = "URL")]
        server: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn text_field(value: Option<String>) -> Option<Value> {
    value.map(Value::String)
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.db)?;
    init_tracing(config.log_filter());
    tracing::debug!(db = %config.db_path.display(), data_dir = %config.data_dir.display(), "configuration loaded");

    let open_db = || {
        Database::open(&config.db_path)
            .with_context(|| format!("Failed to open database {}", config.db_path.display()))
    };

    match cli.command {
        Commands::Serve { port, bind } => server::start_server(open_db()?, port, &bind).await,
        Commands::Import {
            file,
            dry_run,
            json,
        } => cmd_import(&open_db()?, &file, dry_run, json),
        Commands::Add {
            date,
            weight,
            body_fat,
            calories,
            steps,
            sleep,
            sleep_quality,
            observations,
            server,
            json,
        } => {
            let form = EntryForm {
                date: None,
                weight: text_field(weight),
                body_fat: text_field(body_fat),
                calories: text_field(calories),
                steps: text_field(steps),
                sleep_total: text_field(sleep),
                sleep_quality,
                observations,
            };
            if let Some(url) = server {
                let client = DashboardClient::new(&url)?;
                cmd_add(&Source::Server(&client), date.as_deref(), form, json).await
            } else {
                let db = open_db()?;
                cmd_add(&Source::Store(&db), date.as_deref(), form, json).await
            }
        }
        Commands::List { days, json } => cmd_list(&open_db()?, days, json),
        Commands::Show { date, json } => cmd_show(&open_db()?, date.as_deref(), json),
        Commands::Stats { window, days, json } => {
            cmd_stats(&open_db()?, window.as_deref(), days.as_deref(), json)
        }
        Commands::Dashboard {
            range,
            window,
            server,
            json,
        } => {
            if let Some(url) = server {
                let client = DashboardClient::new(&url)?;
                cmd_dashboard(&Source::Server(&client), &range, window.as_deref(), json).await
            } else {
                let db = open_db()?;
                cmd_dashboard(&Source::Store(&db), &range, window.as_deref(), json).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_add_with_global_db() {
        let cli = Cli::try_parse_from([
            "physio",
            "add",
            "--date",
            "2026-02-10",
            "--weight",
            "70,5",
            "--sleep",
            "7:30",
            "--db",
            "/tmp/physio-test.db",
        ])
        .unwrap();

        assert_eq!(cli.db, Some(PathBuf::from("/tmp/physio-test.db")));
        let Commands::Add {
            date,
            weight,
            sleep,
            server,
            ..
        } = cli.command
        else {
            panic!("expected add");
        };
        assert_eq!(date.as_deref(), Some("2026-02-10"));
        assert_eq!(weight.as_deref(), Some("70,5"));
        assert_eq!(sleep.as_deref(), Some("7:30"));
        assert!(server.is_none());
    }

    #[test]
    fn dashboard_defaults() {
        let cli = Cli::try_parse_from(["physio", "dashboard"]).unwrap();
        let Commands::Dashboard { range, window, .. } = cli.command else {
            panic!("expected dashboard");
        };
        assert_eq!(range, "90d");
        assert!(window.is_none());
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::try_parse_from(["physio", "serve"]).unwrap();
        let Commands::Serve { port, bind } = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(port, 5000);
        assert_eq!(bind, "127.0.0.1");
    }
}
