use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_FILTER: &str = "physio=info,physio_core=info,tower_http=info";
const DEBUG_LOG_FILTER: &str = "physio=debug,physio_core=debug,tower_http=debug";

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub debug: bool,
}

impl Config {
    /// Resolve paths from the environment (after `.env` has been loaded).
    ///
    /// `--db` beats `PHYSIO_DATABASE_URL`, which beats `PHYSIO_DATA_DIR`, which
    /// beats the platform data directory.
    pub fn load(db_override: Option<PathBuf>) -> Result<Self> {
        Self::resolve(|key| std::env::var(key).ok(), db_override, || {
            let proj_dirs =
                ProjectDirs::from("", "", "physio").context("Could not determine home directory")?;
            Ok(proj_dirs.data_dir().to_path_buf())
        })
    }

    fn resolve(
        var: impl Fn(&str) -> Option<String>,
        db_override: Option<PathBuf>,
        default_data_dir: impl FnOnce() -> Result<PathBuf>,
    ) -> Result<Self> {
        let data_dir = match non_empty(var("PHYSIO_DATA_DIR")) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        let db_path = db_override
            .or_else(|| non_empty(var("PHYSIO_DATABASE_URL")).map(|url| database_path(&url)))
            .unwrap_or_else(|| data_dir.join("physio.db"));

        let db_dir = db_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(db_dir)
            .with_context(|| format!("Failed to create data directory: {}", db_dir.display()))?;

        let debug = non_empty(var("PHYSIO_DEBUG")).is_some_and(|v| is_truthy(&v));

        Ok(Config {
            db_path,
            data_dir,
            debug,
        })
    }

    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            DEBUG_LOG_FILTER
        } else {
            DEFAULT_LOG_FILTER
        }
    }
}

/// `sqlite:///relative.db` and `sqlite:////abs/path.db` both map to a file
/// path; anything without the scheme is taken as a path as is.
fn database_path(url: &str) -> PathBuf {
    PathBuf::from(url.strip_prefix("sqlite:///").unwrap_or(url))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
