use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Errors surfaced by the store, the aggregator and the importer.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input: dates, window specs, numeric fields.
    #[error("{0}")]
    Validation(String),

    /// An entry for this date already exists.
    #[error("An entry for {0} already exists")]
    Conflict(NaiveDate),

    /// The requested entry or window holds no data.
    #[error("{0}")]
    NotFound(String),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
