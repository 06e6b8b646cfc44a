pub mod csv_import;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod models;
pub mod moving_average;
pub mod stats;

pub use error::{Error, Result};
