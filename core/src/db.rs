use std::path::Path;

use chrono::{Local, NaiveDate};
use rusqlite::{Connection, ErrorCode, params};

use crate::error::{Error, Result};
use crate::models::{HealthEntry, NewHealthEntry};

const ENTRY_COLUMNS: &str = "id, date, weight, body_fat, calories, steps, sleep_total, \
                             sleep_quality, observations, created_at";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.migrate()?;
        tracing::debug!(path = %path.display(), "opened entry store");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS health_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    date TEXT NOT NULL UNIQUE,
                    weight REAL,
                    body_fat REAL,
                    calories INTEGER,
                    steps INTEGER,
                    sleep_total REAL,
                    sleep_quality TEXT,
                    observations TEXT,
                    created_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<HealthEntry> {
        let date_str: String = row.get(1)?;
        let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(HealthEntry {
            id: row.get(0)?,
            date,
            weight: row.get(2)?,
            body_fat: row.get(3)?,
            calories: row.get(4)?,
            steps: row.get(5)?,
            sleep_total: row.get(6)?,
            sleep_quality: row.get(7)?,
            observations: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    // --- Health entries ---

    /// Insert a new entry. The `UNIQUE(date)` constraint decides conflicts, so
    /// two racing inserts for one date yield exactly one success.
    pub fn create_entry(&self, entry: &NewHealthEntry) -> Result<HealthEntry> {
        let date = entry.validate()?;
        let now = Local::now().to_rfc3339();
        let date_str = date.format("%Y-%m-%d").to_string();

        let inserted = self.conn.execute(
            "INSERT INTO health_entries (date, weight, body_fat, calories, steps, sleep_total, sleep_quality, observations, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                date_str,
                entry.weight,
                entry.body_fat,
                entry.calories,
                entry.steps,
                entry.sleep_total,
                entry.sleep_quality,
                entry.observations,
                now,
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(Error::Conflict(date));
            }
            Err(e) => return Err(e.into()),
        }

        let id = self.conn.last_insert_rowid();
        tracing::debug!(id, %date, "created health entry");
        self.get_entry_by_id(id)
    }

    pub fn get_entry_by_id(&self, id: i64) -> Result<HealthEntry> {
        self.conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM health_entries WHERE id = ?1"),
                params![id],
                Self::entry_from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    Error::NotFound(format!("Entry {id} not found"))
                }
                other => other.into(),
            })
    }

    pub fn get_entry(&self, date: NaiveDate) -> Result<Option<HealthEntry>> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM health_entries WHERE date = ?1"
        ))?;
        let mut rows = stmt.query(params![date_str])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::entry_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// All entries in storage order. Callers sort as they need.
    pub fn list_entries(&self) -> Result<Vec<HealthEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {ENTRY_COLUMNS} FROM health_entries"))?;
        let entries = stmt
            .query_map([], Self::entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn count_entries(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM health_entries", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
