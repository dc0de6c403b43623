use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::debug;

use crate::model::{DATE_FORMAT, DailySummary};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS weather_summary (
    date TEXT,
    city TEXT,
    avg_temp REAL,
    max_temp REAL,
    min_temp REAL,
    dominant_condition TEXT
)";

/// Append-only table of daily summaries.
///
/// Rows carry no identity: repeated rollups on the same date add more rows
/// for that (date, city) pair.
#[derive(Debug, Clone)]
pub struct SummaryStore {
    pool: SqlitePool,
}

impl SummaryStore {
    /// Open (creating if absent) the database file and its table.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        Self::with_pool(pool).await
    }

    /// Private in-memory database, mainly for tests.
    pub async fn in_memory() -> Result<Self> {
        // Every connection to `:memory:` is its own database, so keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .context("Failed to create weather_summary table")?;

        Ok(Self { pool })
    }

    /// Insert one row; committed on return.
    pub async fn append(&self, summary: &DailySummary) -> Result<()> {
        sqlx::query(
            "INSERT INTO weather_summary (date, city, avg_temp, max_temp, min_temp, dominant_condition)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(summary.date.format(DATE_FORMAT).to_string())
        .bind(&summary.city)
        .bind(summary.avg_temp)
        .bind(summary.max_temp)
        .bind(summary.min_temp)
        .bind(&summary.dominant_condition)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to store daily summary for {}", summary.city))?;

        debug!(city = %summary.city, date = %summary.date, "Stored daily summary");
        Ok(())
    }

    /// All rows for `city` in insertion order.
    pub async fn query(&self, city: &str) -> Result<Vec<DailySummary>> {
        let rows = sqlx::query(
            "SELECT date, city, avg_temp, max_temp, min_temp, dominant_condition
             FROM weather_summary WHERE city = ? ORDER BY rowid",
        )
        .bind(city)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to query summaries for {city}"))?;

        rows.iter().map(row_to_summary).collect()
    }

    /// Delete every row in the table.
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM weather_summary")
            .execute(&self.pool)
            .await
            .context("Failed to clear weather_summary")?;

        Ok(result.rows_affected())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_summary(row: &SqliteRow) -> Result<DailySummary> {
    let date: String = row.try_get("date")?;
    let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
        .with_context(|| format!("Invalid date in weather_summary: {date}"))?;

    Ok(DailySummary {
        date,
        city: row.try_get("city")?,
        avg_temp: row.try_get("avg_temp")?,
        max_temp: row.try_get("max_temp")?,
        min_temp: row.try_get("min_temp")?,
        dominant_condition: row.try_get("dominant_condition")?,
    })
}
