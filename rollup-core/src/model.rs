use chrono::{DateTime, NaiveDate, Utc};

/// Format used for observation timestamps, always in UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format used for the `date` column of stored summaries.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One parsed weather reading for a city.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub city: String,
    /// Provider category label, e.g. "Clear" or "Rain".
    pub condition: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u8,
    pub wind_speed_mps: f64,
    pub observed_at: DateTime<Utc>,
}

impl Observation {
    /// `YYYY-MM-DD HH:MM:SS` in UTC.
    pub fn timestamp(&self) -> String {
        self.observed_at.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Reduction of a city's accumulated observations, stored as one row.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub city: String,
    pub avg_temp: f64,
    pub max_temp: f64,
    pub min_temp: f64,
    pub dominant_condition: String,
}
