//! Core library for the `weather-rollup` monitor.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather fetcher behind a provider trait
//! - Per-city accumulation, daily rollups and threshold alerts
//! - SQLite persistence of summaries and their charts
//! - The time-boxed driver that ties it together
//!
//! It is used by `rollup-cli`, but can also be reused by other binaries or services.

pub mod accumulator;
pub mod clock;
pub mod config;
pub mod driver;
pub mod model;
pub mod monitor;
pub mod plot;
pub mod provider;
pub mod rollup;
pub mod scheduler;
pub mod store;

pub use accumulator::Accumulator;
pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use driver::{CitySnapshot, Driver, RunReport, RunSettings, RunState};
pub use model::{DailySummary, Observation};
pub use monitor::{ThresholdAlert, check_thresholds};
pub use plot::{ChartRenderer, PlotOutcome, PngRenderer, no_records_notice, plot_daily_summary};
pub use provider::{FetchError, WeatherProvider, provider_from_config};
pub use store::SummaryStore;
