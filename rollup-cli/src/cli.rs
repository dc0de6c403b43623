use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password, PasswordDisplayMode, Text};
use rollup_core::{
    Config, Driver, PngRenderer, RunSettings, SummaryStore, SystemClock,
    no_records_notice, plot_daily_summary, provider_from_config,
};
use std::sync::Arc;
use tracing::info;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-rollup", version, about = "Weather polling and daily rollups")]
pub struct Cli {
    /// Log at debug level.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch all cities, watch for the run window, then report and plot.
    Run,

    /// Configure the API key and city list.
    Configure,

    /// Render the stored temperature summary for a city.
    Plot {
        /// City name as used when fetching.
        city: String,
    },

    /// Print stored summaries for a city.
    History {
        /// City name as used when fetching.
        city: String,
    },

    /// Delete every stored summary.
    Clear {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = Config::load()?;

        match self.command {
            Command::Run => run(&config).await,
            Command::Configure => configure(config),
            Command::Plot { city } => plot(&config, &city).await,
            Command::History { city } => history(&config, &city).await,
            Command::Clear { yes } => clear(&config, yes).await,
        }
    }
}

async fn open_store(config: &Config) -> Result<SummaryStore> {
    let path = config.database_path()?;
    info!(path = %path.display(), "Opening summary database");
    SummaryStore::open(&path).await
}

async fn run(config: &Config) -> Result<()> {
    let provider = provider_from_config(config)?;
    let store = open_store(config).await?;
    let renderer = PngRenderer::new(config.plot_dir()?);

    let mut driver = Driver::new(
        provider,
        store.clone(),
        Box::new(renderer),
        Arc::new(SystemClock),
        RunSettings::from_config(config),
    );
    let report = driver.run().await;
    store.close().await;

    report?;
    Ok(())
}

fn configure(mut config: Config) -> Result<()> {
    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.set_api_key(api_key.trim().to_string());

    let cities = Text::new("Cities (comma separated):")
        .with_default(&config.cities.join(", "))
        .prompt()
        .context("Failed to read city list")?;
    let cities: Vec<String> = cities
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    if !cities.is_empty() {
        config.cities = cities;
    }

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn plot(config: &Config, city: &str) -> Result<()> {
    let store = open_store(config).await?;
    let renderer = PngRenderer::new(config.plot_dir()?);

    let outcome = plot_daily_summary(&store, &renderer, city).await;
    store.close().await;
    println!("{}", outcome?);
    Ok(())
}

async fn history(config: &Config, city: &str) -> Result<()> {
    let store = open_store(config).await?;
    let rows = store.query(city).await?;
    store.close().await;

    if rows.is_empty() {
        println!("{}", no_records_notice(city));
        return Ok(());
    }

    println!(
        "{:<12} {:>9} {:>9} {:>9}  Condition",
        "Date", "Avg °C", "Max °C", "Min °C"
    );
    for row in rows {
        println!(
            "{:<12} {:>9.2} {:>9.2} {:>9.2}  {}",
            row.date.to_string(),
            row.avg_temp, row.max_temp, row.min_temp, row.dominant_condition
        );
    }
    Ok(())
}

async fn clear(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        let confirmed = Confirm::new("Delete every stored daily summary?")
            .with_default(false)
            .prompt()
            .context("Failed to read confirmation")?;
        if !confirmed {
            println!("Nothing deleted.");
            return Ok(());
        }
    }

    let store = open_store(config).await?;
    let deleted = store.clear().await?;
    store.close().await;

    println!("Deleted {deleted} stored summaries.");
    Ok(())
}
