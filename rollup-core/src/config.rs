use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
pub const DEFAULT_THRESHOLD_C: f64 = 35.0;
pub const DEFAULT_CITIES: &[&str] = &["Delhi", "Mumbai", "Chennai", "Bangalore", "Kolkata", "Hyderabad"];

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// cities = ["Delhi", "Mumbai"]
/// threshold_c = 35.0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    pub cities: Vec<String>,
    /// Alert when the latest temperature is strictly above this value.
    pub threshold_c: f64,
    pub database_path: Option<PathBuf>,
    pub plot_dir: Option<PathBuf>,
    /// Periodic fetch job; absent means only the upfront fetch runs.
    pub fetch_every_secs: Option<u64>,
    /// Periodic rollup job; absent means no rollup during a run.
    pub rollup_every_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            cities: DEFAULT_CITIES.iter().map(|c| c.to_string()).collect(),
            threshold_c: DEFAULT_THRESHOLD_C,
            database_path: None,
            plot_dir: None,
            fetch_every_secs: None,
            rollup_every_secs: None,
        }
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            anyhow!(
                "No API key configured.\n\
                 Hint: run `weather-rollup configure` and enter your OpenWeather API key."
            )
        })
    }

    /// SQLite file holding the summary table.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join("weather_data.db")),
        }
    }

    /// Directory charts are rendered into.
    pub fn plot_dir(&self) -> Result<PathBuf> {
        match &self.plot_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join("plots")),
        }
    }

    pub fn fetch_every(&self) -> Option<Duration> {
        self.fetch_every_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }

    pub fn rollup_every(&self) -> Option<Duration> {
        self.rollup_every_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "weather-rollup", "weather-rollup")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}
