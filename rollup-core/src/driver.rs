//! Bounded ingestion run: upfront fetch, timed polling window, final report.

use anyhow::Result;
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use crate::{
    Config,
    accumulator::Accumulator,
    clock::Clock,
    model::{DailySummary, Observation},
    monitor::{ThresholdAlert, check_thresholds},
    plot::{ChartRenderer, PlotOutcome, plot_daily_summary},
    provider::{FetchError, WeatherProvider},
    rollup::roll_up,
    scheduler::{Scheduler, Task},
    store::SummaryStore,
};

/// Length of one ingestion run.
pub const RUN_WINDOW: Duration = Duration::from_secs(300);

/// Pause between scheduler checks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub cities: Vec<String>,
    pub threshold_c: f64,
    pub window: Duration,
    pub poll: Duration,
    pub fetch_every: Option<Duration>,
    pub rollup_every: Option<Duration>,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cities: config.cities.clone(),
            threshold_c: config.threshold_c,
            window: RUN_WINDOW,
            poll: POLL_INTERVAL,
            fetch_every: config.fetch_every(),
            rollup_every: config.rollup_every(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Starting,
    Running,
    Finalizing,
    Done,
}

/// Final line printed for each configured city.
#[derive(Debug, Clone, PartialEq)]
pub enum CitySnapshot {
    Latest(Observation),
    NoData(String),
}

impl fmt::Display for CitySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CitySnapshot::Latest(obs) => write!(
                f,
                "City: {}, Latest Temperature: {:.2}°C, Condition: {}, Feels Like: {:.2}°C, \
                 Humidity: {}%, Wind Speed: {} m/s, Timestamp: {}",
                obs.city,
                obs.temperature_c,
                obs.condition,
                obs.feels_like_c,
                obs.humidity_pct,
                obs.wind_speed_mps,
                obs.timestamp(),
            ),
            CitySnapshot::NoData(city) => write!(f, "No data available for {city}."),
        }
    }
}

/// What happened during a run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub fetch_cycles: usize,
    pub alerts: Vec<ThresholdAlert>,
    pub summaries: Vec<DailySummary>,
    pub snapshot: Vec<CitySnapshot>,
    pub plots: Vec<PlotOutcome>,
}

/// Owns the accumulator and drives one run through its states.
#[derive(Debug)]
pub struct Driver {
    provider: Box<dyn WeatherProvider>,
    store: SummaryStore,
    renderer: Box<dyn ChartRenderer>,
    clock: Arc<dyn Clock>,
    settings: RunSettings,
    accumulator: Accumulator,
    state: RunState,
}

impl Driver {
    pub fn new(
        provider: Box<dyn WeatherProvider>,
        store: SummaryStore,
        renderer: Box<dyn ChartRenderer>,
        clock: Arc<dyn Clock>,
        settings: RunSettings,
    ) -> Self {
        Self {
            provider,
            store,
            renderer,
            clock,
            settings,
            accumulator: Accumulator::new(),
            state: RunState::Starting,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    /// Fetch every configured city once, then check thresholds.
    ///
    /// Rejected requests and unreachable hosts skip the city for this cycle;
    /// a response that cannot be parsed aborts.
    pub async fn fetch_cycle(&mut self) -> Result<Vec<ThresholdAlert>> {
        for city in &self.settings.cities {
            match self.provider.fetch(city).await {
                Ok(Some(observation)) => self.accumulator.record(observation),
                Ok(None) => {}
                Err(FetchError::Transport { city, source }) => {
                    warn!(%city, error = %source, "Request failed, skipping city this cycle");
                }
                Err(err @ FetchError::Parse { .. }) => return Err(err.into()),
            }
        }

        let alerts = check_thresholds(&self.accumulator, self.settings.threshold_c);
        for alert in &alerts {
            println!("{alert}");
        }
        Ok(alerts)
    }

    /// Summarize and persist everything accumulated so far.
    pub async fn roll_up(&mut self) -> Result<Vec<DailySummary>> {
        roll_up(&mut self.accumulator, &self.store, self.clock.today()).await
    }

    pub fn snapshot(&self) -> Vec<CitySnapshot> {
        self.settings
            .cities
            .iter()
            .map(|city| match self.accumulator.latest(city) {
                Some(obs) => CitySnapshot::Latest(obs.clone()),
                None => CitySnapshot::NoData(city.clone()),
            })
            .collect()
    }

    /// Run until the window elapses.
    pub async fn run(&mut self) -> Result<RunReport> {
        let mut report = RunReport::default();
        let mut scheduler = Scheduler::new();
        let mut started_at = self.clock.now();

        loop {
            match self.state {
                RunState::Starting => {
                    println!(
                        "Starting to fetch live weather data for {} seconds...",
                        self.settings.window.as_secs()
                    );
                    report.alerts.extend(self.fetch_cycle().await?);
                    report.fetch_cycles += 1;

                    started_at = self.clock.now();
                    if let Some(every) = self.settings.fetch_every {
                        scheduler.every(every, Task::Fetch, started_at);
                    }
                    if let Some(every) = self.settings.rollup_every {
                        scheduler.every(every, Task::Rollup, started_at);
                    }
                    self.state = RunState::Running;
                }
                RunState::Running => {
                    for task in scheduler.run_pending(self.clock.now()) {
                        match task {
                            Task::Fetch => {
                                report.alerts.extend(self.fetch_cycle().await?);
                                report.fetch_cycles += 1;
                            }
                            Task::Rollup => report.summaries.extend(self.roll_up().await?),
                        }
                    }

                    self.clock.sleep(self.settings.poll).await;

                    let elapsed = (self.clock.now() - started_at).to_std().unwrap_or_default();
                    if elapsed >= self.settings.window {
                        debug!(elapsed_secs = elapsed.as_secs(), "Run window elapsed");
                        self.state = RunState::Finalizing;
                    }
                }
                RunState::Finalizing => {
                    println!("\nLive Weather Data:");
                    for snapshot in self.snapshot() {
                        println!("{snapshot}");
                        if let CitySnapshot::Latest(obs) = &snapshot {
                            let outcome =
                                plot_daily_summary(&self.store, self.renderer.as_ref(), &obs.city)
                                    .await?;
                            println!("{outcome}");
                            report.plots.push(outcome);
                        }
                        report.snapshot.push(snapshot);
                    }
                    println!("Finished running scheduled tasks.");
                    self.state = RunState::Done;
                }
                RunState::Done => break,
            }
        }

        info!(
            fetch_cycles = report.fetch_cycles,
            alerts = report.alerts.len(),
            summaries = report.summaries.len(),
            "Run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{accumulator::tests::obs, clock::tests::ManualClock};
    use async_trait::async_trait;
    use std::{collections::HashMap, path::PathBuf, sync::Mutex};

    /// Serves queued temperatures per city; an exhausted queue rejects.
    #[derive(Debug, Default)]
    struct ScriptedProvider {
        temps: Mutex<HashMap<String, Vec<f64>>>,
        garbled: Option<String>,
        unreachable: Option<String>,
    }

    impl ScriptedProvider {
        fn with(mut self, city: &str, temps: &[f64]) -> Self {
            self.temps.get_mut().unwrap().insert(city.into(), temps.to_vec());
            self
        }
    }

    #[async_trait]
    impl WeatherProvider for ScriptedProvider {
        async fn fetch(&self, city: &str) -> Result<Option<Observation>, FetchError> {
            if self.garbled.as_deref() == Some(city) {
                let source = serde_json::from_str::<u8>("not json").unwrap_err();
                return Err(FetchError::Parse { city: city.into(), source });
            }
            if self.unreachable.as_deref() == Some(city) {
                let source = reqwest::Client::new()
                    .get("http://127.0.0.1:1/")
                    .send()
                    .await
                    .unwrap_err();
                return Err(FetchError::Transport { city: city.into(), source });
            }
            let mut temps = self.temps.lock().unwrap();
            let queue = temps.entry(city.to_string()).or_default();
            if queue.is_empty() {
                return Ok(None);
            }
            Ok(Some(obs(city, queue.remove(0), "Clear")))
        }
    }

    #[derive(Debug, Default)]
    struct NullRenderer;

    impl ChartRenderer for NullRenderer {
        fn render(&self, city: &str, _rows: &[DailySummary]) -> Result<PathBuf> {
            Ok(PathBuf::from(format!("{city}.png")))
        }
    }

    fn settings(cities: &[&str]) -> RunSettings {
        RunSettings {
            cities: cities.iter().map(|c| c.to_string()).collect(),
            threshold_c: 35.0,
            window: Duration::from_secs(10),
            poll: Duration::from_secs(1),
            fetch_every: None,
            rollup_every: None,
        }
    }

    async fn driver(provider: ScriptedProvider, settings: RunSettings) -> (Driver, SummaryStore) {
        let store = SummaryStore::in_memory().await.unwrap();
        let driver = Driver::new(
            Box::new(provider),
            store.clone(),
            Box::new(NullRenderer),
            Arc::new(ManualClock::new()),
            settings,
        );
        (driver, store)
    }

    #[tokio::test]
    async fn default_run_fetches_once_then_idles() {
        let provider = ScriptedProvider::default()
            .with("Delhi", &[30.0, 40.0])
            .with("Mumbai", &[28.0]);
        let (mut driver, store) = driver(provider, settings(&["Delhi", "Mumbai", "Pune"])).await;

        let report = driver.run().await.unwrap();

        assert_eq!(driver.state(), RunState::Done);
        assert_eq!(report.fetch_cycles, 1);
        assert_eq!(driver.accumulator().len("Delhi"), 1);
        assert!(report.summaries.is_empty());
        assert!(store.query("Delhi").await.unwrap().is_empty());
        assert_eq!(report.snapshot.len(), 3);
        assert_eq!(report.snapshot[2], CitySnapshot::NoData("Pune".into()));
        assert_eq!(
            report.plots,
            vec![
                PlotOutcome::NoRecords { city: "Delhi".into() },
                PlotOutcome::NoRecords { city: "Mumbai".into() },
            ]
        );
    }

    #[tokio::test]
    async fn scheduled_jobs_fetch_and_roll_up() {
        let provider = ScriptedProvider::default().with("Delhi", &[30.0, 40.0]);
        let mut settings = settings(&["Delhi"]);
        settings.fetch_every = Some(Duration::from_secs(3));
        settings.rollup_every = Some(Duration::from_secs(5));
        let (mut driver, store) = driver(provider, settings).await;

        let report = driver.run().await.unwrap();

        assert_eq!(report.summaries.len(), 1);
        let rows = store.query("Delhi").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].avg_temp, 35.0);
        assert_eq!(rows[0].max_temp, 40.0);
        assert_eq!(rows[0].min_temp, 30.0);
        // Later fetches were rejected, so the drained city has nothing to show.
        assert_eq!(report.snapshot, vec![CitySnapshot::NoData("Delhi".into())]);
        assert!(report.plots.is_empty());
        assert_eq!(report.fetch_cycles, 4);
    }

    #[tokio::test]
    async fn alert_raised_for_hot_latest_reading() {
        let provider = ScriptedProvider::default()
            .with("Mumbai", &[36.0])
            .with("Chennai", &[34.0]);
        let (mut driver, _store) = driver(provider, settings(&["Mumbai", "Chennai"])).await;

        let alerts = driver.fetch_cycle().await.unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].city, "Mumbai");
    }

    #[tokio::test]
    async fn rejected_city_does_not_block_others() {
        let provider = ScriptedProvider::default().with("Mumbai", &[29.0]);
        let (mut driver, _store) = driver(provider, settings(&["Delhi", "Mumbai"])).await;

        driver.fetch_cycle().await.unwrap();

        assert_eq!(driver.accumulator().len("Delhi"), 0);
        assert_eq!(driver.accumulator().len("Mumbai"), 1);
    }

    #[tokio::test]
    async fn server_error_for_one_city_does_not_block_others() {
        use crate::provider::openweather::OpenWeatherProvider;
        use wiremock::matchers::{method, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "Delhi"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("q", "Mumbai"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "weather": [{ "main": "Clouds" }],
                "main": { "temp": 309.15, "feels_like": 312.0, "humidity": 70 },
                "wind": { "speed": 4.1 },
                "dt": 1_729_407_600
            })))
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::new(server.uri(), "KEY".into());
        let mut driver = Driver::new(
            Box::new(provider),
            SummaryStore::in_memory().await.unwrap(),
            Box::new(NullRenderer),
            Arc::new(ManualClock::new()),
            settings(&["Delhi", "Mumbai"]),
        );

        let alerts = driver.fetch_cycle().await.unwrap();

        assert_eq!(driver.accumulator().len("Delhi"), 0);
        assert_eq!(driver.accumulator().len("Mumbai"), 1);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].city, "Mumbai");
    }

    #[tokio::test]
    async fn unreachable_city_is_skipped_and_cycle_completes() {
        let provider = ScriptedProvider {
            unreachable: Some("Delhi".into()),
            ..ScriptedProvider::default()
        }
        .with("Mumbai", &[36.5]);
        let (mut driver, _store) = driver(provider, settings(&["Delhi", "Mumbai"])).await;

        let alerts = driver.fetch_cycle().await.unwrap();

        assert_eq!(driver.accumulator().len("Delhi"), 0);
        assert_eq!(driver.accumulator().len("Mumbai"), 1);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].city, "Mumbai");
    }

    #[tokio::test]
    async fn unreachable_city_does_not_abort_run() {
        let provider = ScriptedProvider {
            unreachable: Some("Delhi".into()),
            ..ScriptedProvider::default()
        }
        .with("Mumbai", &[29.0]);
        let (mut driver, _store) = driver(provider, settings(&["Delhi", "Mumbai"])).await;

        let report = driver.run().await.unwrap();

        assert_eq!(driver.state(), RunState::Done);
        assert_eq!(report.snapshot[0], CitySnapshot::NoData("Delhi".into()));
        assert!(matches!(report.snapshot[1], CitySnapshot::Latest(ref o) if o.city == "Mumbai"));
    }

    #[tokio::test]
    async fn parse_failure_aborts_run() {
        let provider = ScriptedProvider {
            garbled: Some("Delhi".into()),
            ..ScriptedProvider::default()
        };
        let (mut driver, _store) = driver(provider, settings(&["Delhi"])).await;

        let err = driver.run().await.unwrap_err();

        assert!(err.to_string().contains("unexpected response body for 'Delhi'"));
        assert_eq!(driver.state(), RunState::Starting);
    }

    #[tokio::test]
    async fn stored_rows_are_plotted_at_finalize() {
        let provider = ScriptedProvider::default().with("Kolkata", &[31.0, 33.0]);
        let (mut driver, store) = driver(provider, settings(&["Kolkata"])).await;

        driver.fetch_cycle().await.unwrap();
        driver.roll_up().await.unwrap();
        driver.fetch_cycle().await.unwrap();
        let report = driver.run().await.unwrap();

        assert_eq!(store.query("Kolkata").await.unwrap().len(), 1);
        assert_eq!(
            report.plots,
            vec![PlotOutcome::Rendered {
                city: "Kolkata".into(),
                path: PathBuf::from("Kolkata.png"),
            }]
        );
    }

    #[test]
    fn snapshot_line_format() {
        let line = CitySnapshot::Latest(obs("Delhi", 30.456, "Haze")).to_string();

        assert_eq!(
            line,
            "City: Delhi, Latest Temperature: 30.46°C, Condition: Haze, Feels Like: 30.46°C, \
             Humidity: 50%, Wind Speed: 1 m/s, Timestamp: 2024-10-20 12:00:00"
        );
        assert_eq!(
            CitySnapshot::NoData("Pune".into()).to_string(),
            "No data available for Pune."
        );
    }
}
