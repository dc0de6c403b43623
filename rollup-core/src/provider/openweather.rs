use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde::de::Error as _;
use tracing::{debug, warn};

use super::{FetchError, WeatherProvider};
use crate::model::Observation;

/// OpenWeather reports temperatures in Kelvin unless asked otherwise.
const KELVIN_OFFSET: f64 = 273.15;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    base_url: String,
    api_key: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url,
            api_key,
            http: Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn fetch(&self, city: &str) -> Result<Option<Observation>, FetchError> {
        let transport = |source| FetchError::Transport {
            city: city.to_string(),
            source,
        };

        let res = self
            .http
            .get(&self.base_url)
            .query(&[("q", city), ("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(transport)?;

        let status = res.status();
        let body = res.text().await.map_err(transport)?;

        if !status.is_success() {
            warn!(
                city,
                status = status.as_u16(),
                body = %truncate_body(&body),
                "Failed to retrieve data"
            );
            return Ok(None);
        }

        let observation = parse_current(city, &body).map_err(|source| FetchError::Parse {
            city: city.to_string(),
            source,
        })?;
        debug!(city, temperature_c = observation.temperature_c, "Fetched observation");

        Ok(Some(observation))
    }
}

fn parse_current(city: &str, body: &str) -> Result<Observation, serde_json::Error> {
    let parsed: OwCurrentResponse = serde_json::from_str(body)?;

    let condition = parsed
        .weather
        .into_iter()
        .next()
        .map(|w| w.main)
        .ok_or_else(|| serde_json::Error::custom("`weather` array is empty"))?;

    let observed_at = unix_to_utc(parsed.dt)
        .ok_or_else(|| serde_json::Error::custom(format!("`dt` out of range: {}", parsed.dt)))?;

    Ok(Observation {
        city: city.to_string(),
        condition,
        temperature_c: kelvin_to_celsius(parsed.main.temp),
        feels_like_c: kelvin_to_celsius(parsed.main.feels_like),
        humidity_pct: parsed.main.humidity,
        wind_speed_mps: parsed.wind.speed,
        observed_at,
    })
}

fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> &str {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
