use crate::{Config, Observation, provider::openweather::OpenWeatherProvider};
use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;

pub mod openweather;

/// Failure to obtain an observation other than a non-success HTTP status.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, body read).
    #[error("request for '{city}' failed")]
    Transport {
        city: String,
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered 200 but the body did not have the expected shape.
    #[error("unexpected response body for '{city}'")]
    Parse {
        city: String,
        #[source]
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Fetch the current observation for `city`.
    ///
    /// `Ok(None)` means the provider rejected the request; the status has
    /// already been logged and the city should be skipped for this cycle.
    async fn fetch(&self, city: &str) -> Result<Option<Observation>, FetchError>;
}

/// Construct the OpenWeather provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let api_key = config.require_api_key()?;

    Ok(Box::new(OpenWeatherProvider::new(
        config.base_url.clone(),
        api_key.to_owned(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = provider_from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
    }

    #[test]
    fn provider_from_config_works_when_key_is_set() {
        let mut cfg = Config::default();
        cfg.set_api_key("KEY".to_string());

        assert!(provider_from_config(&cfg).is_ok());
    }
}
