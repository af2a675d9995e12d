//! Ambient temperature from the OpenWeather current-weather API.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use plantcare_sensors::{round2, TemperatureSource};
use serde::Deserialize;

use crate::config::WeatherEntry;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    main: MainBlock,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
}

/// One uncached, unretried lookup per call.
#[derive(Clone)]
pub struct OpenWeather {
    client: reqwest::Client,
    base_url: String,
    city: String,
    api_key: Option<String>,
}

impl OpenWeather {
    pub fn new(entry: &WeatherEntry, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build weather http client")?;
        Ok(Self {
            client,
            base_url: entry.base_url.clone(),
            city: entry.city.clone(),
            api_key: api_key.or_else(|| entry.api_key.clone()),
        })
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    async fn fetch(&self) -> Result<f64> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("no OpenWeather API key configured"))?;

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("q", self.city.as_str()), ("units", "metric"), ("appid", api_key)])
            .send()
            .await
            .with_context(|| format!("weather request for '{}' failed", self.city))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("weather service returned {status} for '{}'", self.city);
        }

        let body: WeatherResponse = resp
            .json()
            .await
            .context("weather response is not the expected JSON")?;
        Ok(round2(body.main.temp))
    }
}

impl TemperatureSource for OpenWeather {
    async fn current_temperature(&self) -> Result<f64> {
        let t = self.fetch().await;
        match &t {
            Ok(celsius) => tracing::debug!(city = %self.city, celsius, "temperature lookup"),
            Err(e) => tracing::warn!(city = %self.city, "temperature lookup failed: {e:#}"),
        }
        t
    }
}

/// Weather lookup that is not configured at all.
pub struct NoWeather;

impl TemperatureSource for NoWeather {
    async fn current_temperature(&self) -> Result<f64> {
        bail!("no [weather] section in config")
    }
}

/// Either the real service or the unconfigured stand-in.
pub enum Weather {
    OpenWeather(OpenWeather),
    Unconfigured(NoWeather),
    #[cfg(test)]
    Fixed(plantcare_sensors::FixedTemperature),
}

impl TemperatureSource for Weather {
    async fn current_temperature(&self) -> Result<f64> {
        match self {
            Self::OpenWeather(w) => w.current_temperature().await,
            Self::Unconfigured(w) => w.current_temperature().await,
            #[cfg(test)]
            Self::Fixed(w) => w.current_temperature().await,
        }
    }
}
