//! TOML config file loading, validation, and database seeding for pots and
//! the weather lookup.

use anyhow::{bail, Context, Result};
use plantcare_sensors::{PhRange, PotRecord};
use serde::Deserialize;
use std::collections::HashSet;

use crate::db::Db;

/// Default OpenWeather current-weather endpoint.
pub const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub weather: Option<WeatherEntry>,
    #[serde(default)]
    pub pots: Vec<PotEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherEntry {
    pub city: String,
    /// Overridden by `OPENWEATHER_API_KEY` when that is set.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_weather_url")]
    pub base_url: String,
}

fn default_weather_url() -> String {
    DEFAULT_WEATHER_URL.to_string()
}

#[derive(Debug, Deserialize)]
pub struct PotEntry {
    pub pot_id: i64,
    pub name: String,
    #[serde(default)]
    pub plant_name: Option<String>,
    #[serde(default)]
    pub light_exposure: Option<String>,
    #[serde(default)]
    pub moisture_profile: Option<String>,
    #[serde(default)]
    pub soil_ph: Option<String>,
}

impl PotEntry {
    fn to_record(&self) -> PotRecord {
        PotRecord {
            id: self.pot_id,
            name: self.name.clone(),
            plant_name: self.plant_name.clone(),
            light_exposure: self.light_exposure.clone(),
            moisture_profile: self.moisture_profile.clone(),
            soil_ph: self.soil_ph.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all config entries. Returns `Ok(())` or an error describing
    /// every violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_weather(&mut errors);
        self.validate_pots(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_weather(&self, errors: &mut Vec<String>) {
        let Some(w) = &self.weather else {
            return;
        };
        if w.city.trim().is_empty() {
            errors.push("weather: city is empty".to_string());
        }
        if !w.base_url.starts_with("http://") && !w.base_url.starts_with("https://") {
            errors.push(format!(
                "weather: base_url '{}' must start with http:// or https://",
                w.base_url
            ));
        }
    }

    fn validate_pots(&self, errors: &mut Vec<String>) {
        let mut seen_ids: HashSet<i64> = HashSet::new();

        for (i, p) in self.pots.iter().enumerate() {
            let ctx = || {
                if p.name.trim().is_empty() {
                    format!("pots[{i}]")
                } else {
                    format!("pot '{}'", p.name)
                }
            };

            // ── Identity ────────────────────────────────────────
            if p.pot_id <= 0 {
                errors.push(format!(
                    "{}: pot_id must be positive, got {}",
                    ctx(),
                    p.pot_id
                ));
            } else if !seen_ids.insert(p.pot_id) {
                errors.push(format!("{}: duplicate pot_id {}", ctx(), p.pot_id));
            }

            if p.name.trim().is_empty() {
                errors.push(format!("{}: name is empty", ctx()));
            }

            // ── Setup ───────────────────────────────────────────
            if let Some(ph) = &p.soil_ph {
                if let Err(e) = ph.parse::<PhRange>() {
                    errors.push(format!("{}: {e}", ctx()));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Load + apply
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file.
pub fn load(path: &str) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    let config: Config =
        toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?;
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

/// Upsert all pots from the config into the database.
pub async fn apply(config: &Config, db: &Db) -> Result<()> {
    for p in &config.pots {
        db.upsert_pot(&p.to_record())
            .await
            .with_context(|| format!("failed to upsert pot '{}'", p.name))?;
    }

    tracing::info!(pots = config.pots.len(), "config applied");

    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
