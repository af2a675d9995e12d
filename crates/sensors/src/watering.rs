//! Manual watering and the "last watered" derivation.

use std::fmt;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;

use crate::error::SensorError;
use crate::history::ReadingHistory;
use crate::light::measure_light_intensity;
use crate::moisture::clamp_moisture;
use crate::pot::{PotId, PotRecord};
use crate::reading::SensorReading;
use crate::round2;
use crate::sync::SensorEngine;
use crate::temperature::TemperatureSource;

/// Moisture points added by one watering.
pub const WATERING_INCREMENT: f64 = 1.0;

impl<H, T> SensorEngine<H, T>
where
    H: ReadingHistory + Sync,
    T: TemperatureSource + Sync,
{
    /// Water `pot` at `now`: the last known moisture plus
    /// [`WATERING_INCREMENT`], recorded as a watering event.
    ///
    /// Requires at least one earlier reading.
    pub async fn water(
        &self,
        pot: &PotRecord,
        now: OffsetDateTime,
        rng: &mut fastrand::Rng,
    ) -> Result<SensorReading, SensorError> {
        let cfg = pot.readiness()?.map_err(|reason| SensorError::PotUnavailable {
            pot_id: pot.id,
            reason: reason.to_string(),
        })?;

        let prior = self
            .history()
            .most_recent(pot.id)
            .await
            .map_err(SensorError::Store)?
            .ok_or(SensorError::NoPriorReading { pot_id: pot.id })?;

        let lux = measure_light_intensity(cfg.light_exposure, now, rng);
        let temperature = self.temperature_now().await?;
        let moisture = round2(clamp_moisture(prior.soil_moisture + WATERING_INCREMENT));

        let reading = SensorReading {
            pot_id: pot.id,
            timestamp: now,
            watering_timestamp: Some(now),
            temperature_celsius: temperature,
            light_intensity_lux: lux,
            soil_moisture: moisture,
            soil_ph: round2(cfg.ph_range.sample(rng)),
        };
        self.history()
            .append(&reading)
            .await
            .map_err(SensorError::Store)?;

        info!(
            pot = pot.id,
            before = prior.soil_moisture,
            after = moisture,
            "pot watered"
        );
        Ok(reading)
    }

    /// How long ago `pot_id` was last watered.
    pub async fn watering_status(
        &self,
        pot_id: PotId,
        now: OffsetDateTime,
    ) -> Result<WateringStatus, SensorError> {
        let last = self.most_recent_watering(pot_id).await?;
        Ok(WateringStatus::from_last(last.as_ref(), now))
    }
}

// ---------------------------------------------------------------------------
// Days since watering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "days", rename_all = "snake_case")]
pub enum WateringStatus {
    Never,
    Today,
    Yesterday,
    DaysAgo(i64),
}

impl WateringStatus {
    /// Whole days between the last watering event and `now`.
    pub fn from_last(last_watering: Option<&SensorReading>, now: OffsetDateTime) -> Self {
        let Some(watered_at) = last_watering.and_then(|r| r.watering_timestamp) else {
            return Self::Never;
        };
        match (now - watered_at).whole_days() {
            d if d <= 0 => Self::Today,
            1 => Self::Yesterday,
            d => Self::DaysAgo(d),
        }
    }
}

impl fmt::Display for WateringStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => write!(f, "no previous watering"),
            Self::Today => write!(f, "today"),
            Self::Yesterday => write!(f, "yesterday"),
            Self::DaysAgo(d) => write!(f, "{d} days ago"),
        }
    }
}
