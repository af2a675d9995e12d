//! Taking readings: one pot on demand, or every pot in a batch.
//!
//! A reading is assembled completely (light, temperature, prior lookup,
//! moisture, pH) before the single `append`, so a failure at any step leaves
//! the history untouched.

use time::OffsetDateTime;
use tracing::{info, warn};

use crate::error::SensorError;
use crate::history::ReadingHistory;
use crate::light::measure_light_intensity;
use crate::moisture::{initial_soil_moisture, measure_soil_moisture};
use crate::pot::{PotConfiguration, PotId, PotRecord, SkipReason};
use crate::reading::{ReadingSeries, SensorReading};
use crate::round2;
use crate::temperature::TemperatureSource;

/// The sensor engine: models plus the two collaborators they need.
pub struct SensorEngine<H, T> {
    history: H,
    temperature: T,
}

/// Result of a single-pot sync.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Recorded(SensorReading),
    /// Nothing was measured or written.
    Skipped(SkipReason),
}

#[derive(Debug)]
pub struct FailedPot {
    pub pot_id: PotId,
    pub error: SensorError,
}

/// What a batch sync did to each pot.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub recorded: Vec<SensorReading>,
    pub skipped: Vec<(PotId, SkipReason)>,
    pub failed: Vec<FailedPot>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl<H, T> SensorEngine<H, T>
where
    H: ReadingHistory + Sync,
    T: TemperatureSource + Sync,
{
    pub fn new(history: H, temperature: T) -> Self {
        Self {
            history,
            temperature,
        }
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    /// Take one reading for `pot` at `now` and append it.
    pub async fn sync_one(
        &self,
        pot: &PotRecord,
        now: OffsetDateTime,
        rng: &mut fastrand::Rng,
    ) -> Result<SyncOutcome, SensorError> {
        let cfg = match pot.readiness()? {
            Ok(cfg) => cfg,
            Err(reason) => {
                info!(pot = pot.id, name = %pot.name, %reason, "sync skipped");
                return Ok(SyncOutcome::Skipped(reason));
            }
        };

        let reading = self.measure(pot.id, &cfg, now, rng).await?;
        self.history
            .append(&reading)
            .await
            .map_err(SensorError::Store)?;

        info!(
            pot = pot.id,
            moisture = reading.soil_moisture,
            lux = reading.light_intensity_lux,
            ph = reading.soil_ph,
            temperature = reading.temperature_celsius,
            "sensor reading recorded"
        );
        Ok(SyncOutcome::Recorded(reading))
    }

    /// Sync every pot in turn.  One pot failing never stops the rest.
    pub async fn sync_all(
        &self,
        pots: &[PotRecord],
        now: OffsetDateTime,
        rng: &mut fastrand::Rng,
    ) -> SyncReport {
        let mut report = SyncReport::default();

        for pot in pots {
            match self.sync_one(pot, now, rng).await {
                Ok(SyncOutcome::Recorded(r)) => report.recorded.push(r),
                Ok(SyncOutcome::Skipped(reason)) => report.skipped.push((pot.id, reason)),
                Err(error) => {
                    warn!(pot = pot.id, name = %pot.name, "sync failed: {error}");
                    report.failed.push(FailedPot {
                        pot_id: pot.id,
                        error,
                    });
                }
            }
        }

        info!(
            recorded = report.recorded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "sync of all pots finished"
        );
        report
    }

    /// Full chronological history of a pot.
    pub async fn series(&self, pot_id: PotId) -> Result<Vec<SensorReading>, SensorError> {
        self.history.series(pot_id).await.map_err(SensorError::Store)
    }

    /// History split into chart columns.
    pub async fn series_columns(&self, pot_id: PotId) -> Result<ReadingSeries, SensorError> {
        Ok(ReadingSeries::from_readings(&self.series(pot_id).await?))
    }

    pub async fn most_recent_watering(
        &self,
        pot_id: PotId,
    ) -> Result<Option<SensorReading>, SensorError> {
        self.history
            .most_recent_watering(pot_id)
            .await
            .map_err(SensorError::Store)
    }

    /// Build a non-watering reading from fresh samples.
    async fn measure(
        &self,
        pot_id: PotId,
        cfg: &PotConfiguration,
        now: OffsetDateTime,
        rng: &mut fastrand::Rng,
    ) -> Result<SensorReading, SensorError> {
        let lux = measure_light_intensity(cfg.light_exposure, now, rng);
        let temperature = self.temperature_now().await?;

        let prior = self
            .history
            .most_recent(pot_id)
            .await
            .map_err(SensorError::Store)?;

        let moisture = match &prior {
            Some(prior) => measure_soil_moisture(
                cfg.moisture_profile,
                temperature,
                lux,
                prior.hours_until(now),
            ),
            None => initial_soil_moisture(cfg.moisture_profile),
        };

        Ok(SensorReading {
            pot_id,
            timestamp: now,
            watering_timestamp: None,
            temperature_celsius: temperature,
            light_intensity_lux: lux,
            soil_moisture: moisture,
            soil_ph: round2(cfg.ph_range.sample(rng)),
        })
    }

    pub(crate) async fn temperature_now(&self) -> Result<f64, SensorError> {
        self.temperature
            .current_temperature()
            .await
            .map(round2)
            .map_err(SensorError::TemperatureUnavailable)
    }
}
