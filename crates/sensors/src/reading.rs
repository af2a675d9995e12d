use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::pot::PotId;

/// One snapshot of a pot's simulated sensors.  Never mutated after it is
/// built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub pot_id: PotId,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Set only on readings produced by watering.
    #[serde(with = "time::serde::rfc3339::option")]
    pub watering_timestamp: Option<OffsetDateTime>,
    pub temperature_celsius: f64,
    pub light_intensity_lux: f64,
    pub soil_moisture: f64,
    pub soil_ph: f64,
}

impl SensorReading {
    pub fn is_watering(&self) -> bool {
        self.watering_timestamp.is_some()
    }

    /// Hours from this reading to `now`, fractional.
    pub fn hours_until(&self, now: OffsetDateTime) -> f64 {
        (now - self.timestamp).as_seconds_f64() / 3600.0
    }
}

// ---------------------------------------------------------------------------
// Chart series
// ---------------------------------------------------------------------------

/// A pot's history split into parallel columns, one per plotted quantity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadingSeries {
    /// Unix seconds.
    pub timestamps: Vec<i64>,
    pub temperature_celsius: Vec<f64>,
    pub light_intensity_lux: Vec<f64>,
    pub soil_moisture: Vec<f64>,
    pub soil_ph: Vec<f64>,
}

impl ReadingSeries {
    pub fn from_readings(readings: &[SensorReading]) -> Self {
        let mut s = Self::default();
        for r in readings {
            s.timestamps.push(r.timestamp.unix_timestamp());
            s.temperature_celsius.push(r.temperature_celsius);
            s.light_intensity_lux.push(r.light_intensity_lux);
            s.soil_moisture.push(r.soil_moisture);
            s.soil_ph.push(r.soil_ph);
        }
        s
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}
