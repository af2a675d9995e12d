//! Simulated environmental sensors for potted plants.
//!
//! Light, soil moisture and soil pH are synthesized from each pot's setup;
//! temperature comes from an external [`TemperatureSource`].  Readings are
//! kept per pot in a [`ReadingHistory`], which also drives the "last
//! watered" status and chart series.
//!
//! Every sampling function takes the generator and the current time as
//! arguments, so a seeded [`fastrand::Rng`] and a fixed `now` give
//! reproducible readings.

pub mod error;
pub mod history;
pub mod light;
pub mod moisture;
pub mod ph;
pub mod pot;
pub mod reading;
pub mod sync;
pub mod temperature;
pub mod watering;

pub use error::SensorError;
pub use history::{MemoryHistory, ReadingHistory};
pub use light::{measure_light_intensity, LightExposure};
pub use moisture::{initial_soil_moisture, measure_soil_moisture, MoistureProfile};
pub use ph::{measure_soil_ph, PhRange};
pub use pot::{PotConfiguration, PotId, PotRecord, SkipReason};
pub use reading::{ReadingSeries, SensorReading};
pub use sync::{FailedPot, SensorEngine, SyncOutcome, SyncReport};
pub use temperature::{FixedTemperature, TemperatureSource};
pub use watering::{WateringStatus, WATERING_INCREMENT};

/// Round to 2 decimals, the precision every reading is reported at.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
