use thiserror::Error;

use crate::pot::PotId;

/// Failures surfaced by the sensor engine.
///
/// Precondition variants (`PotUnavailable`, `NoPriorReading`) are expected
/// and user facing; the caller shows them as a notification.  Nothing is
/// written to the history when any variant is returned.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("invalid soil pH range '{input}': {reason}")]
    PhRange { input: String, reason: String },

    #[error("pot {pot_id} is unavailable: {reason}")]
    PotUnavailable { pot_id: PotId, reason: String },

    #[error("pot {pot_id} has no sensor reading yet; sync before watering")]
    NoPriorReading { pot_id: PotId },

    #[error("temperature unavailable: {0:#}")]
    TemperatureUnavailable(anyhow::Error),

    #[error("reading store failed: {0:#}")]
    Store(anyhow::Error),
}

impl SensorError {
    /// Configuration errors come from malformed pot data, not the
    /// environment.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::PhRange { .. })
    }

    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::PotUnavailable { .. } | Self::NoPriorReading { .. }
        )
    }
}
