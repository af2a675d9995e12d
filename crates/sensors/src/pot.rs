//! Pot records as the store keeps them, and the typed configuration the
//! models run on.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SensorError;
use crate::light::LightExposure;
use crate::moisture::MoistureProfile;
use crate::ph::PhRange;

pub type PotId = i64;

/// Name fragments marking a pot whose sensor is not producing readings.
const UNAVAILABLE_MARKERS: &[&str] = &["empty", "broken"];

/// A pot row as owned by the store.  Setup fields are free-form labels and
/// may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotRecord {
    pub id: PotId,
    pub name: String,
    pub plant_name: Option<String>,
    pub light_exposure: Option<String>,
    pub moisture_profile: Option<String>,
    /// `"<min> - <max>"`.
    pub soil_ph: Option<String>,
}

/// The setup a pot's readings are simulated from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PotConfiguration {
    pub light_exposure: LightExposure,
    pub moisture_profile: MoistureProfile,
    pub ph_range: PhRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The pot's name carries an "empty" / "broken" marker.
    EmptyOrBroken,
    /// No plant, or a missing setup field.
    Unconfigured,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyOrBroken => write!(f, "pot is empty or broken"),
            Self::Unconfigured => write!(f, "pot has no plant or incomplete setup"),
        }
    }
}

impl PotRecord {
    pub fn is_empty_or_broken(&self) -> bool {
        let name = self.name.to_lowercase();
        UNAVAILABLE_MARKERS.iter().any(|m| name.contains(m))
    }

    /// Convert the stored labels into a typed configuration.
    ///
    /// `Ok(None)` when the pot is unconfigured.  A pH string that does not
    /// parse is an error, not an unconfigured pot.
    pub fn configuration(&self) -> Result<Option<PotConfiguration>, SensorError> {
        fn present(field: &Option<String>) -> Option<&str> {
            field.as_deref().map(str::trim).filter(|s| !s.is_empty())
        }

        if present(&self.plant_name).is_none() {
            return Ok(None);
        }
        let (Some(light), Some(moisture), Some(ph)) = (
            present(&self.light_exposure),
            present(&self.moisture_profile),
            present(&self.soil_ph),
        ) else {
            return Ok(None);
        };

        Ok(Some(PotConfiguration {
            light_exposure: LightExposure::from_str_lossy(light),
            moisture_profile: MoistureProfile::from_str_lossy(moisture),
            ph_range: ph.parse()?,
        }))
    }

    /// The reason this pot cannot produce readings, if any.  Configuration
    /// errors are propagated.
    pub fn readiness(&self) -> Result<Result<PotConfiguration, SkipReason>, SensorError> {
        if self.is_empty_or_broken() {
            return Ok(Err(SkipReason::EmptyOrBroken));
        }
        Ok(self.configuration()?.ok_or(SkipReason::Unconfigured))
    }
}
