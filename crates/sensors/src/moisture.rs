//! Soil moisture decay model.
//!
//! Moisture is a 1..=10 scale.  Each reading after the first is derived from
//! the profile's seed value minus an evaporation term driven by heat, light
//! and the hours since the previous reading.  The model is deterministic; the
//! randomness of a reading comes from the light sample fed into it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::round2;

/// Driest value the sensor reports.
pub const MOISTURE_MIN: f64 = 1.0;
/// Saturated soil.
pub const MOISTURE_MAX: f64 = 10.0;

const TEMPERATURE_WEIGHT: f64 = 0.6;
const LIGHT_WEIGHT: f64 = 0.4;
/// Baseline loss per hour independent of the environment.
const HOURLY_DECAY: f64 = 0.01;

/// How wet a plant likes its soil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoistureProfile {
    Dry,
    Normal,
    Wet,
    /// Label the store holds but the model does not know.  Seeds like `Wet`.
    Unrecognized,
}

impl MoistureProfile {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "dry" => Self::Dry,
            "normal" => Self::Normal,
            "wet" => Self::Wet,
            _ => Self::Unrecognized,
        }
    }
}

impl fmt::Display for MoistureProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dry => write!(f, "Dry"),
            Self::Normal => write!(f, "Normal"),
            Self::Wet => write!(f, "Wet"),
            Self::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

/// Moisture reported by a pot's very first reading.
pub fn initial_soil_moisture(profile: MoistureProfile) -> f64 {
    match profile {
        MoistureProfile::Wet => 10.0,
        MoistureProfile::Normal => 7.0,
        MoistureProfile::Dry => 3.0,
        MoistureProfile::Unrecognized => 10.0,
    }
}

/// Decayed moisture for a reading taken `elapsed_hours` after the previous
/// one.
///
/// Result is clamped to [`MOISTURE_MIN`]..=[`MOISTURE_MAX`] and rounded to 2
/// decimals.  Negative elapsed time is treated as zero.
pub fn measure_soil_moisture(
    profile: MoistureProfile,
    temperature_celsius: f64,
    light_intensity_lux: f64,
    elapsed_hours: f64,
) -> f64 {
    let temperature_coefficient = temperature_celsius / 100.0;
    let light_coefficient = light_intensity_lux / 10_000.0;

    let decrease = temperature_coefficient * TEMPERATURE_WEIGHT
        + light_coefficient * LIGHT_WEIGHT
        + HOURLY_DECAY * elapsed_hours.max(0.0);

    let moisture = initial_soil_moisture(profile) - decrease;
    round2(clamp_moisture(moisture))
}

pub fn clamp_moisture(value: f64) -> f64 {
    value.clamp(MOISTURE_MIN, MOISTURE_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILES: [MoistureProfile; 4] = [
        MoistureProfile::Dry,
        MoistureProfile::Normal,
        MoistureProfile::Wet,
        MoistureProfile::Unrecognized,
    ];

    #[test]
    fn initial_values_per_profile() {
        assert_eq!(initial_soil_moisture(MoistureProfile::Wet), 10.0);
        assert_eq!(initial_soil_moisture(MoistureProfile::Normal), 7.0);
        assert_eq!(initial_soil_moisture(MoistureProfile::Dry), 3.0);
        assert_eq!(
            initial_soil_moisture(MoistureProfile::from_str_lossy("swampy")),
            10.0
        );
    }

    #[test]
    fn known_decay_value() {
        // 7 - (0.2*0.6 + 0.15*0.4 + 0.24) = 7 - 0.42
        let m = measure_soil_moisture(MoistureProfile::Normal, 20.0, 1500.0, 24.0);
        assert_eq!(m, 6.58);
    }

    #[test]
    fn non_increasing_in_elapsed_hours() {
        for p in PROFILES {
            let mut prev = f64::INFINITY;
            for h in (0..2000).step_by(7) {
                let m = measure_soil_moisture(p, 22.0, 800.0, h as f64);
                assert!(m <= prev, "{p}: {m} > {prev} at {h}h");
                prev = m;
            }
        }
    }

    #[test]
    fn non_increasing_in_temperature() {
        let mut prev = f64::INFINITY;
        for t in -20..60 {
            let m = measure_soil_moisture(MoistureProfile::Normal, t as f64, 800.0, 12.0);
            assert!(m <= prev, "{m} > {prev} at {t}C");
            prev = m;
        }
    }

    #[test]
    fn non_increasing_in_light() {
        let mut prev = f64::INFINITY;
        for lux in (0..10_000).step_by(250) {
            let m = measure_soil_moisture(MoistureProfile::Wet, 18.0, lux as f64, 3.0);
            assert!(m <= prev, "{m} > {prev} at {lux} lux");
            prev = m;
        }
    }

    #[test]
    fn always_within_scale() {
        let temps = [-40.0, 0.0, 25.0, 45.0, 500.0];
        let luxes = [0.0, 99.0, 9999.0, 1.0e6];
        let hours = [0.0, 1.0, 100.0, 1.0e5];
        for p in PROFILES {
            for &t in &temps {
                for &l in &luxes {
                    for &h in &hours {
                        let m = measure_soil_moisture(p, t, l, h);
                        assert!(
                            (MOISTURE_MIN..=MOISTURE_MAX).contains(&m),
                            "{p} t={t} lux={l} h={h} -> {m}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn long_drought_bottoms_out() {
        let m = measure_soil_moisture(MoistureProfile::Dry, 30.0, 9000.0, 24.0 * 60.0);
        assert_eq!(m, MOISTURE_MIN);
    }

    #[test]
    fn negative_elapsed_is_zero() {
        let a = measure_soil_moisture(MoistureProfile::Normal, 20.0, 500.0, -5.0);
        let b = measure_soil_moisture(MoistureProfile::Normal, 20.0, 500.0, 0.0);
        assert_eq!(a, b);
    }

    #[test]
    fn profile_from_str_lossy() {
        assert_eq!(MoistureProfile::from_str_lossy("Dry"), MoistureProfile::Dry);
        assert_eq!(MoistureProfile::from_str_lossy(" normal "), MoistureProfile::Normal);
        assert_eq!(MoistureProfile::from_str_lossy("WET"), MoistureProfile::Wet);
        assert_eq!(MoistureProfile::from_str_lossy(""), MoistureProfile::Unrecognized);
    }
}
