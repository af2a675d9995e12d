//! Soil pH sampling from a configured range.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SensorError;
use crate::round2;

const GRID_EPSILON: f64 = 1e-6;

/// Acceptable pH band for a plant, as configured on its pot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhRange {
    pub min: f64,
    pub max: f64,
}

impl PhRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Uniform sample between the two bounds, inclusive, rounded to 2
    /// decimals.  Bounds given in the wrong order are sampled between
    /// anyway.
    pub fn sample(&self, rng: &mut fastrand::Rng) -> f64 {
        let (low, high) = if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };

        // Hundredths grid, shrunk inward so the rounded sample stays
        // inside the bounds.  The epsilon absorbs representation error
        // (6.02 * 100 is 601.999...).
        let lo = (low * 100.0 - GRID_EPSILON).ceil() as i64;
        let hi = (high * 100.0 + GRID_EPSILON).floor() as i64;
        if lo > hi {
            return low;
        }
        rng.i64(lo..=hi) as f64 / 100.0
    }

    pub fn contains(&self, value: f64) -> bool {
        let (low, high) = if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };
        (low..=high).contains(&value)
    }
}

impl FromStr for PhRange {
    type Err = SensorError;

    /// Parse the stored `"<min> - <max>"` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason: &str| SensorError::PhRange {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 2 {
            return Err(err("expected exactly one '-' between min and max"));
        }

        let parse_bound = |raw: &str, which: &str| -> Result<f64, SensorError> {
            let raw = raw.trim();
            let v: f64 = raw
                .parse()
                .map_err(|_| err(&format!("{which} '{raw}' is not a number")))?;
            if !v.is_finite() {
                return Err(err(&format!("{which} '{raw}' is not finite")));
            }
            Ok(v)
        };

        let min = parse_bound(parts[0], "min")?;
        let max = parse_bound(parts[1], "max")?;
        Ok(Self { min, max })
    }
}

impl fmt::Display for PhRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.min, self.max)
    }
}

/// Parse a stored range string and sample it.
pub fn measure_soil_ph(range: &str, rng: &mut fastrand::Rng) -> Result<f64, SensorError> {
    let range: PhRange = range.parse()?;
    Ok(round2(range.sample(rng)))
}
