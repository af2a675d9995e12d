//! Simulated light sensor.
//!
//! Lux is drawn from a range picked by the pot's exposure category and the
//! wall-clock band of the sample time:
//!
//! ```text
//! 00:00 ── night ── 06:00 ─ twilight ─ 09:00 ─── day ─── 17:00 ─ twilight ─ 19:00 ── night ── 24:00
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

// ---------------------------------------------------------------------------
// Exposure category
// ---------------------------------------------------------------------------

/// How much light a pot is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightExposure {
    Shade,
    IndirectSunlight,
    StrongLight,
    FullSun,
    /// Label the store holds but the model does not know.  Reads as no
    /// light source.
    Unrecognized,
}

impl LightExposure {
    /// Every known category, weakest first.
    pub const ALL: [LightExposure; 4] = [
        Self::Shade,
        Self::IndirectSunlight,
        Self::StrongLight,
        Self::FullSun,
    ];

    /// Parse a stored label ("Shade", "Indirect sunlight", "Strong light",
    /// "Full sun").  Case and surrounding whitespace are ignored.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "shade" => Self::Shade,
            "indirect sunlight" | "bright indirect sunlight" => Self::IndirectSunlight,
            "strong light" => Self::StrongLight,
            "full sun" => Self::FullSun,
            _ => Self::Unrecognized,
        }
    }
}

impl fmt::Display for LightExposure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shade => write!(f, "Shade"),
            Self::IndirectSunlight => write!(f, "Indirect sunlight"),
            Self::StrongLight => write!(f, "Strong light"),
            Self::FullSun => write!(f, "Full sun"),
            Self::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

// ---------------------------------------------------------------------------
// Time bands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayBand {
    Night,
    /// `[06:00, 09:00)`
    Dawn,
    /// `[09:00, 17:00)`
    Day,
    /// `[17:00, 19:00)`, lit like dawn.
    Dusk,
}

impl DayBand {
    pub const ALL: [DayBand; 4] = [Self::Night, Self::Dawn, Self::Day, Self::Dusk];

    pub fn at(now: OffsetDateTime) -> Self {
        match now.hour() {
            6..=8 => Self::Dawn,
            9..=16 => Self::Day,
            17..=18 => Self::Dusk,
            _ => Self::Night,
        }
    }
}

/// `[low, high)` lux range for a category in a band.  `None` for
/// [`LightExposure::Unrecognized`].
pub fn lux_bounds(exposure: LightExposure, band: DayBand) -> Option<(f64, f64)> {
    use DayBand::*;
    use LightExposure::*;

    let bounds = match (exposure, band) {
        (Shade, Night) => (10.0, 40.0),
        (Shade, Dawn | Dusk) => (100.0, 400.0),
        (Shade, Day) => (400.0, 1000.0),

        (IndirectSunlight, Night) => (20.0, 60.0),
        (IndirectSunlight, Dawn | Dusk) => (400.0, 1000.0),
        (IndirectSunlight, Day) => (1000.0, 2000.0),

        (StrongLight, Night) => (30.0, 80.0),
        (StrongLight, Dawn | Dusk) => (600.0, 2000.0),
        (StrongLight, Day) => (2000.0, 5000.0),

        (FullSun, Night) => (40.0, 100.0),
        (FullSun, Dawn | Dusk) => (800.0, 5000.0),
        (FullSun, Day) => (5000.0, 10000.0),

        (Unrecognized, _) => return None,
    };
    Some(bounds)
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// Sample the light intensity (lux, 2 decimals) a pot sees at `now`.
///
/// Sampling happens on the hundredths grid so the rounded value never lands
/// on the exclusive upper bound.
pub fn measure_light_intensity(
    exposure: LightExposure,
    now: OffsetDateTime,
    rng: &mut fastrand::Rng,
) -> f64 {
    let Some((low, high)) = lux_bounds(exposure, DayBand::at(now)) else {
        return 0.0;
    };
    let lo = (low * 100.0).round() as u64;
    let hi = (high * 100.0).round() as u64;
    rng.u64(lo..hi) as f64 / 100.0
}
