use std::future::Future;

use anyhow::Result;

/// Ambient temperature collaborator (degrees Celsius, 2 decimals).
///
/// One blocking lookup per reading; implementations do not cache or retry.
pub trait TemperatureSource {
    fn current_temperature(&self) -> impl Future<Output = Result<f64>> + Send;
}

/// Always reports the same temperature.  For tests and offline runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedTemperature(pub f64);

impl TemperatureSource for FixedTemperature {
    async fn current_temperature(&self) -> Result<f64> {
        Ok(crate::round2(self.0))
    }
}
