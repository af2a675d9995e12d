//! Per-pot reading history: the store seam the engine reads priors from and
//! appends to.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use anyhow::{anyhow, Result};

use crate::pot::PotId;
use crate::reading::SensorReading;

/// Time-ordered, append-only readings keyed by pot.
///
/// Ordering is by `timestamp`, ties broken by insertion order.
/// Implementations must make `append` all-or-nothing.
pub trait ReadingHistory {
    fn append(&self, reading: &SensorReading) -> impl Future<Output = Result<()>> + Send;

    /// The reading with the greatest timestamp.
    fn most_recent(&self, pot_id: PotId)
        -> impl Future<Output = Result<Option<SensorReading>>> + Send;

    /// The reading with the greatest watering timestamp.
    fn most_recent_watering(
        &self,
        pot_id: PotId,
    ) -> impl Future<Output = Result<Option<SensorReading>>> + Send;

    /// Full chronological history; empty for a pot never synced.
    fn series(&self, pot_id: PotId) -> impl Future<Output = Result<Vec<SensorReading>>> + Send;

    /// Remove every reading of a pot.  Only used when the pot is deleted.
    fn delete_all(&self, pot_id: PotId) -> impl Future<Output = Result<u64>> + Send;
}

// ---------------------------------------------------------------------------
// In-process history
// ---------------------------------------------------------------------------

/// History held in memory.  Used by tests and when the engine is embedded
/// without a database.
#[derive(Default)]
pub struct MemoryHistory {
    pots: Mutex<HashMap<PotId, Vec<SensorReading>>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_pots<T>(&self, f: impl FnOnce(&mut HashMap<PotId, Vec<SensorReading>>) -> T) -> Result<T> {
        let mut pots = self
            .pots
            .lock()
            .map_err(|_| anyhow!("memory history lock poisoned"))?;
        Ok(f(&mut pots))
    }

    /// Total readings across all pots.
    pub fn len(&self) -> usize {
        self.with_pots(|p| p.values().map(Vec::len).sum())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReadingHistory for MemoryHistory {
    async fn append(&self, reading: &SensorReading) -> Result<()> {
        self.with_pots(|pots| {
            let rows = pots.entry(reading.pot_id).or_default();
            let at = rows.partition_point(|r| r.timestamp <= reading.timestamp);
            rows.insert(at, reading.clone());
        })
    }

    async fn most_recent(&self, pot_id: PotId) -> Result<Option<SensorReading>> {
        self.with_pots(|pots| pots.get(&pot_id).and_then(|rows| rows.last().cloned()))
    }

    async fn most_recent_watering(&self, pot_id: PotId) -> Result<Option<SensorReading>> {
        self.with_pots(|pots| {
            pots.get(&pot_id).and_then(|rows| {
                rows.iter()
                    .filter(|r| r.watering_timestamp.is_some())
                    .max_by_key(|r| r.watering_timestamp)
                    .cloned()
            })
        })
    }

    async fn series(&self, pot_id: PotId) -> Result<Vec<SensorReading>> {
        self.with_pots(|pots| pots.get(&pot_id).cloned().unwrap_or_default())
    }

    async fn delete_all(&self, pot_id: PotId) -> Result<u64> {
        self.with_pots(|pots| pots.remove(&pot_id).map_or(0, |rows| rows.len() as u64))
    }
}
