//! Offline cache for resolved timing sets.
//!
//! Entries live in an injected [`KeyValueStore`] under a composite key of
//! rounded coordinate, calendar date, method and school. A profile or date
//! change therefore produces a different key; stale entries are simply never
//! matched again and need no eviction sweep for correctness.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::store::KeyValueStore;
use crate::types::{CalculationProfile, Coordinates, TimingSet, TimingSource};

/// Validity window before a cached entry is treated as stale.
pub const CACHE_TTL_HOURS: i64 = 6;

const KEY_PREFIX: &str = "prayer_times";

/// A previously resolved timing set. Superseded, never mutated, when the
/// profile, date or coordinate changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub timings: TimingSet,
    pub hijri_date: Option<String>,
    pub source: TimingSource,
    pub degraded: bool,
    pub produced_at: DateTime<Utc>,
    pub profile: CalculationProfile,
    pub coordinate: Coordinates,
    pub date: NaiveDate,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.produced_at < Duration::hours(CACHE_TTL_HOURS)
    }
}

/// Cache logic over the injected persistent store. Cheap to clone; clones
/// share the same store.
#[derive(Clone)]
pub struct TimingCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl TimingCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Composite cache key.
    pub fn key(coordinate: Coordinates, date: NaiveDate, profile: CalculationProfile) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            KEY_PREFIX,
            coordinate.cache_token(),
            date.format("%d-%m-%Y"),
            profile.method,
            profile.school.as_u8(),
        )
    }

    /// Look up a fresh entry. Stale or unreadable entries report a miss.
    pub fn get(
        &self,
        coordinate: Coordinates,
        date: NaiveDate,
        profile: CalculationProfile,
    ) -> Option<CacheEntry> {
        let entry = self.get_any(coordinate, date, profile)?;
        if entry.is_fresh(self.clock.now()) {
            Some(entry)
        } else {
            tracing::debug!(
                produced_at = %entry.produced_at,
                "Cached timings past validity window"
            );
            None
        }
    }

    /// Look up an entry regardless of age. Used as the last resort when the
    /// remote service is unreachable: stale-but-real data beats waiting.
    pub fn get_any(
        &self,
        coordinate: Coordinates,
        date: NaiveDate,
        profile: CalculationProfile,
    ) -> Option<CacheEntry> {
        let key = Self::key(coordinate, date, profile);
        let bytes = match self.store.get(&key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Invalid cached timings under {}: {}", key, e);
                None
            }
        }
    }

    /// Persist an entry under its composite key.
    pub fn put(&self, entry: &CacheEntry) -> Result<(), crate::error::EngineError> {
        let key = Self::key(entry.coordinate, entry.date, entry.profile);
        let bytes = serde_json::to_vec(entry)
            .map_err(|e| crate::error::EngineError::Store(e.to_string()))?;
        self.store
            .set(&key, &bytes)
            .map_err(|e| crate::error::EngineError::Store(e.to_string()))?;
        tracing::debug!(%key, source = ?entry.source, "Cached timing set");
        Ok(())
    }

    /// Drop the entry for a key, if present.
    pub fn remove(
        &self,
        coordinate: Coordinates,
        date: NaiveDate,
        profile: CalculationProfile,
    ) -> Result<(), crate::error::EngineError> {
        let key = Self::key(coordinate, date, profile);
        self.store
            .remove(&key)
            .map_err(|e| crate::error::EngineError::Store(e.to_string()))
    }
}
