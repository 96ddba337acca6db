//! Resolution orchestrator.
//!
//! Turns (coordinate, date, profile) into a usable timing set through the
//! fallback chain: fresh cache, then the remote service with retries, then a
//! stale cache entry, then the local astronomical approximation. Never
//! returns an error; every failure path terminates in a timing set with the
//! degradation surfaced on the result.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::astro;
use crate::cache::{CacheEntry, TimingCache};
use crate::client::TimingClient;
use crate::clock::Clock;
use crate::error::EngineError;
use crate::retry::RetryConfig;
use crate::types::{
    CalculationProfile, Coordinates, ResolutionResult, TimingSource,
};

/// Explicit states of one resolution request.
enum Step {
    CacheCheck,
    RemoteFetch { attempt: u32 },
    StaleCache { cause: EngineError },
    LocalFallback { cause: EngineError },
}

pub struct Resolver {
    cache: TimingCache,
    client: TimingClient,
    clock: Arc<dyn Clock>,
    retry: RetryConfig,
    /// One in-flight resolution per cache key. A second request for the same
    /// key waits here, then finds the first request's result in the cache.
    inflight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Releases a coalescing slot when its request finishes, including when a
/// caller-side timeout drops the `resolve` future mid-flight.
struct InflightSlot<'a> {
    inflight: &'a Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    key: String,
    guard: Arc<AsyncMutex<()>>,
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        let mut inflight = self.inflight.lock();
        // Two strong references left means the map entry and this slot only.
        if Arc::strong_count(&self.guard) == 2 {
            inflight.remove(&self.key);
        }
    }
}

impl Resolver {
    pub fn new(
        cache: TimingCache,
        client: TimingClient,
        clock: Arc<dyn Clock>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            cache,
            client,
            clock,
            retry,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &TimingCache {
        &self.cache
    }

    /// Resolve a timing set. All failure paths terminate in a usable set;
    /// `degraded` and `error_message` carry the quality signal.
    pub async fn resolve(
        &self,
        coordinate: Coordinates,
        date: NaiveDate,
        profile: CalculationProfile,
        use_cache: bool,
    ) -> ResolutionResult {
        let key = TimingCache::key(coordinate, date, profile);
        let slot = {
            let mut inflight = self.inflight.lock();
            let guard = inflight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone();
            InflightSlot {
                inflight: &self.inflight,
                key,
                guard,
            }
        };
        let _permit = slot.guard.lock().await;

        self.run(coordinate, date, profile, use_cache).await
    }

    async fn run(
        &self,
        coordinate: Coordinates,
        date: NaiveDate,
        profile: CalculationProfile,
        use_cache: bool,
    ) -> ResolutionResult {
        let mut step = Step::CacheCheck;

        loop {
            step = match step {
                Step::CacheCheck => {
                    if use_cache {
                        if let Some(entry) = self.cache.get(coordinate, date, profile) {
                            tracing::debug!(source = ?entry.source, "Cache hit");
                            return self.result_from_entry(&entry, None);
                        }
                    }
                    Step::RemoteFetch { attempt: 1 }
                }

                Step::RemoteFetch { attempt } => {
                    match self.client.fetch(coordinate, date, profile).await {
                        Ok(remote) => {
                            let entry = CacheEntry {
                                timings: remote.timings,
                                hijri_date: remote.hijri_date,
                                source: TimingSource::Remote,
                                degraded: false,
                                produced_at: self.clock.now(),
                                profile,
                                coordinate,
                                date,
                            };
                            self.store(&entry);
                            if attempt > 1 {
                                tracing::info!(attempt, "Remote fetch succeeded after retries");
                            }
                            return self.result_from_entry(&entry, None);
                        }
                        Err(err) => {
                            let stale_available =
                                self.cache.get_any(coordinate, date, profile).is_some();

                            if err.is_connectivity() && stale_available {
                                // Connectivity is the problem: a saved set
                                // now beats more waiting.
                                tracing::info!("Offline; short-circuiting to saved timings");
                                Step::StaleCache { cause: err }
                            } else if attempt < self.retry.max_attempts {
                                let delay = self.retry.delay_after(attempt);
                                tracing::warn!(
                                    attempt,
                                    max = self.retry.max_attempts,
                                    ?delay,
                                    "Remote fetch failed: {}; retrying",
                                    err
                                );
                                tokio::time::sleep(delay).await;
                                Step::RemoteFetch {
                                    attempt: attempt + 1,
                                }
                            } else if stale_available {
                                tracing::warn!("Retries exhausted; using saved timings: {}", err);
                                Step::StaleCache { cause: err }
                            } else {
                                tracing::warn!(
                                    "Retries exhausted with no saved timings: {}",
                                    err
                                );
                                Step::LocalFallback { cause: err }
                            }
                        }
                    }
                }

                Step::StaleCache { cause } => {
                    match self.cache.get_any(coordinate, date, profile) {
                        Some(entry) => {
                            let message = format!("offline: {}", cause.user_message());
                            return self.result_from_entry(&entry, Some(message));
                        }
                        // The entry vanished underneath us; the chain still
                        // has to produce a value.
                        None => Step::LocalFallback { cause },
                    }
                }

                Step::LocalFallback { cause } => {
                    let timings =
                        astro::compute(coordinate.latitude, coordinate.longitude, date);
                    let entry = CacheEntry {
                        timings,
                        hijri_date: None,
                        source: TimingSource::LocalFallback,
                        degraded: true,
                        produced_at: self.clock.now(),
                        profile,
                        coordinate,
                        date,
                    };
                    self.store(&entry);
                    let message = format!("approximate times: {}", cause.user_message());
                    return self.result_from_entry(&entry, Some(message));
                }
            };
        }
    }

    /// Cache writes always happen before the result is handed back; a write
    /// failure degrades to an uncached result rather than a hard error.
    fn store(&self, entry: &CacheEntry) {
        if let Err(e) = self.cache.put(entry) {
            tracing::warn!("Failed to cache timing set: {}", e);
        }
    }

    fn result_from_entry(
        &self,
        entry: &CacheEntry,
        error_message: Option<String>,
    ) -> ResolutionResult {
        ResolutionResult {
            timings: entry.timings,
            hijri_date: entry.hijri_date.clone(),
            source: entry.source,
            degraded: entry.degraded,
            error_message,
            resolved_at: self.clock.now(),
            date: entry.date,
        }
    }
}
