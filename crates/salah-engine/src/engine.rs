//! Engine facade wiring the resolver, scheduler and collaborators together.
//!
//! Constructed with injected collaborators (persistent store, notifier,
//! clock) so tests can substitute doubles and hosts can run several
//! independent instances.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::TimingCache;
use crate::client::{TimingClient, ALADHAN_BASE_URL};
use crate::clock::Clock;
use crate::error::EngineError;
use crate::notify::{ArmOutcome, Notifier, ReminderScheduler, DEFAULT_LEAD_MINUTES};
use crate::resolve::Resolver;
use crate::retry::RetryConfig;
use crate::schedule::{self, DEFAULT_WINDOW_BUFFER_MINUTES};
use crate::store::KeyValueStore;
use crate::types::{
    CalculationMethod, CalculationProfile, Coordinates, CurrentWindow, NextEvent,
    ResolutionResult, School, CALCULATION_METHODS,
};

const NOTIFICATIONS_ENABLED_KEY: &str = "prayer_notifications_enabled";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
    pub lead_minutes: u32,
    pub window_buffer_minutes: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: ALADHAN_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            lead_minutes: DEFAULT_LEAD_MINUTES,
            window_buffer_minutes: DEFAULT_WINDOW_BUFFER_MINUTES,
        }
    }
}

pub struct PrayerEngine {
    resolver: Resolver,
    scheduler: ReminderScheduler,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    window_buffer_minutes: u32,
    profile: Mutex<CalculationProfile>,
    /// The authoritative result for "today", owned here; the scheduler only
    /// ever holds fire times derived from it.
    current: Mutex<Option<ResolutionResult>>,
}

impl PrayerEngine {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let cache = TimingCache::new(store.clone(), clock.clone());
        let client = TimingClient::with_timeout(&config.base_url, config.request_timeout)?;
        let resolver = Resolver::new(cache, client, clock.clone(), config.retry);
        let scheduler = ReminderScheduler::new(notifier, clock.clone(), config.lead_minutes);

        Ok(Self {
            resolver,
            scheduler,
            store,
            clock,
            window_buffer_minutes: config.window_buffer_minutes,
            profile: Mutex::new(CalculationProfile::default()),
            current: Mutex::new(None),
        })
    }

    /// Calculation methods offered for user selection.
    pub fn available_methods() -> &'static [CalculationMethod] {
        CALCULATION_METHODS
    }

    pub fn profile(&self) -> CalculationProfile {
        *self.profile.lock()
    }

    /// The last resolved result, if any.
    pub fn current(&self) -> Option<ResolutionResult> {
        self.current.lock().clone()
    }

    /// Resolve today's timings for a coordinate, via cache when possible.
    pub async fn resolve_today(&self, coordinate: Coordinates) -> ResolutionResult {
        self.resolve_with(coordinate, true).await
    }

    /// Force a fresh resolution, bypassing the cache read.
    pub async fn refresh(&self, coordinate: Coordinates) -> ResolutionResult {
        self.resolve_with(coordinate, false).await
    }

    /// Switch the calculation profile. The cached entry under the old
    /// profile key is dropped and the timings re-resolved fresh.
    pub async fn set_profile(
        &self,
        coordinate: Coordinates,
        profile: CalculationProfile,
    ) -> ResolutionResult {
        let previous = {
            let mut current = self.profile.lock();
            std::mem::replace(&mut *current, profile)
        };
        if previous != profile {
            if let Err(e) = self
                .resolver
                .cache()
                .remove(coordinate, self.clock.today(), previous)
            {
                tracing::warn!("Failed to drop superseded cache entry: {}", e);
            }
        }
        self.resolve_with(coordinate, false).await
    }

    pub async fn set_method(&self, coordinate: Coordinates, method: u16) -> ResolutionResult {
        let profile = CalculationProfile {
            method,
            ..self.profile()
        };
        self.set_profile(coordinate, profile).await
    }

    pub async fn set_school(&self, coordinate: Coordinates, school: School) -> ResolutionResult {
        let profile = CalculationProfile {
            school,
            ..self.profile()
        };
        self.set_profile(coordinate, profile).await
    }

    async fn resolve_with(&self, coordinate: Coordinates, use_cache: bool) -> ResolutionResult {
        let profile = self.profile();
        let result = self
            .resolver
            .resolve(coordinate, self.clock.today(), profile, use_cache)
            .await;

        *self.current.lock() = Some(result.clone());
        if self.notifications_enabled() {
            self.scheduler.arm(&result.timings);
        }
        result
    }

    /// Next upcoming prayer relative to the clock, from the current result.
    pub fn next_event(&self) -> Option<NextEvent> {
        let current = self.current.lock();
        current
            .as_ref()
            .map(|r| schedule::next_event(&r.timings, self.clock.time_of_day()))
    }

    /// Prayer whose window is active right now, if any.
    pub fn current_window(&self) -> Option<CurrentWindow> {
        let current = self.current.lock();
        current.as_ref().and_then(|r| {
            schedule::current_window(
                &r.timings,
                self.clock.time_of_day(),
                self.window_buffer_minutes,
            )
        })
    }

    /// Arm reminders for the current timing set. Empty and unavailable when
    /// nothing has been resolved yet.
    pub fn arm_reminders(&self) -> ArmOutcome {
        let timings = { self.current.lock().as_ref().map(|r| r.timings) };
        match timings {
            Some(timings) => self.scheduler.arm(&timings),
            None => ArmOutcome::default(),
        }
    }

    pub fn disarm_reminders(&self) {
        self.scheduler.disarm_all();
    }

    /// The persisted user toggle for prayer notifications.
    pub fn notifications_enabled(&self) -> bool {
        matches!(
            self.store.get(NOTIFICATIONS_ENABLED_KEY),
            Ok(Some(bytes)) if bytes == b"true"
        )
    }

    /// Persist the toggle. Enabling arms the current set immediately;
    /// disabling cancels everything.
    pub fn set_notifications_enabled(&self, enabled: bool) -> Result<ArmOutcome, EngineError> {
        self.store
            .set(
                NOTIFICATIONS_ENABLED_KEY,
                if enabled { b"true" } else { b"false" },
            )
            .map_err(|e| EngineError::Store(e.to_string()))?;

        if enabled {
            Ok(self.arm_reminders())
        } else {
            self.scheduler.disarm_all();
            Ok(ArmOutcome::default())
        }
    }

    /// Re-resolve at every local midnight, fresh, regardless of other
    /// activity. The task stops when the engine is dropped.
    pub fn spawn_midnight_refresh(
        self: &Arc<Self>,
        coordinate: Coordinates,
    ) -> tokio::task::JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let clock = self.clock.clone();
        tokio::spawn(async move {
            loop {
                let now_local = clock.now_local();
                let tomorrow = now_local
                    .date()
                    .succ_opt()
                    .unwrap_or(now_local.date())
                    .and_time(chrono::NaiveTime::MIN);
                let until_midnight = (tomorrow - now_local)
                    .to_std()
                    .unwrap_or(Duration::from_secs(60));
                tokio::time::sleep(until_midnight).await;

                let Some(engine) = weak.upgrade() else { break };
                tracing::info!("Daily rollover: re-resolving timings");
                engine.refresh(coordinate).await;
            }
        })
    }
}
