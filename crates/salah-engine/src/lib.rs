//! Prayer timing resolution and notification engine.
//!
//! Turns a geographic coordinate into a reliable set of daily prayer times,
//! keeps them fresh and available offline, computes "what's next", and arms
//! timely reminders, tolerating an unreliable upstream calculation service
//! through a cache -> remote -> local-approximation fallback chain.

pub mod astro;
pub mod cache;
pub mod client;
pub mod clock;
pub mod engine;
pub mod error;
pub mod notify;
pub mod resolve;
pub mod retry;
pub mod schedule;
pub mod store;
pub mod types;

pub use cache::{CacheEntry, TimingCache, CACHE_TTL_HOURS};
pub use client::{RemoteTimings, TimingClient, ALADHAN_BASE_URL};
pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{EngineConfig, PrayerEngine};
pub use error::EngineError;
pub use notify::{ArmOutcome, Notifier, ReminderScheduler, ScheduledReminder};
pub use resolve::Resolver;
pub use retry::RetryConfig;
pub use schedule::{current_window, next_event, DEFAULT_WINDOW_BUFFER_MINUTES};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use types::{
    CalculationMethod, CalculationProfile, Coordinates, CurrentWindow, NextEvent, PrayerEvent,
    ResolutionResult, School, TimingSet, TimingSource, CALCULATION_METHODS,
};

/// Initialize tracing for hosts that do not configure their own subscriber.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("salah-engine initialized");
}
