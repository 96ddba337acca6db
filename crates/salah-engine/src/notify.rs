//! Reminder scheduling against the device notifier collaborator.
//!
//! The scheduler owns a table of (event -> timer handles). Every new timing
//! set cancels the whole table and rebuilds it, so stale timers for a
//! superseded set can never fire against updated data.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::clock::Clock;
use crate::types::{PrayerEvent, TimingSet};

/// Opaque one-shot timer handle issued by the notifier.
pub type NotifyHandle = u64;

/// Default pre-warning lead.
pub const DEFAULT_LEAD_MINUTES: u32 = 15;

/// Device notification collaborator. Scheduling is fire-and-forget; the
/// engine never tracks delivery.
pub trait Notifier: Send + Sync {
    /// Whether the user has granted notification permission. Prompting the
    /// user is the collaborator's concern.
    fn request_permission(&self) -> bool;

    /// Arm a one-shot notification at an absolute instant.
    fn schedule_one_shot(&self, fire_at: DateTime<Utc>, title: &str, body: &str) -> NotifyHandle;

    /// Cancel a previously scheduled notification.
    fn cancel(&self, handle: NotifyHandle);
}

/// One armed reminder, as reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledReminder {
    pub event: PrayerEvent,
    pub fire_at: DateTime<Utc>,
    /// Minutes before the prayer instant; 0 for the exact-time reminder.
    pub lead_minutes: u32,
}

/// Result of an arm pass.
#[derive(Debug, Clone, Default)]
pub struct ArmOutcome {
    pub reminders: Vec<ScheduledReminder>,
    /// False when permission is not granted; not an error, just a state the
    /// caller surfaces.
    pub available: bool,
}

pub struct ReminderScheduler {
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    lead_minutes: u32,
    armed: Mutex<HashMap<PrayerEvent, Vec<NotifyHandle>>>,
}

impl ReminderScheduler {
    pub fn new(notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>, lead_minutes: u32) -> Self {
        Self {
            notifier,
            clock,
            lead_minutes,
            armed: Mutex::new(HashMap::new()),
        }
    }

    /// Cancel everything, then schedule a lead warning and an exact-time
    /// reminder for each prayer still ahead of "now". Instants already in
    /// the past are skipped, never backfilled.
    pub fn arm(&self, timings: &TimingSet) -> ArmOutcome {
        self.disarm_all();

        if !self.notifier.request_permission() {
            tracing::info!("Notification permission not granted; reminders unavailable");
            return ArmOutcome {
                reminders: Vec::new(),
                available: false,
            };
        }

        let now = self.clock.now();
        let now_local = self.clock.now_local();
        let mut reminders = Vec::new();
        let mut armed = self.armed.lock();

        for (event, time) in timings.prayer_times() {
            // Local wall-clock instant mapped onto the absolute timeline.
            let event_at = now + (now_local.date().and_time(time) - now_local);
            let warn_at = event_at - Duration::minutes(i64::from(self.lead_minutes));
            let mut handles = Vec::new();

            if warn_at > now {
                let handle = self.notifier.schedule_one_shot(
                    warn_at,
                    &format!("{} Prayer Alert", event),
                    &format!(
                        "{} prayer time is in {} minutes ({}).",
                        event,
                        self.lead_minutes,
                        time.format("%H:%M")
                    ),
                );
                handles.push(handle);
                reminders.push(ScheduledReminder {
                    event,
                    fire_at: warn_at,
                    lead_minutes: self.lead_minutes,
                });
            }

            if event_at > now {
                let handle = self.notifier.schedule_one_shot(
                    event_at,
                    &format!("{} Prayer Time", event),
                    &format!("It's time for {} prayer.", event),
                );
                handles.push(handle);
                reminders.push(ScheduledReminder {
                    event,
                    fire_at: event_at,
                    lead_minutes: 0,
                });
            }

            if !handles.is_empty() {
                armed.insert(event, handles);
            }
        }

        tracing::debug!(count = reminders.len(), "Armed prayer reminders");
        ArmOutcome {
            reminders,
            available: true,
        }
    }

    /// Cancel the reminders for a single event.
    pub fn disarm(&self, event: PrayerEvent) {
        if let Some(handles) = self.armed.lock().remove(&event) {
            for handle in handles {
                self.notifier.cancel(handle);
            }
        }
    }

    /// Cancel every armed reminder. The underlying timers are cancelled, not
    /// merely forgotten.
    pub fn disarm_all(&self) {
        let drained: Vec<NotifyHandle> = self
            .armed
            .lock()
            .drain()
            .flat_map(|(_, handles)| handles)
            .collect();
        for handle in drained {
            self.notifier.cancel(handle);
        }
    }

    /// Number of events with live reminders.
    pub fn armed_count(&self) -> usize {
        self.armed.lock().len()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{NaiveDateTime, NaiveTime};

    #[derive(Default)]
    struct MockNotifier {
        granted: std::sync::atomic::AtomicBool,
        state: Mutex<MockState>,
    }

    #[derive(Default)]
    struct MockState {
        next_handle: NotifyHandle,
        pending: HashMap<NotifyHandle, (DateTime<Utc>, String)>,
        cancelled: Vec<NotifyHandle>,
    }

    impl MockNotifier {
        fn granted() -> Self {
            let mock = Self::default();
            mock.granted
                .store(true, std::sync::atomic::Ordering::SeqCst);
            mock
        }

        fn pending_titles(&self) -> Vec<String> {
            let state = self.state.lock();
            let mut titles: Vec<String> =
                state.pending.values().map(|(_, t)| t.clone()).collect();
            titles.sort();
            titles
        }
    }

    impl Notifier for MockNotifier {
        fn request_permission(&self) -> bool {
            self.granted.load(std::sync::atomic::Ordering::SeqCst)
        }

        fn schedule_one_shot(
            &self,
            fire_at: DateTime<Utc>,
            title: &str,
            _body: &str,
        ) -> NotifyHandle {
            let mut state = self.state.lock();
            state.next_handle += 1;
            let handle = state.next_handle;
            state.pending.insert(handle, (fire_at, title.to_string()));
            handle
        }

        fn cancel(&self, handle: NotifyHandle) {
            let mut state = self.state.lock();
            state.pending.remove(&handle);
            state.cancelled.push(handle);
        }
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn sample() -> TimingSet {
        TimingSet {
            fajr: hm(5, 30),
            sunrise: hm(7, 0),
            dhuhr: hm(12, 15),
            asr: hm(15, 45),
            sunset: hm(18, 15),
            maghrib: hm(18, 20),
            isha: hm(19, 45),
            midnight: hm(0, 20),
        }
    }

    fn clock_at(h: u32, m: u32) -> Arc<FixedClock> {
        let base = NaiveDateTime::parse_from_str("2024-06-21 00:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .date()
            .and_time(hm(h, m));
        Arc::new(FixedClock::at(base))
    }

    #[test]
    fn test_arm_schedules_lead_and_exact_for_future_events() {
        let notifier = Arc::new(MockNotifier::granted());
        let scheduler = ReminderScheduler::new(notifier.clone(), clock_at(4, 0), 15);

        let outcome = scheduler.arm(&sample());
        assert!(outcome.available);
        // 5 prayers x (warning + exact)
        assert_eq!(outcome.reminders.len(), 10);
        assert_eq!(scheduler.armed_count(), 5);

        let fajr_warning = outcome
            .reminders
            .iter()
            .find(|r| r.event == PrayerEvent::Fajr && r.lead_minutes == 15)
            .unwrap();
        let fajr_exact = outcome
            .reminders
            .iter()
            .find(|r| r.event == PrayerEvent::Fajr && r.lead_minutes == 0)
            .unwrap();
        assert_eq!(fajr_exact.fire_at - fajr_warning.fire_at, Duration::minutes(15));
    }

    #[test]
    fn test_past_instants_are_skipped() {
        let notifier = Arc::new(MockNotifier::granted());
        // 12:10: Fajr long past, Dhuhr (12:15) exact is ahead but its
        // 15-minute warning (12:00) is not.
        let scheduler = ReminderScheduler::new(notifier, clock_at(12, 10), 15);

        let outcome = scheduler.arm(&sample());
        assert!(outcome
            .reminders
            .iter()
            .all(|r| r.event != PrayerEvent::Fajr));
        let dhuhr: Vec<_> = outcome
            .reminders
            .iter()
            .filter(|r| r.event == PrayerEvent::Dhuhr)
            .collect();
        assert_eq!(dhuhr.len(), 1);
        assert_eq!(dhuhr[0].lead_minutes, 0);
    }

    #[test]
    fn test_permission_denied_is_empty_noop() {
        let notifier = Arc::new(MockNotifier::default());
        let scheduler = ReminderScheduler::new(notifier.clone(), clock_at(4, 0), 15);

        let outcome = scheduler.arm(&sample());
        assert!(!outcome.available);
        assert!(outcome.reminders.is_empty());
        assert_eq!(scheduler.armed_count(), 0);
        assert!(notifier.state.lock().pending.is_empty());
    }

    #[test]
    fn test_rearm_cancels_old_timers() {
        let notifier = Arc::new(MockNotifier::granted());
        let scheduler = ReminderScheduler::new(notifier.clone(), clock_at(4, 0), 15);

        scheduler.arm(&sample());
        let first_count = notifier.state.lock().pending.len();
        assert_eq!(first_count, 10);

        let mut later = sample();
        later.dhuhr = hm(12, 30);
        later.asr = hm(16, 0);
        let outcome = scheduler.arm(&later);

        let state = notifier.state.lock();
        // Exactly the new set's timers remain; all old handles were
        // cancelled through the notifier, not just dropped.
        assert_eq!(state.pending.len(), outcome.reminders.len());
        assert_eq!(state.cancelled.len(), first_count);
    }

    #[test]
    fn test_disarm_single_event() {
        let notifier = Arc::new(MockNotifier::granted());
        let scheduler = ReminderScheduler::new(notifier.clone(), clock_at(4, 0), 15);

        scheduler.arm(&sample());
        scheduler.disarm(PrayerEvent::Isha);

        assert_eq!(scheduler.armed_count(), 4);
        let titles = notifier.pending_titles();
        assert!(titles.iter().all(|t| !t.contains("Isha")));
    }

    #[test]
    fn test_disarm_all_leaves_nothing_pending() {
        let notifier = Arc::new(MockNotifier::granted());
        let scheduler = ReminderScheduler::new(notifier.clone(), clock_at(4, 0), 15);

        scheduler.arm(&sample());
        scheduler.disarm_all();

        assert_eq!(scheduler.armed_count(), 0);
        assert!(notifier.state.lock().pending.is_empty());
    }
}
