//! Next-event computation over a day's timing set.
//!
//! Pure wall-clock arithmetic in minutes since midnight; recomputed on a
//! periodic tick by the consumer, never persisted.

use chrono::{NaiveTime, Timelike};

use crate::types::{CurrentWindow, NextEvent, TimingSet};

/// Buffer around a prayer instant treated as "prayer time is active now".
pub const DEFAULT_WINDOW_BUFFER_MINUTES: u32 = 15;

const MINUTES_PER_DAY: u32 = 24 * 60;

fn minutes_of(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

/// The next prayer strictly after `now`. An event at exactly `now` is
/// already current, not next. Past Isha this wraps to tomorrow's Fajr.
pub fn next_event(timings: &TimingSet, now: NaiveTime) -> NextEvent {
    let now_minutes = minutes_of(now);

    for (event, time) in timings.prayer_times() {
        let event_minutes = minutes_of(time);
        if event_minutes > now_minutes {
            return NextEvent {
                event,
                time,
                minutes_until: event_minutes - now_minutes,
            };
        }
    }

    // No prayer left today: tomorrow's Fajr.
    let fajr_minutes = minutes_of(timings.fajr);
    NextEvent {
        event: crate::types::PrayerEvent::Fajr,
        time: timings.fajr,
        minutes_until: (MINUTES_PER_DAY - now_minutes) + fajr_minutes,
    }
}

/// The first prayer whose instant is within `buffer_minutes` of `now`, if
/// any.
pub fn current_window(
    timings: &TimingSet,
    now: NaiveTime,
    buffer_minutes: u32,
) -> Option<CurrentWindow> {
    let now_minutes = i64::from(minutes_of(now));

    timings
        .prayer_times()
        .into_iter()
        .find(|(_, time)| {
            (now_minutes - i64::from(minutes_of(*time))).abs() <= i64::from(buffer_minutes)
        })
        .map(|(event, time)| CurrentWindow { event, time })
}
