//! Local astronomical approximation of prayer times.
//!
//! Pure, deterministic, no I/O and no failure modes: a best-effort timing
//! set comes back for any input, including polar latitudes where the
//! standard hour-angle formula is undefined. The produced sequence is
//! strictly ordered within one civil day; only Midnight may wrap past
//! 00:00. Explicitly lower fidelity than the remote calculation service;
//! every set produced here must be flagged degraded by the caller.

use chrono::{Datelike, NaiveDate, NaiveTime};

use crate::types::TimingSet;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Fixed offsets, in minutes, applied around the solar anchors.
const FAJR_BEFORE_SUNRISE: i64 = 90;
const MAGHRIB_AFTER_SUNSET: i64 = 5;
const ISHA_AFTER_SUNSET: i64 = 90;
// Fixed-offset Asr approximation, not a true shadow-ratio calculation.
const ASR_AFTER_NOON: i64 = 210;
const MIDNIGHT_AFTER_MAGHRIB: i64 = 360;

/// Bounds on the sunrise-to-noon span. The lower bound keeps Asr, a fixed
/// 210 minutes past noon, strictly before sunset on the shortest days; the
/// upper bound keeps Fajr after 00:00 and the wrapped Midnight ahead of the
/// next day's Fajr on the longest.
const MIN_HALF_DAY_MINUTES: f64 = 211.0;
const MAX_HALF_DAY_MINUTES: f64 = 447.0;

/// Compute an approximate timing set for a coordinate and date.
pub fn compute(latitude: f64, longitude: f64, date: NaiveDate) -> TimingSet {
    let day_of_year = f64::from(date.ordinal());

    // Single-harmonic solar declination approximation.
    let declination = (0.39795 * (0.017214 * (day_of_year - 81.0)).cos()).asin();

    // Sunrise/sunset hour angle. Outside [-1, 1] the sun never crosses the
    // horizon (polar day/night); substitute a right angle as a degraded
    // default instead of failing.
    let cos_hour_angle = -latitude.to_radians().tan() * declination.tan();
    let hour_angle = if cos_hour_angle.abs() <= 1.0 {
        cos_hour_angle.clamp(-1.0, 1.0).acos()
    } else {
        std::f64::consts::FRAC_PI_2
    };
    let half_day_minutes =
        (hour_angle.to_degrees() * 4.0).clamp(MIN_HALF_DAY_MINUTES, MAX_HALF_DAY_MINUTES);

    // Solar noon in zone time: 4 minutes per degree of displacement from the
    // coordinate's 15-degree zone meridian.
    let zone_correction = 4.0 * (longitude - 15.0 * (longitude / 15.0).round());
    let noon_minutes = 720.0 - zone_correction;

    let noon = noon_minutes.round() as i64;
    let sunrise = (noon_minutes - half_day_minutes).round() as i64;
    let sunset = (noon_minutes + half_day_minutes).round() as i64;

    TimingSet {
        fajr: clock(sunrise - FAJR_BEFORE_SUNRISE),
        sunrise: clock(sunrise),
        dhuhr: clock(noon),
        asr: clock(noon + ASR_AFTER_NOON),
        sunset: clock(sunset),
        maghrib: clock(sunset + MAGHRIB_AFTER_SUNSET),
        isha: clock(sunset + ISHA_AFTER_SUNSET),
        midnight: clock(sunset + MAGHRIB_AFTER_SUNSET + MIDNIGHT_AFTER_MAGHRIB),
    }
}

/// Wrap a minutes-since-midnight value onto the 24h clock.
fn clock(total_minutes: i64) -> NaiveTime {
    let wrapped = total_minutes.rem_euclid(MINUTES_PER_DAY);
    NaiveTime::from_hms_opt(wrapped as u32 / 60, wrapped as u32 % 60, 0)
        .unwrap_or(NaiveTime::MIN)
}
