//! HTTP client for the remote prayer-time calculation service.

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

use crate::error::EngineError;
use crate::types::{CalculationProfile, Coordinates, TimingSet};

pub const ALADHAN_BASE_URL: &str = "https://api.aladhan.com/v1";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = "salah-engine/0.1.0";

/// A successfully fetched remote timing set plus the metadata worth keeping.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTimings {
    pub timings: TimingSet,
    pub hijri_date: Option<String>,
    pub timezone: Option<String>,
    pub method_name: Option<String>,
}

pub struct TimingClient {
    client: reqwest::Client,
    base_url: String,
}

impl TimingClient {
    pub fn new() -> Result<Self, EngineError> {
        Self::with_base_url(ALADHAN_BASE_URL)
    }

    /// Build against a non-default service root (test servers, mirrors).
    pub fn with_base_url(base_url: &str) -> Result<Self, EngineError> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Issue one timing request. One attempt only; retries and fallbacks are
    /// the resolver's concern.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch(
        &self,
        coordinate: Coordinates,
        date: NaiveDate,
        profile: CalculationProfile,
    ) -> Result<RemoteTimings, EngineError> {
        let url = format!(
            "{}/timings/{}?latitude={:.6}&longitude={:.6}&method={}&school={}&midnightMode=0&latitudeAdjustmentMethod=3",
            self.base_url,
            date.format("%d-%m-%Y"),
            coordinate.latitude,
            coordinate.longitude,
            profile.method,
            profile.school.as_u8(),
        );

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::Service {
                code: status.as_u16(),
                message: text.chars().take(200).collect(),
            });
        }

        let body: ApiResponse = response.json().await.map_err(|e| EngineError::Service {
            code: status.as_u16(),
            message: format!("malformed payload: {}", e),
        })?;

        if body.code != 200 {
            return Err(EngineError::Service {
                code: u16::try_from(body.code).unwrap_or(0),
                message: body.status.unwrap_or_else(|| "rejected".to_string()),
            });
        }

        let data = body.data.ok_or_else(|| malformed("missing data"))?;
        let wire = data.timings.ok_or_else(|| malformed("missing timings"))?;

        let timings = TimingSet {
            fajr: parse_clock(&wire.fajr)?,
            sunrise: parse_clock(&wire.sunrise)?,
            dhuhr: parse_clock(&wire.dhuhr)?,
            asr: parse_clock(&wire.asr)?,
            sunset: parse_clock(&wire.sunset)?,
            maghrib: parse_clock(&wire.maghrib)?,
            isha: parse_clock(&wire.isha)?,
            midnight: parse_clock(&wire.midnight)?,
        };

        let hijri_date = data.date.and_then(|d| d.hijri).map(|h| {
            format!(
                "{} {} {} {}",
                h.day, h.month.en, h.year, h.designation.abbreviated
            )
        });
        let meta = data.meta;
        let timezone = meta.as_ref().and_then(|m| m.timezone.clone());
        let method_name = meta.and_then(|m| m.method).map(|m| m.name);

        tracing::debug!(?timezone, "Fetched remote timings");
        Ok(RemoteTimings {
            timings,
            hijri_date,
            timezone,
            method_name,
        })
    }
}

fn malformed(detail: &str) -> EngineError {
    EngineError::Service {
        code: 200,
        message: format!("malformed payload: {}", detail),
    }
}

/// The service renders times as `HH:MM`, occasionally suffixed with a
/// timezone tag like `"05:30 (EDT)"`.
fn parse_clock(raw: &str) -> Result<NaiveTime, EngineError> {
    let clock = raw.split_whitespace().next().unwrap_or(raw);
    NaiveTime::parse_from_str(clock, "%H:%M")
        .map_err(|_| malformed(&format!("unparseable time {:?}", raw)))
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    status: Option<String>,
    data: Option<ApiData>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    timings: Option<ApiTimings>,
    date: Option<ApiDate>,
    meta: Option<ApiMeta>,
}

#[derive(Debug, Deserialize)]
struct ApiTimings {
    #[serde(rename = "Fajr")]
    fajr: String,
    #[serde(rename = "Sunrise")]
    sunrise: String,
    #[serde(rename = "Dhuhr")]
    dhuhr: String,
    #[serde(rename = "Asr")]
    asr: String,
    #[serde(rename = "Sunset")]
    sunset: String,
    #[serde(rename = "Maghrib")]
    maghrib: String,
    #[serde(rename = "Isha")]
    isha: String,
    #[serde(rename = "Midnight")]
    midnight: String,
}

#[derive(Debug, Deserialize)]
struct ApiDate {
    hijri: Option<ApiHijri>,
}

#[derive(Debug, Deserialize)]
struct ApiHijri {
    day: String,
    year: String,
    month: ApiHijriMonth,
    designation: ApiDesignation,
}

#[derive(Debug, Deserialize)]
struct ApiHijriMonth {
    en: String,
}

#[derive(Debug, Deserialize)]
struct ApiDesignation {
    abbreviated: String,
}

#[derive(Debug, Deserialize)]
struct ApiMeta {
    timezone: Option<String>,
    method: Option<ApiMethod>,
}

#[derive(Debug, Deserialize)]
struct ApiMethod {
    name: String,
}
