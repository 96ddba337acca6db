use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// The eight daily instants tracked by the engine: the five canonical
/// prayers plus three auxiliary solar instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrayerEvent {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Sunset,
    Maghrib,
    Isha,
    Midnight,
}

impl PrayerEvent {
    /// The five canonical prayers, in chronological order.
    pub const PRAYERS: [PrayerEvent; 5] = [
        Self::Fajr,
        Self::Dhuhr,
        Self::Asr,
        Self::Maghrib,
        Self::Isha,
    ];

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fajr => "Fajr",
            Self::Sunrise => "Sunrise",
            Self::Dhuhr => "Dhuhr",
            Self::Asr => "Asr",
            Self::Sunset => "Sunset",
            Self::Maghrib => "Maghrib",
            Self::Isha => "Isha",
            Self::Midnight => "Midnight",
        }
    }

    /// Whether this is one of the five canonical prayers (vs. an auxiliary
    /// solar instant).
    pub fn is_prayer(&self) -> bool {
        matches!(
            self,
            Self::Fajr | Self::Dhuhr | Self::Asr | Self::Maghrib | Self::Isha
        )
    }
}

impl std::fmt::Display for PrayerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Wall-clock local times for one calendar day at a fixed coordinate.
///
/// Immutable once produced for a given (coordinate, date, method, school)
/// tuple. Events occur in fixed chronological order within the 24h cycle,
/// with Midnight allowed to wrap past 00:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingSet {
    pub fajr: NaiveTime,
    pub sunrise: NaiveTime,
    pub dhuhr: NaiveTime,
    pub asr: NaiveTime,
    pub sunset: NaiveTime,
    pub maghrib: NaiveTime,
    pub isha: NaiveTime,
    pub midnight: NaiveTime,
}

impl TimingSet {
    /// Time of a single event.
    pub fn time_of(&self, event: PrayerEvent) -> NaiveTime {
        match event {
            PrayerEvent::Fajr => self.fajr,
            PrayerEvent::Sunrise => self.sunrise,
            PrayerEvent::Dhuhr => self.dhuhr,
            PrayerEvent::Asr => self.asr,
            PrayerEvent::Sunset => self.sunset,
            PrayerEvent::Maghrib => self.maghrib,
            PrayerEvent::Isha => self.isha,
            PrayerEvent::Midnight => self.midnight,
        }
    }

    /// The five prayer instants in declaration order.
    pub fn prayer_times(&self) -> [(PrayerEvent, NaiveTime); 5] {
        [
            (PrayerEvent::Fajr, self.fajr),
            (PrayerEvent::Dhuhr, self.dhuhr),
            (PrayerEvent::Asr, self.asr),
            (PrayerEvent::Maghrib, self.maghrib),
            (PrayerEvent::Isha, self.isha),
        ]
    }
}

/// Geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Cache-key token rounded to 3 decimals (~110 m) so GPS jitter maps to
    /// the same entry.
    pub fn cache_token(&self) -> String {
        format!("{:.3}_{:.3}", self.latitude, self.longitude)
    }
}

/// Jurisprudence school governing the Asr shadow-length rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum School {
    #[default]
    Shafi,
    Hanafi,
}

impl School {
    /// Wire value expected by the timing service (0 = Shafi, 1 = Hanafi).
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Shafi => 0,
            Self::Hanafi => 1,
        }
    }
}

/// Calculation convention selected by the user: upstream method id plus
/// jurisprudence school. A change invalidates cached timings via the cache
/// key composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalculationProfile {
    pub method: u16,
    pub school: School,
}

impl Default for CalculationProfile {
    fn default() -> Self {
        Self {
            method: 2, // ISNA
            school: School::Shafi,
        }
    }
}

/// A calculation method offered for user selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalculationMethod {
    pub id: u16,
    pub name: &'static str,
    pub description: &'static str,
}

/// Upstream calculation methods supported by the timing service.
pub const CALCULATION_METHODS: &[CalculationMethod] = &[
    CalculationMethod {
        id: 1,
        name: "Muslim World League",
        description: "Used in Europe, Far East, parts of US",
    },
    CalculationMethod {
        id: 2,
        name: "Islamic Society of North America (ISNA)",
        description: "Used in North America",
    },
    CalculationMethod {
        id: 3,
        name: "Egyptian General Authority of Survey",
        description: "Used in Africa, Syria, Iraq, Lebanon, Malaysia, Parts of the USA",
    },
    CalculationMethod {
        id: 4,
        name: "Umm Al-Qura University, Makkah",
        description: "Used in Saudi Arabia",
    },
    CalculationMethod {
        id: 5,
        name: "University of Islamic Sciences, Karachi",
        description: "Used in Pakistan, Bangladesh, India, Afghanistan, Parts of Europe",
    },
    CalculationMethod {
        id: 7,
        name: "Institute of Geophysics, University of Tehran",
        description: "Used in Iran, Some Shia communities",
    },
    CalculationMethod {
        id: 8,
        name: "Gulf Region",
        description: "Modified version of Umm Al-Qura",
    },
    CalculationMethod {
        id: 9,
        name: "Kuwait",
        description: "Used in Kuwait",
    },
    CalculationMethod {
        id: 10,
        name: "Qatar",
        description: "Modified version of Umm Al-Qura used in Qatar",
    },
    CalculationMethod {
        id: 11,
        name: "Majlis Ugama Islam Singapura, Singapore",
        description: "Used in Singapore",
    },
    CalculationMethod {
        id: 12,
        name: "Union Organization islamic de France",
        description: "Used in France",
    },
    CalculationMethod {
        id: 13,
        name: "Diyanet İşleri Başkanlığı, Turkey",
        description: "Used in Turkey",
    },
    CalculationMethod {
        id: 14,
        name: "Spiritual Administration of Muslims of Russia",
        description: "Used in Russia",
    },
];

/// Where a timing set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingSource {
    /// The authoritative remote calculation service.
    Remote,
    /// The local astronomical approximation.
    LocalFallback,
}

/// Outcome of a resolution request. Always carries a usable timing set;
/// `degraded` signals the set came from the local approximation (or a saved
/// copy of one), never an authoritative fresh answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub timings: TimingSet,
    /// Hijri calendar date string echoed by the remote service, when known.
    pub hijri_date: Option<String>,
    pub source: TimingSource,
    pub degraded: bool,
    pub error_message: Option<String>,
    pub resolved_at: DateTime<Utc>,
    pub date: NaiveDate,
}

/// The next upcoming prayer relative to some wall-clock instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NextEvent {
    pub event: PrayerEvent,
    pub time: NaiveTime,
    pub minutes_until: u32,
}

/// A prayer whose instant is within the active buffer around "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CurrentWindow {
    pub event: PrayerEvent,
    pub time: NaiveTime,
}
