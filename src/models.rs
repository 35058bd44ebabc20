// Core data structures for the marquee coordinator

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Language code used for movie identity within a key.
pub const PRIMARY_LANGUAGE: &str = "en";

/// Normalized identity for a location (city, optional region, country).
///
/// The canonical form is derived once at construction: components are
/// trimmed, inner whitespace collapsed, and comparison/hashing is
/// case-insensitive. The display form preserves the original casing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceKey {
    city: String,
    region: Option<String>,
    country: String,
    canonical: String,
}

impl ResourceKey {
    /// Build a key from location components.
    pub fn new(city: &str, region: Option<&str>, country: &str) -> Self {
        let city = normalize_component(city);
        let region = region.map(normalize_component).filter(|r| !r.is_empty());
        let country = normalize_component(country);

        let display = match &region {
            Some(r) => format!("{city}, {r}, {country}"),
            None => format!("{city}, {country}"),
        };
        let canonical = display.to_lowercase();

        Self {
            city,
            region,
            country,
            canonical,
        }
    }

    /// Parse a "City, Country" or "City, Region, Country" string.
    ///
    /// Returns `None` when the string has fewer than two components or an
    /// empty city/country part.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let key = match parts.as_slice() {
            [city, country] => Self::new(city, None, country),
            [city, region, country] => Self::new(city, Some(region), country),
            _ => return None,
        };

        if key.city.is_empty() || key.country.is_empty() {
            return None;
        }
        Some(key)
    }

    /// City component (normalized form).
    pub fn city(&self) -> &str {
        &self.city
    }

    /// Optional region component.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Country component.
    pub fn country(&self) -> &str {
        &self.country
    }

    /// Case-folded form used for equality, hashing and shard assignment.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(r) => write!(f, "{}, {}, {}", self.city, r, self.country),
            None => write!(f, "{}, {}", self.city, self.country),
        }
    }
}

impl PartialEq for ResourceKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for ResourceKey {}

impl std::hash::Hash for ResourceKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

/// Trim and collapse inner whitespace runs to single spaces.
fn normalize_component(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A movie listed under a location key.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Movie {
    /// Title per language code (e.g. "en", "uk").
    pub title: BTreeMap<String, String>,

    /// Optional description per language code.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub description: BTreeMap<String, String>,

    /// Optional poster reference (URL or storage key).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,

    /// Theaters currently showing this movie.
    pub theaters: Vec<Theater>,
}

impl Movie {
    /// Identity within a key: the normalized primary-language title.
    ///
    /// Returns `None` when the primary title is missing or blank; such
    /// records cannot be merged and are skipped by the merge engine.
    pub fn identity(&self) -> Option<String> {
        self.title
            .get(PRIMARY_LANGUAGE)
            .map(|t| normalize_title(t))
            .filter(|t| !t.is_empty())
    }

    /// Total showtime count across all theaters.
    pub fn showtime_count(&self) -> usize {
        self.theaters.iter().map(|t| t.showtimes.len()).sum()
    }
}

/// Normalize a title for identity comparison.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A theater under a movie. Identity within a movie = name.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Theater {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    pub showtimes: Vec<Showtime>,
}

impl Theater {
    /// Create an empty theater with the given name.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// A single screening.
///
/// The start instant carries the originating UTC offset for display;
/// identity comparisons always use the UTC instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Showtime {
    /// Start instant with the originating offset.
    pub start_time: DateTime<FixedOffset>,

    /// Presentation format (2D, 3D, IMAX, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Audio language / dubbing info.
    pub language: String,

    /// Hall or screen identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hall: Option<String>,
}

impl Showtime {
    /// Identity instant in the fixed reference timezone.
    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start_time.with_timezone(&Utc)
    }

    /// UTC calendar date of the screening, used for coverage bookkeeping.
    pub fn date_utc(&self) -> NaiveDate {
        self.start_utc().date_naive()
    }
}

/// Inclusive calendar-date range still needing acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FetchRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Number of calendar dates covered (inclusive).
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for FetchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Per-location refresh status, persisted alongside the listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStatus {
    /// Listings were refreshed successfully.
    Fresh,
    /// Last refresh did not complete; data may be out of date.
    Stale,
    /// Last refresh failed with an error.
    Error,
}

impl RefreshStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fresh" => Some(Self::Fresh),
            "stale" => Some(Self::Stale),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status record for a location in the listing store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationRecord {
    pub key: ResourceKey,
    pub status: RefreshStatus,

    /// Error message from the last failed refresh, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// When the listings were last successfully refreshed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl LocationRecord {
    /// Whether the location was refreshed within `max_age`.
    pub fn is_fresh_within(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        self.status == RefreshStatus::Fresh
            && self
                .last_refreshed
                .map(|t| now - t < max_age)
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_key_normalization() {
        let a = ResourceKey::new("  Lviv ", None, " Ukraine");
        let b = ResourceKey::new("lviv", None, "UKRAINE");

        assert_eq!(a, b);
        assert_eq!(a.to_string(), "Lviv, Ukraine");
        assert_eq!(a.canonical(), "lviv, ukraine");
    }

    #[test]
    fn test_key_collapses_inner_whitespace() {
        let key = ResourceKey::new("New   York", Some("NY"), "USA");
        assert_eq!(key.to_string(), "New York, NY, USA");
    }

    #[test]
    fn test_key_parse_two_parts() {
        let key = ResourceKey::parse("Kyiv, Ukraine").unwrap();
        assert_eq!(key.city(), "Kyiv");
        assert_eq!(key.region(), None);
        assert_eq!(key.country(), "Ukraine");
    }

    #[test]
    fn test_key_parse_three_parts() {
        let key = ResourceKey::parse("Austin, Texas, USA").unwrap();
        assert_eq!(key.region(), Some("Texas"));
    }

    #[test]
    fn test_key_parse_rejects_bare_city() {
        assert!(ResourceKey::parse("Kyiv").is_none());
        assert!(ResourceKey::parse("").is_none());
        assert!(ResourceKey::parse(", Ukraine").is_none());
    }

    #[test]
    fn test_movie_identity_normalizes_title() {
        let mut movie = Movie::default();
        movie
            .title
            .insert(PRIMARY_LANGUAGE.to_string(), "  The  Matrix ".to_string());

        assert_eq!(movie.identity().as_deref(), Some("the matrix"));
    }

    #[test]
    fn test_movie_identity_missing_primary_title() {
        let mut movie = Movie::default();
        movie.title.insert("uk".to_string(), "Матриця".to_string());

        assert!(movie.identity().is_none());
    }

    #[test]
    fn test_showtime_identity_is_utc_instant() {
        // 18:00+02:00 and 16:00Z are the same instant
        let kyiv = FixedOffset::east_opt(2 * 3600).unwrap();
        let a = Showtime {
            start_time: kyiv.with_ymd_and_hms(2026, 8, 10, 18, 0, 0).unwrap(),
            format: None,
            language: "uk".to_string(),
            hall: None,
        };
        let b = Showtime {
            start_time: FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2026, 8, 10, 16, 0, 0)
                .unwrap(),
            format: None,
            language: "uk".to_string(),
            hall: None,
        };

        assert_eq!(a.start_utc(), b.start_utc());
        // Originating offset is preserved on each record
        assert_ne!(a.start_time.offset(), b.start_time.offset());
    }

    #[test]
    fn test_fetch_range_days() {
        let range = FetchRange::new(
            NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
            NaiveDate::from_ymd_opt(2026, 8, 20).unwrap(),
        );
        assert_eq!(range.days(), 14);
        assert!(range.contains(NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2026, 8, 21).unwrap()));
    }

    #[test]
    fn test_refresh_status_round_trip() {
        for status in [RefreshStatus::Fresh, RefreshStatus::Stale, RefreshStatus::Error] {
            assert_eq!(RefreshStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RefreshStatus::parse("processing"), None);
    }
}
