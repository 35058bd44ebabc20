//! Common test utilities
//!
//! Shared fixtures and acquirer doubles; not every test binary uses
//! every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use std::sync::Arc;

use marquee::acquire::{AcquireError, Acquirer, Acquisition};
use marquee::config::CoordinationConfig;
use marquee::lease::{LeaseManager, MemoryLeaseStore};
use marquee::models::{FetchRange, Movie, ResourceKey, Showtime, Theater, PRIMARY_LANGUAGE};
use marquee::orchestrator::Coordinator;
use marquee::storage::MemoryListingStore;

pub fn key(name: &str) -> ResourceKey {
    ResourceKey::parse(name).unwrap()
}

/// A screening at +02:00, `hours_from_now` ahead of the given instant.
pub fn showtime_in(now: DateTime<Utc>, hours_from_now: i64) -> Showtime {
    Showtime {
        start_time: (now + Duration::hours(hours_from_now))
            .with_timezone(&FixedOffset::east_opt(2 * 3600).unwrap()),
        format: Some("2D".to_string()),
        language: "en".to_string(),
        hall: None,
    }
}

/// A late-evening screening on each of the next `days` UTC dates, so the
/// whole target window counts as covered.
pub fn daily_showtimes(days: i64) -> Vec<Showtime> {
    let base = Utc::now().date_naive();
    (0..days)
        .map(|day| {
            let date = base + Duration::days(day);
            Showtime {
                start_time: Utc
                    .from_utc_datetime(&date.and_hms_opt(23, 59, 0).unwrap())
                    .with_timezone(&FixedOffset::east_opt(2 * 3600).unwrap()),
                format: None,
                language: "en".to_string(),
                hall: None,
            }
        })
        .collect()
}

pub fn movie(title: &str, theaters: Vec<Theater>) -> Movie {
    let mut m = Movie::default();
    m.title.insert(PRIMARY_LANGUAGE.to_string(), title.to_string());
    m.theaters = theaters;
    m
}

pub fn theater(name: &str, showtimes: Vec<Showtime>) -> Theater {
    Theater {
        name: name.to_string(),
        address: Some(format!("{name} street 1")),
        website: Some(format!("https://{}.example", name.to_lowercase())),
        showtimes,
    }
}

/// Acquirer returning a fixed result for every fetch.
pub struct StaticAcquirer {
    pub movies: Vec<Movie>,
}

#[async_trait]
impl Acquirer for StaticAcquirer {
    async fn fetch(
        &self,
        _key: &ResourceKey,
        _window: FetchRange,
    ) -> Result<Acquisition, AcquireError> {
        Ok(Acquisition {
            movies: self.movies.clone(),
        })
    }
}

/// Acquirer failing every fetch with an opaque message.
pub struct FailingAcquirer {
    pub message: String,
}

#[async_trait]
impl Acquirer for FailingAcquirer {
    async fn fetch(
        &self,
        _key: &ResourceKey,
        _window: FetchRange,
    ) -> Result<Acquisition, AcquireError> {
        Err(AcquireError::new(self.message.clone()))
    }
}

/// A complete coordination stack over in-memory stores.
pub struct TestStack {
    pub coordinator: Arc<Coordinator>,
    pub leases: Arc<LeaseManager>,
    pub listings: Arc<MemoryListingStore>,
}

pub fn stack(acquirer: Arc<dyn Acquirer>) -> TestStack {
    stack_with_policy(acquirer, CoordinationConfig::default())
}

pub fn stack_with_policy(acquirer: Arc<dyn Acquirer>, policy: CoordinationConfig) -> TestStack {
    let leases = Arc::new(LeaseManager::new(
        Arc::new(MemoryLeaseStore::new()),
        policy.lease_ttl(),
    ));
    let listings = Arc::new(MemoryListingStore::new());
    let coordinator = Arc::new(Coordinator::new(
        leases.clone(),
        listings.clone(),
        acquirer,
        policy,
    ));

    TestStack {
        coordinator,
        leases,
        listings,
    }
}
