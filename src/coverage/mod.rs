//! Incremental coverage planning
//!
//! Computes the minimal date window still needing acquisition for a
//! location from its persisted showtimes. Calendar dates are evaluated in
//! the fixed reference timezone (UTC); only future showtimes count as
//! coverage, so a date full of already-played screenings is treated as
//! missing.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeSet;

use crate::models::{FetchRange, Movie};

/// Plans fetch windows against a configured coverage horizon.
#[derive(Debug, Clone, Copy)]
pub struct CoveragePlanner {
    horizon_days: u32,
}

/// Coverage snapshot for a location, used by the status surface.
#[derive(Debug, Clone)]
pub struct CoverageReport {
    /// The full target window `[T0, T0 + horizon)`.
    pub target: FetchRange,

    /// Target dates that already have at least one future showtime.
    pub covered: BTreeSet<NaiveDate>,

    /// The window still needing acquisition, if any.
    pub plan: Option<FetchRange>,
}

impl CoveragePlanner {
    pub fn new(horizon_days: u32) -> Self {
        Self { horizon_days }
    }

    pub fn horizon_days(&self) -> u32 {
        self.horizon_days
    }

    /// The target window starting at `now`'s UTC date.
    pub fn target_window(&self, now: DateTime<Utc>) -> FetchRange {
        let t0 = now.date_naive();
        FetchRange::new(t0, t0 + Duration::days(self.horizon_days as i64 - 1))
    }

    /// Compute the minimal window still needing acquisition.
    ///
    /// Returns `None` when every target date is covered; the caller
    /// should short-circuit and serve existing data. Returns the full
    /// window when nothing is covered, or when the most recent date with
    /// any data lies strictly before today (catch-up: partial coverage
    /// bookkeeping is unreliable once data has aged past the window).
    pub fn plan(&self, movies: &[Movie], now: DateTime<Utc>) -> Option<FetchRange> {
        let target = self.target_window(now);
        let t0 = target.start;

        let mut covered: BTreeSet<NaiveDate> = BTreeSet::new();
        let mut latest_with_data: Option<NaiveDate> = None;

        for movie in movies {
            for theater in &movie.theaters {
                for showtime in &theater.showtimes {
                    let date = showtime.date_utc();
                    latest_with_data = Some(latest_with_data.map_or(date, |d| d.max(date)));
                    if showtime.start_utc() > now {
                        covered.insert(date);
                    }
                }
            }
        }

        if let Some(latest) = latest_with_data {
            if latest < t0 {
                return Some(target);
            }
        }

        let missing: Vec<NaiveDate> = (0..self.horizon_days as i64)
            .map(|i| t0 + Duration::days(i))
            .filter(|d| !covered.contains(d))
            .collect();

        let (first, last) = match (missing.first(), missing.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return None,
        };

        // The window never starts before today
        Some(FetchRange::new(first.max(t0), last))
    }

    /// Full coverage snapshot for inspection surfaces.
    pub fn report(&self, movies: &[Movie], now: DateTime<Utc>) -> CoverageReport {
        let target = self.target_window(now);
        let covered = movies
            .iter()
            .flat_map(|m| &m.theaters)
            .flat_map(|t| &t.showtimes)
            .filter(|s| s.start_utc() > now)
            .map(|s| s.date_utc())
            .filter(|d| target.contains(*d))
            .collect();

        CoverageReport {
            target,
            covered,
            plan: self.plan(movies, now),
        }
    }
}
