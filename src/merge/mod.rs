//! Merge/reconciliation engine
//!
//! Folds newly acquired movie/theater/showtime records into persisted
//! state without duplication or loss, then prunes expired entries. One
//! engine serves all three orchestrators; the same policy applies to the
//! interactive, scheduled and shard-worker paths.
//!
//! Reconciliation is idempotent: repeating a batch adds nothing, and
//! partial batches for the same key only ever add or prune.

use chrono::{DateTime, Duration, Utc};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::debug;

use crate::models::{Movie, Showtime, Theater};

/// Policy constants for reconciliation.
#[derive(Debug, Clone, Copy)]
pub struct MergePolicy {
    /// Showtimes older than `now - prune_grace` are removed.
    pub prune_grace: Duration,

    /// Incoming showtimes starting sooner than `now + admission_lead`
    /// are not admitted.
    pub admission_lead: Duration,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            prune_grace: Duration::hours(24),
            admission_lead: Duration::hours(1),
        }
    }
}

/// Counters describing what a reconcile pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub movies_created: usize,
    pub movies_merged: usize,
    pub showtimes_added: usize,
    pub showtimes_duplicate: usize,
    pub showtimes_rejected: usize,
    pub records_skipped: usize,
    pub showtimes_pruned: usize,
    pub theaters_pruned: usize,
    pub movies_pruned: usize,
}

/// Result of a reconcile pass.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub movies: Vec<Movie>,
    pub stats: MergeStats,
}

/// Idempotent reconciliation of acquired listings into persisted state.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeEngine {
    policy: MergePolicy,
}

impl MergeEngine {
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Reconcile `incoming` into `existing` and prune expired entries.
    ///
    /// Movie identity is the normalized primary-language title; theater
    /// identity is the name; showtime identity is the start instant in
    /// UTC. Records without a usable identity are skipped individually;
    /// one bad record never aborts the batch.
    pub fn reconcile(
        &self,
        existing: Vec<Movie>,
        incoming: &[Movie],
        now: DateTime<Utc>,
    ) -> MergeOutcome {
        let mut stats = MergeStats::default();

        // Index persisted movies by identity. A persisted record without a
        // primary title cannot be matched against and is dropped here.
        let mut movies: BTreeMap<String, Movie> = BTreeMap::new();
        for movie in existing {
            match movie.identity() {
                Some(id) => {
                    movies.insert(id, movie);
                }
                None => stats.records_skipped += 1,
            }
        }

        for record in incoming {
            let Some(id) = record.identity() else {
                debug!("skipping incoming movie without primary title");
                stats.records_skipped += 1;
                continue;
            };

            match movies.entry(id) {
                Entry::Occupied(mut entry) => {
                    stats.movies_merged += 1;
                    self.merge_movie(entry.get_mut(), record, now, &mut stats);
                }
                Entry::Vacant(entry) => {
                    stats.movies_created += 1;
                    entry.insert(self.admit_movie(record, now, &mut stats));
                }
            }
        }

        let mut merged: Vec<Movie> = movies.into_values().collect();
        self.prune(&mut merged, now, &mut stats);

        MergeOutcome {
            movies: merged,
            stats,
        }
    }

    /// Copy an incoming movie, admitting only eligible showtimes.
    fn admit_movie(&self, record: &Movie, now: DateTime<Utc>, stats: &mut MergeStats) -> Movie {
        let mut movie = Movie {
            title: record.title.clone(),
            description: record.description.clone(),
            poster: record.poster.clone(),
            theaters: Vec::new(),
        };

        for theater in &record.theaters {
            let mut copy = Theater {
                name: theater.name.clone(),
                address: theater.address.clone(),
                website: theater.website.clone(),
                showtimes: Vec::new(),
            };
            for showtime in &theater.showtimes {
                if self.admit(showtime, now) {
                    // Dedup within the batch itself
                    if contains_instant(&copy.showtimes, showtime) {
                        stats.showtimes_duplicate += 1;
                    } else {
                        copy.showtimes.push(showtime.clone());
                        stats.showtimes_added += 1;
                    }
                } else {
                    stats.showtimes_rejected += 1;
                }
            }
            movie.theaters.push(copy);
        }

        movie
    }

    /// Merge an incoming movie into its persisted counterpart.
    fn merge_movie(
        &self,
        target: &mut Movie,
        record: &Movie,
        now: DateTime<Utc>,
        stats: &mut MergeStats,
    ) {
        // Titles and descriptions accumulate languages; non-empty incoming
        // values win
        for (lang, title) in &record.title {
            if !title.trim().is_empty() {
                target.title.insert(lang.clone(), title.clone());
            }
        }
        for (lang, desc) in &record.description {
            if !desc.trim().is_empty() {
                target.description.insert(lang.clone(), desc.clone());
            }
        }
        if record.poster.as_deref().is_some_and(|p| !p.trim().is_empty()) {
            target.poster = record.poster.clone();
        }

        for incoming_theater in &record.theaters {
            let name = incoming_theater.name.trim();
            if let Some(idx) = target.theaters.iter().position(|t| t.name.trim() == name) {
                let theater = &mut target.theaters[idx];
                if nonempty(&incoming_theater.address) {
                    theater.address = incoming_theater.address.clone();
                }
                if nonempty(&incoming_theater.website) {
                    theater.website = incoming_theater.website.clone();
                }
                for showtime in &incoming_theater.showtimes {
                    if !self.admit(showtime, now) {
                        stats.showtimes_rejected += 1;
                    } else if contains_instant(&theater.showtimes, showtime) {
                        stats.showtimes_duplicate += 1;
                    } else {
                        theater.showtimes.push(showtime.clone());
                        stats.showtimes_added += 1;
                    }
                }
            } else {
                let mut copy = Theater {
                    name: incoming_theater.name.clone(),
                    address: incoming_theater.address.clone(),
                    website: incoming_theater.website.clone(),
                    showtimes: Vec::new(),
                };
                for showtime in &incoming_theater.showtimes {
                    if self.admit(showtime, now) {
                        if contains_instant(&copy.showtimes, showtime) {
                            stats.showtimes_duplicate += 1;
                        } else {
                            copy.showtimes.push(showtime.clone());
                            stats.showtimes_added += 1;
                        }
                    } else {
                        stats.showtimes_rejected += 1;
                    }
                }
                target.theaters.push(copy);
            }
        }
    }

    /// Whether an incoming showtime is far enough in the future.
    fn admit(&self, showtime: &Showtime, now: DateTime<Utc>) -> bool {
        showtime.start_utc() >= now + self.policy.admission_lead
    }

    /// Remove expired showtimes, then childless theaters and movies.
    fn prune(&self, movies: &mut Vec<Movie>, now: DateTime<Utc>, stats: &mut MergeStats) {
        let cutoff = now - self.policy.prune_grace;

        for movie in movies.iter_mut() {
            for theater in movie.theaters.iter_mut() {
                let before = theater.showtimes.len();
                theater.showtimes.retain(|s| s.start_utc() >= cutoff);
                stats.showtimes_pruned += before - theater.showtimes.len();
            }
            let before = movie.theaters.len();
            movie.theaters.retain(|t| !t.showtimes.is_empty());
            stats.theaters_pruned += before - movie.theaters.len();
        }

        let before = movies.len();
        movies.retain(|m| !m.theaters.is_empty());
        stats.movies_pruned += before - movies.len();
    }
}

fn contains_instant(showtimes: &[Showtime], candidate: &Showtime) -> bool {
    let instant = candidate.start_utc();
    showtimes.iter().any(|s| s.start_utc() == instant)
}

fn nonempty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    use crate::models::PRIMARY_LANGUAGE;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap()
    }

    fn showtime(hours_from_now: i64) -> Showtime {
        let start = (now() + Duration::hours(hours_from_now)).with_timezone(
            &FixedOffset::east_opt(2 * 3600).unwrap(),
        );
        Showtime {
            start_time: start,
            format: Some("2D".to_string()),
            language: "en".to_string(),
            hall: None,
        }
    }

    fn movie(title: &str, theaters: Vec<Theater>) -> Movie {
        let mut m = Movie::default();
        m.title.insert(PRIMARY_LANGUAGE.to_string(), title.to_string());
        m.theaters = theaters;
        m
    }

    fn theater(name: &str, showtimes: Vec<Showtime>) -> Theater {
        Theater {
            name: name.to_string(),
            address: Some(format!("{name} street 1")),
            website: None,
            showtimes,
        }
    }

    #[test]
    fn test_reconcile_creates_new_movies() {
        let engine = MergeEngine::default();
        let incoming = vec![
            movie("Dune", vec![theater("Multiplex", vec![showtime(5)])]),
            movie("Alien", vec![theater("Planeta", vec![showtime(6)])]),
        ];

        let outcome = engine.reconcile(Vec::new(), &incoming, now());
        assert_eq!(outcome.movies.len(), 2);
        assert_eq!(outcome.stats.movies_created, 2);
        assert_eq!(outcome.stats.showtimes_added, 2);
    }

    #[test]
    fn test_reconcile_merges_by_normalized_title() {
        let engine = MergeEngine::default();
        let existing = engine
            .reconcile(
                Vec::new(),
                &[movie("The Matrix", vec![theater("A", vec![showtime(5)])])],
                now(),
            )
            .movies;

        let incoming = vec![movie("  the  MATRIX ", vec![theater("B", vec![showtime(7)])])];
        let outcome = engine.reconcile(existing, &incoming, now());

        assert_eq!(outcome.movies.len(), 1);
        assert_eq!(outcome.movies[0].theaters.len(), 2);
        assert_eq!(outcome.stats.movies_merged, 1);
    }

    #[test]
    fn test_showtime_dedup_by_utc_instant() {
        let engine = MergeEngine::default();

        // Same instant expressed in two different offsets
        let mut st_offset = showtime(5);
        st_offset.start_time = st_offset
            .start_time
            .with_timezone(&FixedOffset::east_opt(0).unwrap());

        let existing = engine
            .reconcile(
                Vec::new(),
                &[movie("Dune", vec![theater("A", vec![showtime(5)])])],
                now(),
            )
            .movies;
        let outcome = engine.reconcile(
            existing,
            &[movie("Dune", vec![theater("A", vec![st_offset])])],
            now(),
        );

        assert_eq!(outcome.movies[0].theaters[0].showtimes.len(), 1);
        assert_eq!(outcome.stats.showtimes_duplicate, 1);
        assert_eq!(outcome.stats.showtimes_added, 0);
    }

    #[test]
    fn test_address_overwritten_only_when_nonempty() {
        let engine = MergeEngine::default();
        let existing = engine
            .reconcile(
                Vec::new(),
                &[movie("Dune", vec![theater("A", vec![showtime(5)])])],
                now(),
            )
            .movies;

        let mut incoming_theater = theater("A", vec![showtime(8)]);
        incoming_theater.address = Some("   ".to_string());
        incoming_theater.website = Some("https://a.example".to_string());

        let outcome = engine.reconcile(existing, &[movie("Dune", vec![incoming_theater])], now());
        let t = &outcome.movies[0].theaters[0];

        // Blank incoming address is ignored, non-empty website wins
        assert_eq!(t.address.as_deref(), Some("A street 1"));
        assert_eq!(t.website.as_deref(), Some("https://a.example"));
    }

    #[test]
    fn test_prune_cascades_to_movies() {
        let engine = MergeEngine::default();

        // One future screening, one 30 hours in the past (beyond grace)
        let existing = vec![
            movie("Fresh", vec![theater("A", vec![showtime(5)])]),
            movie("Expired", vec![theater("B", vec![showtime(-30)])]),
        ];

        let outcome = engine.reconcile(existing, &[], now());
        assert_eq!(outcome.movies.len(), 1);
        assert_eq!(outcome.movies[0].identity().as_deref(), Some("fresh"));
        assert_eq!(outcome.stats.showtimes_pruned, 1);
        assert_eq!(outcome.stats.theaters_pruned, 1);
        assert_eq!(outcome.stats.movies_pruned, 1);
    }

    #[test]
    fn test_recent_past_showtime_survives_grace() {
        let engine = MergeEngine::default();
        // 10 hours old: inside the 24h grace, kept
        let existing = vec![movie("Dune", vec![theater("A", vec![showtime(-10)])])];

        let outcome = engine.reconcile(existing, &[], now());
        assert_eq!(outcome.movies.len(), 1);
        assert_eq!(outcome.stats.showtimes_pruned, 0);
    }

    #[test]
    fn test_incoming_without_title_skipped() {
        let engine = MergeEngine::default();
        let mut untitled = Movie::default();
        untitled.theaters = vec![theater("A", vec![showtime(5)])];

        let incoming = vec![untitled, movie("Dune", vec![theater("B", vec![showtime(6)])])];
        let outcome = engine.reconcile(Vec::new(), &incoming, now());

        // The rest of the batch still merges
        assert_eq!(outcome.movies.len(), 1);
        assert_eq!(outcome.stats.records_skipped, 1);
    }

    #[test]
    fn test_admission_lead_rejects_imminent_showtimes() {
        let engine = MergeEngine::default();
        // 30 minutes ahead: below the 1 hour lead
        let incoming = vec![movie(
            "Dune",
            vec![theater("A", vec![showtime(5), imminent()])],
        )];

        let outcome = engine.reconcile(Vec::new(), &incoming, now());
        assert_eq!(outcome.movies[0].theaters[0].showtimes.len(), 1);
        assert_eq!(outcome.stats.showtimes_rejected, 1);
    }

    fn imminent() -> Showtime {
        let start = (now() + Duration::minutes(30))
            .with_timezone(&FixedOffset::east_opt(0).unwrap());
        Showtime {
            start_time: start,
            format: None,
            language: "en".to_string(),
            hall: None,
        }
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let engine = MergeEngine::default();
        let incoming = vec![
            movie(
                "Dune",
                vec![theater("A", vec![showtime(5), showtime(8)]), theater("B", vec![showtime(6)])],
            ),
            movie("Alien", vec![theater("A", vec![showtime(9)])]),
        ];

        let once = engine.reconcile(Vec::new(), &incoming, now());
        let twice = engine.reconcile(once.movies.clone(), &incoming, now());

        assert_eq!(serde_json::to_value(&once.movies).unwrap(),
                   serde_json::to_value(&twice.movies).unwrap());
        assert_eq!(twice.stats.showtimes_added, 0);
    }

    #[test]
    fn test_partial_batches_do_not_duplicate() {
        // The same (theater, instant) submitted in two separate batches
        // ends up stored exactly once
        let engine = MergeEngine::default();
        let batch_one = vec![movie("Dune", vec![theater("A", vec![showtime(5)])])];
        let batch_two = vec![movie("Dune", vec![theater("A", vec![showtime(5), showtime(7)])])];

        let first = engine.reconcile(Vec::new(), &batch_one, now());
        let second = engine.reconcile(first.movies, &batch_two, now());

        assert_eq!(second.movies[0].theaters[0].showtimes.len(), 2);
        assert_eq!(second.stats.showtimes_duplicate, 1);
    }
}
