//! Prometheus metrics for the marquee coordinator
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter_vec, CounterVec, Encoder,
    HistogramVec, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Container for all coordinator metrics
struct CoordinatorMetrics {
    lease_acquired: IntCounterVec,
    refresh_outcomes: IntCounterVec,
    merge_activity: CounterVec,
    fetch_duration: HistogramVec,
}

/// Global storage for coordinator metrics
static METRICS: OnceLock<CoordinatorMetrics> = OnceLock::new();

/// Register all metrics. Safe to call more than once.
pub fn init_metrics() {
    let _ = METRICS.get_or_init(|| {
        let lease_acquired = register_int_counter_vec!(
            "marquee_lease_acquired_total",
            "Lease acquisitions by holder class",
            &["class"]
        )
        .unwrap_or_else(|_| IntCounterVec::new(
            prometheus::Opts::new("noop_lease", "noop"),
            &["class"],
        )
        .unwrap());

        let refresh_outcomes = register_int_counter_vec!(
            "marquee_refresh_outcomes_total",
            "Refresh cycle outcomes by holder class and result",
            &["class", "outcome"]
        )
        .unwrap_or_else(|_| IntCounterVec::new(
            prometheus::Opts::new("noop_outcomes", "noop"),
            &["class", "outcome"],
        )
        .unwrap());

        let merge_activity = register_counter_vec!(
            "marquee_merge_activity_total",
            "Showtimes added and pruned by reconcile passes",
            &["kind"]
        )
        .unwrap_or_else(|_| CounterVec::new(
            prometheus::Opts::new("noop_merge", "noop"),
            &["kind"],
        )
        .unwrap());

        let fetch_duration = register_histogram_vec!(
            "marquee_fetch_duration_seconds",
            "External acquirer call duration",
            &["class"],
            vec![0.5, 1.0, 5.0, 15.0, 60.0, 180.0, 600.0]
        )
        .unwrap_or_else(|_| HistogramVec::new(
            prometheus::HistogramOpts::new("noop_fetch", "noop"),
            &["class"],
        )
        .unwrap());

        CoordinatorMetrics {
            lease_acquired,
            refresh_outcomes,
            merge_activity,
            fetch_duration,
        }
    });
}

/// Record a successful lease acquisition
pub fn record_lease_acquired(class: &str) {
    if let Some(m) = METRICS.get() {
        m.lease_acquired.with_label_values(&[class]).inc();
    }
}

/// Record the outcome of a refresh cycle for one key
pub fn record_refresh_outcome(class: &str, outcome: &str) {
    if let Some(m) = METRICS.get() {
        m.refresh_outcomes
            .with_label_values(&[class, outcome])
            .inc();
    }
}

/// Record merge engine activity
pub fn record_merge_activity(added: usize, pruned: usize) {
    if let Some(m) = METRICS.get() {
        m.merge_activity
            .with_label_values(&["added"])
            .inc_by(added as f64);
        m.merge_activity
            .with_label_values(&["pruned"])
            .inc_by(pruned as f64);
    }
}

/// Record the duration of an external fetch call
pub fn record_fetch_duration(class: &str, seconds: f64) {
    if let Some(m) = METRICS.get() {
        m.fetch_duration
            .with_label_values(&[class])
            .observe(seconds);
    }
}

/// Encode all registered metrics in the Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
