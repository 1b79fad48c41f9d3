//! Prometheus metrics for fetch latency and cycle health.

use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

use crate::venue::VenueId;

// === Metric Name Constants ===

/// Venue order book fetch latency metric name.
pub const METRIC_VENUE_FETCH_LATENCY: &str = "venue_fetch_latency_ms";
/// Aggregation cycle duration metric name.
pub const METRIC_CYCLE_DURATION: &str = "aggregation_cycle_duration_ms";
/// Venue failures counter metric name.
pub const METRIC_VENUE_ERRORS: &str = "venue_errors_total";
/// Snapshot cache hits counter metric name.
pub const METRIC_CACHE_HITS: &str = "snapshot_cache_hits_total";
/// Snapshot cache misses counter metric name.
pub const METRIC_CACHE_MISSES: &str = "snapshot_cache_misses_total";
/// Spot opportunities counter metric name.
pub const METRIC_SPOT_OPPORTUNITIES: &str = "spot_opportunities_total";
/// Triangular opportunities counter metric name.
pub const METRIC_TRIANGULAR_OPPORTUNITIES: &str = "triangular_opportunities_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_VENUE_FETCH_LATENCY,
        "Venue order book fetch latency in milliseconds"
    );
    describe_histogram!(
        METRIC_CYCLE_DURATION,
        "Aggregation cycle duration in milliseconds"
    );

    describe_counter!(METRIC_VENUE_ERRORS, "Total venue fetch/normalize failures");
    describe_counter!(METRIC_CACHE_HITS, "Total snapshot cache hits");
    describe_counter!(METRIC_CACHE_MISSES, "Total snapshot cache misses");
    describe_counter!(
        METRIC_SPOT_OPPORTUNITIES,
        "Total spot arbitrage opportunities surfaced"
    );
    describe_counter!(
        METRIC_TRIANGULAR_OPPORTUNITIES,
        "Total triangular arbitrage opportunities surfaced"
    );

    debug!("Metrics initialized");
}

/// Record one venue's fetch latency.
pub fn record_venue_fetch_latency(venue: VenueId, latency: Duration) {
    let latency_ms = latency.as_secs_f64() * 1000.0;
    histogram!(METRIC_VENUE_FETCH_LATENCY, "venue" => venue.to_string()).record(latency_ms);
}

/// Record one aggregation cycle's duration.
pub fn record_cycle_duration(start: Instant) {
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_CYCLE_DURATION).record(elapsed_ms);
}

/// Increment the failure counter for a venue.
pub fn inc_venue_error(venue: VenueId) {
    counter!(METRIC_VENUE_ERRORS, "venue" => venue.to_string()).increment(1);
}

/// Increment the snapshot cache hit counter.
pub fn inc_cache_hit() {
    counter!(METRIC_CACHE_HITS).increment(1);
}

/// Increment the snapshot cache miss counter.
pub fn inc_cache_miss() {
    counter!(METRIC_CACHE_MISSES).increment(1);
}

/// Count surfaced spot opportunities.
pub fn inc_spot_opportunities(count: usize) {
    counter!(METRIC_SPOT_OPPORTUNITIES).increment(count as u64);
}

/// Count surfaced triangular opportunities.
pub fn inc_triangular_opportunities(count: usize) {
    counter!(METRIC_TRIANGULAR_OPPORTUNITIES).increment(count as u64);
}
