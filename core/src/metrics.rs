//! Business metrics for reservation booking.
//!
//! Recorded through the `metrics` facade; the binary installs the exporter.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `popupmoah_reservations_total{status}` - Reservations by lifecycle outcome
//! - `popupmoah_slot_conflicts_total` - Creates/updates rejected for a taken slot
//! - `popupmoah_reservation_cache_total{result}` - Cache hits, misses and errors
//! - `popupmoah_notifications_failed_total` - Notifier failures
//! - `popupmoah_sweep_runs_total{result}` - Expiration sweep runs
//! - `popupmoah_swept_reservations_total` - Reservations cancelled by the sweep
//!
//! ## Histograms
//! - `popupmoah_sweep_duration_seconds` - Time taken by one sweep

use metrics::{describe_counter, describe_histogram};

/// Initialize and register all reservation metric descriptions.
///
/// Call once at startup, before anything is recorded.
pub fn register_reservation_metrics() {
    describe_counter!(
        "popupmoah_reservations_total",
        "Total number of reservations by status (created, confirmed, cancelled, completed, expired, deleted)"
    );
    describe_counter!(
        "popupmoah_slot_conflicts_total",
        "Reservation writes rejected because the slot is already held"
    );
    describe_counter!(
        "popupmoah_reservation_cache_total",
        "Reservation cache lookups by result (hit, miss, error)"
    );
    describe_counter!(
        "popupmoah_notifications_failed_total",
        "Reservation notifications that could not be delivered"
    );
    describe_counter!(
        "popupmoah_sweep_runs_total",
        "Expiration sweep runs by result (ok, error)"
    );
    describe_counter!(
        "popupmoah_swept_reservations_total",
        "Pending reservations cancelled because their slot time passed"
    );
    describe_histogram!(
        "popupmoah_sweep_duration_seconds",
        "Time taken by one expiration sweep"
    );

    tracing::info!("Reservation metrics registered");
}

/// Record a reservation lifecycle outcome (`created`, `confirmed`, ...).
pub fn record_reservation(status: &'static str) {
    metrics::counter!("popupmoah_reservations_total", "status" => status).increment(1);
}

/// Record a write rejected with a slot conflict.
pub fn record_slot_conflict() {
    metrics::counter!("popupmoah_slot_conflicts_total").increment(1);
}

/// Record a cache lookup result (`hit`, `miss` or `error`).
pub fn record_cache_lookup(result: &'static str) {
    metrics::counter!("popupmoah_reservation_cache_total", "result" => result).increment(1);
}

/// Record a failed notification.
pub fn record_notification_failed() {
    metrics::counter!("popupmoah_notifications_failed_total").increment(1);
}

/// Record a finished sweep.
///
/// # Arguments
///
/// * `cancelled` - Reservations the sweep cancelled
/// * `duration_secs` - Wall time of the run
pub fn record_sweep_completed(cancelled: usize, duration_secs: f64) {
    metrics::counter!("popupmoah_sweep_runs_total", "result" => "ok").increment(1);
    metrics::counter!("popupmoah_swept_reservations_total")
        .increment(u64::try_from(cancelled).unwrap_or(u64::MAX));
    metrics::histogram!("popupmoah_sweep_duration_seconds").record(duration_secs);
    tracing::debug!(cancelled, duration_secs, "Recorded sweep_completed metric");
}

/// Record a sweep that failed before completing.
pub fn record_sweep_failed() {
    metrics::counter!("popupmoah_sweep_runs_total", "result" => "error").increment(1);
}
