use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: bookings committed. Labels: status.
pub const BOOKINGS_CREATED_TOTAL: &str = "wotespace_bookings_created_total";

/// Counter: rejected admissions. Labels: code.
pub const ADMISSION_REJECTED_TOTAL: &str = "wotespace_admission_rejected_total";

/// Histogram: admission latency in seconds.
pub const ADMISSION_DURATION_SECONDS: &str = "wotespace_admission_duration_seconds";

/// Counter: availability checks. Labels: available.
pub const AVAILABILITY_CHECKS_TOTAL: &str = "wotespace_availability_checks_total";

/// Counter: status transitions. Labels: to.
pub const STATUS_TRANSITIONS_TOTAL: &str = "wotespace_status_transitions_total";

/// Counter: bookings moved to COMPLETED by the sweep.
pub const BOOKINGS_COMPLETED_TOTAL: &str = "wotespace_bookings_completed_total";

/// Counter: confirmations that could not be delivered.
pub const NOTIFICATION_FAILURES_TOTAL: &str = "wotespace_notification_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL append + fsync duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "wotespace_wal_flush_duration_seconds";

/// Install the Prometheus exporter on `port`. No-op if `port` is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
