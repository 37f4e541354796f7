use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: bookings accepted and committed.
pub const BOOKINGS_CONFIRMED_TOTAL: &str = "kairos_bookings_confirmed_total";

/// Counter: bookings rejected (any reason).
pub const BOOKINGS_REJECTED_TOTAL: &str = "kairos_bookings_rejected_total";

/// Counter: availability queries served.
pub const AVAILABILITY_QUERIES_TOTAL: &str = "kairos_availability_queries_total";

/// Histogram: booking latency in seconds (admit + commit, lock held).
pub const BOOK_DURATION_SECONDS: &str = "kairos_book_duration_seconds";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
