use std::net::SocketAddr;

use crate::loader::LoadOutcome;

// ── Refresh loop ────────────────────────────────────────────────

/// Counter: refresh ticks processed (including no-op ticks).
pub const REFRESH_TICKS_TOTAL: &str = "roomwatch_refresh_ticks_total";

/// Counter: render sink invocations.
pub const RENDERS_TOTAL: &str = "roomwatch_renders_total";

/// Counter: individual room status transitions.
pub const STATUS_CHANGES_TOTAL: &str = "roomwatch_status_changes_total";

/// Gauge: rooms currently occupied.
pub const ROOMS_OCCUPIED: &str = "roomwatch_rooms_occupied";

// ── Loads ───────────────────────────────────────────────────────

/// Counter: board loads. Labels: outcome.
pub const LOADS_TOTAL: &str = "roomwatch_loads_total";

/// Histogram: board load duration in seconds.
pub const LOAD_DURATION_SECONDS: &str = "roomwatch_load_duration_seconds";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a load outcome to a short label for metrics.
pub fn outcome_label(outcome: LoadOutcome) -> &'static str {
    match outcome {
        LoadOutcome::Live => "live",
        LoadOutcome::Precomputed => "precomputed",
        LoadOutcome::Fallback => "fallback",
    }
}
