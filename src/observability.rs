use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use crate::engine::EngineError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total engine queries. Labels: operation, status.
pub const QUERIES_TOTAL: &str = "crewtime_queries_total";

/// Histogram: query latency in seconds. Labels: operation.
pub const QUERY_DURATION_SECONDS: &str = "crewtime_query_duration_seconds";

// ── Domain metrics ──────────────────────────────────────────────

/// Counter: existing bookings reported as conflicting.
pub const CONFLICTS_FOUND_TOTAL: &str = "crewtime_conflicts_found_total";

/// Histogram: timeline items produced per resource layout.
pub const TIMELINE_ITEMS: &str = "crewtime_timeline_items";

/// Counter: common-slot searches. Labels: found.
pub const COMMON_SLOT_SEARCHES_TOTAL: &str = "crewtime_common_slot_searches_total";

/// Engine entry points, used as the `operation` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CheckConflict,
    CheckMultipleConflicts,
    Availability,
    FindCommonSlot,
    LayoutResource,
    LayoutResources,
    LayoutUnit,
    LayoutProject,
}

impl Operation {
    pub fn label(&self) -> &'static str {
        match self {
            Operation::CheckConflict => "check_conflict",
            Operation::CheckMultipleConflicts => "check_multiple_conflicts",
            Operation::Availability => "availability",
            Operation::FindCommonSlot => "find_common_slot",
            Operation::LayoutResource => "layout_resource",
            Operation::LayoutResources => "layout_resources",
            Operation::LayoutUnit => "layout_unit",
            Operation::LayoutProject => "layout_project",
        }
    }
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Install the default `fmt` tracing subscriber. Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().try_init();
}

/// Run one engine operation, recording its outcome and latency.
pub(crate) async fn measured<T>(
    op: Operation,
    fut: impl Future<Output = Result<T, EngineError>>,
) -> Result<T, EngineError> {
    let started = Instant::now();
    let result = fut.await;
    let status = match &result {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(operation = op.label(), "query rejected: {e}");
            e.kind()
        }
    };
    metrics::counter!(QUERIES_TOTAL, "operation" => op.label(), "status" => status).increment(1);
    metrics::histogram!(QUERY_DURATION_SECONDS, "operation" => op.label())
        .record(started.elapsed().as_secs_f64());
    result
}
