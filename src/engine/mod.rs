mod availability;
mod conflict;
mod error;
mod layout;
mod queries;
mod store;

pub use availability::{
    find_common_slot, free_slots, merge_overlapping, peak_concurrency, slot_confidence,
    subtract_intervals, working_windows,
};
pub use conflict::{detect_conflicts, merge_conflict_results, overlap_hours, overlap_percentage};
pub use error::EngineError;
pub use layout::{
    assign_rows, build_time_grid, clip_to_view, grid_cell_count, group_summary, layout_items,
    timeline_stats,
};
pub use store::{BookingStore, InMemoryStore};

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::EngineConfig;
use crate::model::*;

pub type SharedResourceState = Arc<RwLock<ResourceState>>;

/// Conflict detection and timeline layout over a booking store.
///
/// Every query reads a snapshot from the store and then runs synchronous,
/// side-effect free algorithms over it. Nothing is cached between calls.
pub struct Engine {
    store: Arc<dyn BookingStore>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(store: Arc<dyn BookingStore>, config: EngineConfig) -> Self {
        tracing::info!(
            working_hours = ?config.working_hours,
            max_query_window_ms = config.max_query_window_ms,
            max_resource_ids = config.max_resource_ids,
            "engine ready"
        );
        Self { store, config }
    }

    /// Engine backed by a fresh in-memory store. The store handle is returned
    /// for seeding resources and bookings.
    pub fn in_memory(config: EngineConfig) -> (Self, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (Self::new(store.clone(), config), store)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A proposed booking. Any length is accepted.
    pub(super) fn proposal(&self, start: Ms, end: Ms) -> Result<Span, EngineError> {
        conflict::validate_interval(start, end)
    }

    /// A window to scan. Width is capped by `max_query_window_ms`.
    pub(super) fn window(&self, start: Ms, end: Ms) -> Result<Span, EngineError> {
        conflict::validate_span(start, end, self.config.max_query_window_ms)
    }

    pub(super) fn check_id_count(&self, n: usize) -> Result<(), EngineError> {
        if n > self.config.max_resource_ids {
            return Err(EngineError::LimitExceeded("too many resource IDs"));
        }
        Ok(())
    }
}
