use std::collections::BTreeMap;

use futures::future::try_join_all;
use tracing::debug;
use ulid::Ulid;

use crate::limits::MAX_GRID_CELLS;
use crate::model::*;
use crate::observability::{self, Operation};

use super::availability::{duration_from_hours, find_common_slot, free_slots, validate_working_hours};
use super::conflict::{detect_conflicts, merge_conflict_results};
use super::layout::{build_time_grid, grid_cell_count, group_summary, layout_items, timeline_stats};
use super::{Engine, EngineError};

impl Engine {
    // ── Conflict detection ───────────────────────────────────

    /// Active bookings of `resource_id` that overlap `[start, end)`.
    /// `exclude` skips the booking being edited.
    pub async fn check_conflict(
        &self,
        resource_id: Ulid,
        start: Ms,
        end: Ms,
        exclude: Option<Ulid>,
    ) -> Result<ConflictResult, EngineError> {
        observability::measured(
            Operation::CheckConflict,
            self.conflicts_for(resource_id, start, end, exclude),
        )
        .await
    }

    async fn conflicts_for(
        &self,
        resource_id: Ulid,
        start: Ms,
        end: Ms,
        exclude: Option<Ulid>,
    ) -> Result<ConflictResult, EngineError> {
        let proposed = self.proposal(start, end)?;
        let bookings = self
            .store
            .fetch_bookings(resource_id, proposed, StatusFilter::Active, exclude)
            .await?;
        let result = detect_conflicts(&bookings, &proposed, exclude);
        debug!(%resource_id, conflicts = result.conflict_count, "conflict check");
        metrics::counter!(crate::observability::CONFLICTS_FOUND_TOTAL)
            .increment(result.conflict_count as u64);
        Ok(result)
    }

    /// Check a batch of proposed bookings. Entries for the same resource are
    /// merged into one result.
    pub async fn check_multiple_conflicts(
        &self,
        proposals: &[ProposedBooking],
    ) -> Result<MultiConflictReport, EngineError> {
        observability::measured(Operation::CheckMultipleConflicts, async {
            self.check_id_count(proposals.len())?;
            let mut results = Vec::with_capacity(proposals.len());
            for p in proposals {
                let result = self
                    .conflicts_for(p.resource_id, p.start, p.end, p.exclude_booking_id)
                    .await?;
                results.push((p.resource_id, result));
            }
            Ok(merge_conflict_results(results))
        })
        .await
    }

    // ── Availability ─────────────────────────────────────────

    /// Free gaps of one resource inside `[start, end)`, in order.
    pub async fn availability(
        &self,
        resource_id: Ulid,
        start: Ms,
        end: Ms,
    ) -> Result<Vec<AvailabilitySlot>, EngineError> {
        observability::measured(Operation::Availability, async {
            let window = self.window(start, end)?;
            let bookings = self
                .store
                .fetch_bookings(resource_id, window, StatusFilter::Active, None)
                .await?;
            let slots: Vec<AvailabilitySlot> = free_slots(&bookings, &window)
                .into_iter()
                .map(AvailabilitySlot::from)
                .collect();
            debug!(%resource_id, slots = slots.len(), "availability");
            Ok(slots)
        })
        .await
    }

    /// Earliest slot of `duration_hours` inside working hours where every
    /// resource is free. `working_hours` defaults to the engine config.
    pub async fn find_common_slot(
        &self,
        resource_ids: &[Ulid],
        duration_hours: f64,
        start: Ms,
        end: Ms,
        working_hours: Option<WorkingHours>,
    ) -> Result<SlotSearch, EngineError> {
        observability::measured(Operation::FindCommonSlot, async {
            let window = self.window(start, end)?;
            let duration_ms = duration_from_hours(duration_hours)?;
            let wh = validate_working_hours(working_hours.unwrap_or(self.config.working_hours))?;
            self.check_id_count(resource_ids.len())?;
            if resource_ids.is_empty() {
                return Ok(SlotSearch::from(None));
            }

            let mut busy = Vec::new();
            for &rid in resource_ids {
                let bookings = self
                    .store
                    .fetch_bookings(rid, window, StatusFilter::Active, None)
                    .await?;
                busy.extend(bookings.into_iter().map(|b| b.span));
            }

            let slot = find_common_slot(&busy, &window, duration_ms, wh).map(|(span, confidence)| {
                CommonSlot {
                    start: span.start,
                    end: span.end,
                    duration_hours: span.hours(),
                    available_resources: resource_ids.to_vec(),
                    confidence_score: confidence,
                }
            });
            let found = if slot.is_some() { "true" } else { "false" };
            metrics::counter!(crate::observability::COMMON_SLOT_SEARCHES_TOTAL, "found" => found)
                .increment(1);
            debug!(resources = resource_ids.len(), found, "common slot search");
            Ok(SlotSearch::from(slot))
        })
        .await
    }

    // ── Timeline layout ──────────────────────────────────────

    fn view(&self, start: Ms, end: Ms, unit: TimeUnit) -> Result<(Span, TimeRange), EngineError> {
        let view = self.window(start, end)?;
        if grid_cell_count(&view, unit) > MAX_GRID_CELLS {
            return Err(EngineError::LimitExceeded("time grid too large"));
        }
        Ok((view, TimeRange { start, end, unit }))
    }

    /// One resource's bookings (every status) laid out in `[start, end)`.
    pub async fn layout_resource(
        &self,
        resource_id: Ulid,
        start: Ms,
        end: Ms,
        unit: TimeUnit,
    ) -> Result<ResourceTimeline, EngineError> {
        observability::measured(Operation::LayoutResource, async {
            let (view, range) = self.view(start, end, unit)?;
            self.resource_timeline(resource_id, view, range).await
        })
        .await
    }

    async fn resource_timeline(
        &self,
        resource_id: Ulid,
        view: Span,
        range: TimeRange,
    ) -> Result<ResourceTimeline, EngineError> {
        let bookings = self
            .store
            .fetch_bookings(resource_id, view, StatusFilter::All, None)
            .await?;
        let items = layout_items(&bookings, &view);
        let stats = timeline_stats(&items, &view);
        metrics::histogram!(crate::observability::TIMELINE_ITEMS).record(items.len() as f64);
        debug!(
            %resource_id,
            items = items.len(),
            rows = stats.max_concurrent_assignments,
            "resource layout"
        );
        Ok(ResourceTimeline {
            resource_id,
            range,
            time_grid: build_time_grid(&view, range.unit),
            items,
            stats,
        })
    }

    /// Lay out an explicit set of resources side by side.
    pub async fn layout_resources(
        &self,
        resource_ids: &[Ulid],
        start: Ms,
        end: Ms,
        unit: TimeUnit,
    ) -> Result<GroupTimeline, EngineError> {
        observability::measured(
            Operation::LayoutResources,
            self.group_timeline(resource_ids, start, end, unit),
        )
        .await
    }

    /// Lay out every resource of an organization unit (e.g. a department).
    pub async fn layout_unit(
        &self,
        unit_key: &str,
        start: Ms,
        end: Ms,
        unit: TimeUnit,
    ) -> Result<GroupTimeline, EngineError> {
        observability::measured(Operation::LayoutUnit, async {
            let members = self.store.resources_in_unit(unit_key).await?;
            debug!(unit = unit_key, members = members.len(), "unit layout");
            self.group_timeline(&members, start, end, unit).await
        })
        .await
    }

    async fn group_timeline(
        &self,
        resource_ids: &[Ulid],
        start: Ms,
        end: Ms,
        unit: TimeUnit,
    ) -> Result<GroupTimeline, EngineError> {
        self.check_id_count(resource_ids.len())?;
        let (view, range) = self.view(start, end, unit)?;
        let timelines = try_join_all(
            resource_ids
                .iter()
                .map(|&rid| self.resource_timeline(rid, view, range)),
        )
        .await?;
        let stats: Vec<TimelineStats> = timelines.iter().map(|t| t.stats).collect();
        Ok(GroupTimeline {
            range,
            time_grid: build_time_grid(&view, unit),
            timelines,
            summary: group_summary(&stats),
        })
    }

    /// Every booking of one project, one lane per assigned resource.
    pub async fn layout_project(
        &self,
        group_id: Ulid,
        start: Ms,
        end: Ms,
        unit: TimeUnit,
    ) -> Result<ProjectTimeline, EngineError> {
        observability::measured(Operation::LayoutProject, async {
            let (view, range) = self.view(start, end, unit)?;
            let bookings = self.store.fetch_group_bookings(group_id, view).await?;

            let mut by_resource: BTreeMap<Ulid, Vec<Booking>> = BTreeMap::new();
            for booking in bookings {
                by_resource.entry(booking.resource_id).or_default().push(booking);
            }

            let mut lanes = Vec::with_capacity(by_resource.len());
            let mut stats = Vec::with_capacity(by_resource.len());
            for (resource_id, bookings) in by_resource {
                let items = layout_items(&bookings, &view);
                stats.push(timeline_stats(&items, &view));
                lanes.push(ProjectLane { resource_id, items });
            }
            debug!(%group_id, lanes = lanes.len(), "project layout");

            Ok(ProjectTimeline {
                group_id,
                range,
                time_grid: build_time_grid(&view, unit),
                lanes,
                summary: group_summary(&stats),
            })
        })
        .await
    }
}
