use std::collections::BTreeMap;

use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Build a span from caller input, rejecting empty or reversed ranges and
/// anything outside the supported timestamp range. Length is unbounded.
pub(crate) fn validate_interval(start: Ms, end: Ms) -> Result<Span, EngineError> {
    if start >= end {
        return Err(EngineError::InvalidInterval { start, end });
    }
    if start < MIN_VALID_TIMESTAMP_MS || end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    Ok(Span::new(start, end))
}

/// Like [`validate_interval`], plus a cap on how wide a scanned window may be.
pub(crate) fn validate_span(start: Ms, end: Ms, max_window_ms: Ms) -> Result<Span, EngineError> {
    let span = validate_interval(start, end)?;
    if span.duration_ms() > max_window_ms {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(span)
}

/// Overlap of two intervals in hours, never negative.
pub fn overlap_hours(a: &Span, b: &Span) -> f64 {
    ms_to_hours(a.overlap_ms(b))
}

/// Share of `proposed` covered by `existing`, 0–100. Zero-length proposals give 0.
pub fn overlap_percentage(proposed: &Span, existing: &Span) -> f64 {
    let total = proposed.duration_ms();
    if total <= 0 {
        return 0.0;
    }
    proposed.overlap_ms(existing) as f64 / total as f64 * 100.0
}

/// Compare a proposed interval against a resource's bookings.
///
/// Only active bookings that actually overlap count; `exclude` drops the
/// booking being edited so it cannot conflict with itself.
pub fn detect_conflicts(bookings: &[Booking], proposed: &Span, exclude: Option<Ulid>) -> ConflictResult {
    let mut result = ConflictResult::default();

    for booking in bookings {
        if !booking.status.is_active()
            || Some(booking.id) == exclude
            || !booking.span.overlaps(proposed)
        {
            continue;
        }
        let overlap_hours = overlap_hours(proposed, &booking.span);
        let (overlap_start, overlap_end) = match proposed.intersection(&booking.span) {
            Some(shared) => (shared.start, shared.end),
            None => continue,
        };
        result.conflicts.push(ConflictInfo {
            booking_id: booking.id,
            group_id: booking.group_id,
            conflict_start: booking.span.start,
            conflict_end: booking.span.end,
            overlap_start,
            overlap_end,
            overlap_hours,
            overlap_percentage: overlap_percentage(proposed, &booking.span),
        });
        result.total_overlap_hours += overlap_hours;
    }

    result.conflict_count = result.conflicts.len();
    result.has_conflict = result.conflict_count > 0;
    result
}

/// Fold per-entry results into one report. A resource seen again is merged
/// into its first result rather than replacing it.
pub fn merge_conflict_results(
    entries: impl IntoIterator<Item = (Ulid, ConflictResult)>,
) -> MultiConflictReport {
    let mut details: BTreeMap<Ulid, ConflictResult> = BTreeMap::new();
    for (resource_id, result) in entries {
        match details.get_mut(&resource_id) {
            Some(existing) => existing.absorb(result),
            None => {
                details.insert(resource_id, result);
            }
        }
    }

    let total_resources = details.len();
    let resources_with_conflicts = details.values().filter(|r| r.has_conflict).count();
    let conflict_rate = if total_resources == 0 {
        0.0
    } else {
        resources_with_conflicts as f64 / total_resources as f64
    };

    MultiConflictReport {
        total_resources,
        resources_with_conflicts,
        conflict_rate,
        details,
    }
}

/// Write-side guard: fail on the first active booking overlapping `span`.
pub(crate) fn check_no_conflict(
    rs: &ResourceState,
    span: &Span,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    for booking in rs.overlapping(span) {
        if booking.status.is_active() && Some(booking.id) != exclude {
            return Err(EngineError::Conflict(booking.id));
        }
    }
    Ok(())
}
