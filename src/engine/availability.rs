use crate::model::*;

use super::EngineError;

// ── Availability Algorithm ────────────────────────────────────────

/// Free gaps of one resource inside `window`.
///
/// Sweeps a cursor from `window.start` over the active bookings in start
/// order. Advancing with `max` means overlapping or nested bookings never
/// reopen a gap that an earlier booking already covers.
pub fn free_slots(bookings: &[Booking], window: &Span) -> Vec<Span> {
    let mut busy: Vec<Span> = bookings
        .iter()
        .filter(|b| b.status.is_active() && b.span.overlaps(window))
        .map(|b| b.span)
        .collect();
    busy.sort_by_key(|s| s.start);

    let mut free = Vec::new();
    let mut cursor = window.start;
    for span in &busy {
        if cursor < span.start {
            free.push(Span::new(cursor, span.start.min(window.end)));
        }
        cursor = cursor.max(span.end);
    }
    if cursor < window.end {
        free.push(Span::new(cursor, window.end));
    }
    free
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end {
                last.end = last.end.max(span.end);
                continue;
            }
        merged.push(span);
    }
    merged
}

/// Remove sorted, disjoint `to_remove` spans from sorted `base` spans.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}

/// Sweep-line: the largest number of spans active at one instant.
/// Ends sort before starts at the same instant, so touching spans don't stack.
pub fn peak_concurrency(spans: &[Span]) -> usize {
    let mut events: Vec<(Ms, i32)> = Vec::with_capacity(spans.len() * 2);
    for s in spans {
        events.push((s.start, 1));
        events.push((s.end, -1));
    }
    events.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut count: i32 = 0;
    let mut peak: i32 = 0;
    for (_, delta) in &events {
        count += delta;
        peak = peak.max(count);
    }
    peak as usize
}

// ── Common slot search ───────────────────────────────────────────

pub(crate) fn validate_working_hours(wh: WorkingHours) -> Result<WorkingHours, EngineError> {
    if wh.start_hour >= wh.end_hour || wh.end_hour > 24 {
        return Err(EngineError::InvalidWorkingHours {
            start_hour: wh.start_hour,
            end_hour: wh.end_hour,
        });
    }
    Ok(wh)
}

/// Convert a requested length in hours to ms, rejecting non-positive values.
pub(crate) fn duration_from_hours(hours: f64) -> Result<Ms, EngineError> {
    if !hours.is_finite() || hours <= 0.0 {
        return Err(EngineError::InvalidDuration(hours));
    }
    let ms = (hours * HOUR_MS as f64).round() as Ms;
    if ms <= 0 {
        return Err(EngineError::InvalidDuration(hours));
    }
    Ok(ms)
}

/// Per-day working windows (UTC days) clipped to `window`, in order.
/// Round-the-clock hours give touching spans; callers merge them.
pub fn working_windows(window: &Span, wh: WorkingHours) -> Vec<Span> {
    let open = wh.start_hour as Ms * HOUR_MS;
    let close = wh.end_hour as Ms * HOUR_MS;

    let mut out = Vec::new();
    let mut day = window.start.div_euclid(DAY_MS) * DAY_MS;
    while day < window.end {
        let shift = Span::new(day + open, day + close);
        if let Some(clipped) = shift.intersection(window) {
            out.push(clipped);
        }
        day += DAY_MS;
    }
    out
}

/// Earliest interval of `duration_ms` inside working hours where none of the
/// `busy` spans (from every resource, any order) are active.
///
/// Returns the chosen slot and its confidence score.
pub fn find_common_slot(
    busy: &[Span],
    window: &Span,
    duration_ms: Ms,
    wh: WorkingHours,
) -> Option<(Span, f64)> {
    let mut sorted = busy.to_vec();
    sorted.sort_by_key(|s| s.start);
    let union = merge_overlapping(&sorted);

    let open = merge_overlapping(&working_windows(window, wh));
    let free = subtract_intervals(&open, &union);
    let run = free.into_iter().find(|s| s.duration_ms() >= duration_ms)?;
    let slot = Span::new(run.start, run.start + duration_ms);
    Some((slot, slot_confidence(&run, duration_ms, window, wh)))
}

/// Fit quality of a slot taken from the free run `run`.
///
/// Roomy runs score higher than exact fits; runs truncated by the search
/// window (not by a booking or the working day) lose 0.1 because the real
/// free time around them is unknown. Always within `[0, 1]`.
pub fn slot_confidence(run: &Span, duration_ms: Ms, window: &Span, wh: WorkingHours) -> f64 {
    let run_len = run.duration_ms();
    if run_len <= 0 {
        return 0.0;
    }
    let slack = (run_len - duration_ms).max(0) as f64 / run_len as f64;
    let mut score = 0.6 + 0.4 * slack;

    let open = wh.start_hour as Ms * HOUR_MS;
    let close = wh.end_hour as Ms * HOUR_MS;
    let cut_at_start = run.start == window.start && run.start.rem_euclid(DAY_MS) != open;
    let cut_at_end = run.end == window.end && run.end.rem_euclid(DAY_MS) != close % DAY_MS;
    if cut_at_start || cut_at_end {
        score -= 0.1;
    }
    score.clamp(0.0, 1.0)
}
