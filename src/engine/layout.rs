//! Timeline layout: time grids, clipping bookings into a view window, and
//! packing overlapping items into display rows.

use chrono::{DateTime, Datelike, Utc, Weekday};

use crate::model::*;

// ── Time grid ─────────────────────────────────────────────────────

/// Number of cells `build_time_grid` will produce.
pub fn grid_cell_count(window: &Span, unit: TimeUnit) -> usize {
    let width = unit.width_ms();
    ((window.duration_ms() + width - 1) / width).max(0) as usize
}

/// Bucket `window` into consecutive cells of `unit` width. The last cell is
/// cut at `window.end`.
pub fn build_time_grid(window: &Span, unit: TimeUnit) -> Vec<TimeGridCell> {
    let width = unit.width_ms();
    let mut grid = Vec::with_capacity(grid_cell_count(window, unit));
    let mut cursor = window.start;
    while cursor < window.end {
        let end = (cursor + width).min(window.end);
        let (label, is_weekend) = match DateTime::<Utc>::from_timestamp_millis(cursor) {
            Some(at) => (cell_label(&at, unit), unit != TimeUnit::Week && is_weekend(&at)),
            None => (cursor.to_string(), false),
        };
        grid.push(TimeGridCell {
            start: cursor,
            end,
            label,
            is_weekend,
        });
        cursor += width;
    }
    grid
}

fn cell_label(at: &DateTime<Utc>, unit: TimeUnit) -> String {
    match unit {
        TimeUnit::Hour => at.format("%H:%M").to_string(),
        TimeUnit::Day => at.format("%m/%d").to_string(),
        TimeUnit::Week => format!("W{:02}", at.iso_week().week()),
    }
}

fn is_weekend(at: &DateTime<Utc>) -> bool {
    matches!(at.weekday(), Weekday::Sat | Weekday::Sun)
}

// ── Items ─────────────────────────────────────────────────────────

fn percent_of(part: Ms, whole: Ms) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

/// Clip a booking to the view window. Row is left at 0.
/// Returns `None` when nothing of the booking is visible.
pub fn clip_to_view(booking: &Booking, view: &Span) -> Option<TimelineItem> {
    let visible = booking.span.intersection(view)?;
    let total = view.duration_ms();
    Some(TimelineItem {
        booking_id: booking.id,
        group_id: booking.group_id,
        label: booking.label.clone(),
        start: booking.span.start,
        end: booking.span.end,
        actual_start: visible.start,
        actual_end: visible.end,
        status: booking.status,
        duration_hours: visible.hours(),
        is_partial: booking.span.start < view.start || booking.span.end > view.end,
        layout: ItemLayout {
            start_percentage: percent_of(visible.start - view.start, total),
            width_percentage: percent_of(visible.duration_ms(), total),
            row: 0,
        },
    })
}

/// Greedy first-fit row packing.
///
/// Spans are visited by start time; each goes to the lowest row whose last
/// span ends at or before its start, otherwise a new row opens. The number
/// of rows equals the peak number of simultaneously active spans.
/// The result is indexed like the input.
pub fn assign_rows(spans: &[Span]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by_key(|&i| spans[i].start);

    let mut row_ends: Vec<Ms> = Vec::new();
    let mut rows = vec![0; spans.len()];
    for i in order {
        let span = &spans[i];
        let row = match row_ends.iter().position(|&end| end <= span.start) {
            Some(row) => {
                row_ends[row] = span.end;
                row
            }
            None => {
                row_ends.push(span.end);
                row_ends.len() - 1
            }
        };
        rows[i] = row;
    }
    rows
}

/// Clip, pack and sort bookings for display in `view`. Every status is kept.
pub fn layout_items(bookings: &[Booking], view: &Span) -> Vec<TimelineItem> {
    let mut items: Vec<TimelineItem> = bookings
        .iter()
        .filter_map(|b| clip_to_view(b, view))
        .collect();
    let spans: Vec<Span> = items.iter().map(TimelineItem::actual_span).collect();
    for (item, row) in items.iter_mut().zip(assign_rows(&spans)) {
        item.layout.row = row;
    }
    items.sort_by_key(|item| item.actual_start);
    items
}

// ── Statistics ────────────────────────────────────────────────────

pub fn timeline_stats(items: &[TimelineItem], view: &Span) -> TimelineStats {
    let total_hours = ms_to_hours(view.duration_ms());
    let assigned_hours: f64 = items.iter().map(|i| i.duration_hours).sum();
    let utilization_rate = if total_hours > 0.0 {
        assigned_hours / total_hours * 100.0
    } else {
        0.0
    };
    TimelineStats {
        total_hours,
        assigned_hours,
        utilization_rate,
        assignment_count: items.len(),
        max_concurrent_assignments: items.iter().map(|i| i.layout.row + 1).max().unwrap_or(0),
    }
}

/// Roll per-resource stats into one summary. Averages are 0 for an empty group.
pub fn group_summary(stats: &[TimelineStats]) -> GroupSummary {
    let total_resources = stats.len();
    let total_assignments = stats.iter().map(|s| s.assignment_count).sum();
    let total_hours: f64 = stats.iter().map(|s| s.assigned_hours).sum();
    let (average_hours_per_resource, average_utilization) = if total_resources == 0 {
        (0.0, 0.0)
    } else {
        let n = total_resources as f64;
        (
            total_hours / n,
            stats.iter().map(|s| s.utilization_rate).sum::<f64>() / n,
        )
    };
    GroupSummary {
        total_resources,
        total_assignments,
        total_hours,
        average_hours_per_resource,
        average_utilization,
    }
}

#[cfg(test)]
mod tests {
    use ulid::Ulid;

    use super::*;
    use crate::engine::availability::peak_concurrency;

    const H: Ms = HOUR_MS;
    const M: Ms = 60_000;
    /// 2024-01-06T00:00:00Z, a Saturday.
    const SAT: Ms = 1_704_499_200_000;

    fn booking(start: Ms, end: Ms) -> Booking {
        Booking::new(Ulid::new(), Ulid::new(), Span::new(start, end))
    }

    #[test]
    fn hourly_grid_labels_and_truncation() {
        let grid = build_time_grid(&Span::new(SAT, SAT + 2 * H + 30 * M), TimeUnit::Hour);
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[0].label, "00:00");
        assert_eq!(grid[1].label, "01:00");
        assert_eq!(grid[2].end, SAT + 2 * H + 30 * M);
        assert!(grid.iter().all(|c| c.is_weekend));
        assert_eq!(grid_cell_count(&Span::new(SAT, SAT + 2 * H + 30 * M), TimeUnit::Hour), 3);
    }

    #[test]
    fn daily_grid_marks_weekend() {
        let grid = build_time_grid(&Span::new(SAT, SAT + 3 * DAY_MS), TimeUnit::Day);
        let labels: Vec<&str> = grid.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["01/06", "01/07", "01/08"]);
        let weekend: Vec<bool> = grid.iter().map(|c| c.is_weekend).collect();
        assert_eq!(weekend, [true, true, false]);
    }

    #[test]
    fn weekly_grid_never_weekend() {
        let grid = build_time_grid(&Span::new(SAT, SAT + 10 * DAY_MS), TimeUnit::Week);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0].label, "W01");
        assert_eq!(grid[1].label, "W02");
        assert_eq!(grid[1].end, SAT + 10 * DAY_MS);
        assert!(grid.iter().all(|c| !c.is_weekend));
    }

    #[test]
    fn clip_computes_percentages() {
        let item = clip_to_view(&booking(6 * H, 12 * H), &Span::new(0, 12 * H)).unwrap();
        assert_eq!(item.layout.start_percentage, 50.0);
        assert_eq!(item.layout.width_percentage, 50.0);
        assert!(!item.is_partial);
        assert_eq!(item.duration_hours, 6.0);
    }

    #[test]
    fn clip_marks_partial_and_drops_invisible() {
        let view = Span::new(10 * H, 20 * H);
        let item = clip_to_view(&booking(8 * H, 12 * H), &view).unwrap();
        assert!(item.is_partial);
        assert_eq!(item.actual_start, 10 * H);
        assert_eq!(item.start, 8 * H);
        assert_eq!(item.layout.start_percentage, 0.0);
        assert_eq!(item.layout.width_percentage, 20.0);

        assert!(clip_to_view(&booking(0, 10 * H), &view).is_none());
        assert!(clip_to_view(&booking(20 * H, 22 * H), &view).is_none());
    }

    #[test]
    fn rows_for_two_overlapping() {
        let rows = assign_rows(&[Span::new(8 * H, 12 * H), Span::new(10 * H, 14 * H)]);
        assert_eq!(rows, vec![0, 1]);
    }

    #[test]
    fn rows_reuse_freed_row() {
        let spans = [
            Span::new(0, 10),
            Span::new(5, 15),
            Span::new(10, 20), // fits after the first
            Span::new(12, 18),
        ];
        assert_eq!(assign_rows(&spans), vec![0, 1, 0, 2]);
    }

    #[test]
    fn rows_indexed_like_input() {
        let spans = [Span::new(50, 60), Span::new(0, 100)];
        assert_eq!(assign_rows(&spans), vec![1, 0]);
    }

    #[test]
    fn row_count_matches_peak_concurrency() {
        let cases: Vec<Vec<Span>> = vec![
            vec![],
            vec![Span::new(0, 10)],
            vec![Span::new(0, 10), Span::new(10, 20), Span::new(20, 30)],
            vec![Span::new(0, 100), Span::new(10, 20), Span::new(15, 25), Span::new(18, 19)],
            vec![
                Span::new(5, 9),
                Span::new(0, 3),
                Span::new(2, 6),
                Span::new(8, 12),
                Span::new(1, 4),
                Span::new(11, 13),
            ],
        ];
        for spans in cases {
            let rows = assign_rows(&spans);
            let used = rows.iter().map(|r| r + 1).max().unwrap_or(0);
            assert_eq!(used, peak_concurrency(&spans), "spans: {spans:?}");
            for (i, a) in spans.iter().enumerate() {
                for (j, b) in spans.iter().enumerate() {
                    if i != j && rows[i] == rows[j] {
                        assert!(!a.overlaps(b));
                    }
                }
            }
        }
    }

    #[test]
    fn layout_sorts_and_keeps_all_statuses() {
        let view = Span::new(0, 24 * H);
        let bookings = [
            booking(10 * H, 14 * H).with_status(BookingStatus::Cancelled),
            booking(8 * H, 12 * H),
        ];
        let items = layout_items(&bookings, &view);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].actual_start, 8 * H);
        assert_eq!(items[0].layout.row, 0);
        assert_eq!(items[1].status, BookingStatus::Cancelled);
        assert_eq!(items[1].layout.row, 1);

        let stats = timeline_stats(&items, &view);
        assert_eq!(stats.assignment_count, 2);
        assert_eq!(stats.assigned_hours, 8.0);
        assert_eq!(stats.max_concurrent_assignments, 2);
        assert!((stats.utilization_rate - 8.0 / 24.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_stats_and_summary() {
        let stats = timeline_stats(&[], &Span::new(0, H));
        assert_eq!(stats.max_concurrent_assignments, 0);
        assert_eq!(stats.utilization_rate, 0.0);

        let summary = group_summary(&[]);
        assert_eq!(summary.total_resources, 0);
        assert_eq!(summary.average_hours_per_resource, 0.0);
        assert_eq!(summary.average_utilization, 0.0);
    }

    #[test]
    fn summary_averages() {
        let a = TimelineStats {
            total_hours: 10.0,
            assigned_hours: 5.0,
            utilization_rate: 50.0,
            assignment_count: 2,
            max_concurrent_assignments: 1,
        };
        let b = TimelineStats {
            assigned_hours: 1.0,
            utilization_rate: 10.0,
            assignment_count: 1,
            ..a
        };
        let summary = group_summary(&[a, b]);
        assert_eq!(summary.total_resources, 2);
        assert_eq!(summary.total_assignments, 3);
        assert_eq!(summary.total_hours, 6.0);
        assert_eq!(summary.average_hours_per_resource, 3.0);
        assert_eq!(summary.average_utilization, 30.0);
    }
}
