use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, UTC.
pub type Ms = i64;

pub const HOUR_MS: Ms = 3_600_000;
pub const DAY_MS: Ms = 24 * HOUR_MS;
pub const WEEK_MS: Ms = 7 * DAY_MS;

/// Convert a millisecond duration to fractional hours.
pub fn ms_to_hours(ms: Ms) -> f64 {
    ms as f64 / HOUR_MS as f64
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn hours(&self) -> f64 {
        ms_to_hours(self.duration_ms())
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The shared part of two spans, `None` when they only touch or are apart.
    pub fn intersection(&self, other: &Span) -> Option<Span> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then(|| Span::new(start, end))
    }

    /// Overlap length in ms, clamped to zero. Symmetric.
    pub fn overlap_ms(&self, other: &Span) -> Ms {
        (self.end.min(other.end) - self.start.max(other.start)).max(0)
    }
}

/// Lifecycle of an assignment. Only `Booked` and `InProgress` hold a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Booked,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Booked | BookingStatus::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Booked => "booked",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which bookings a store query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    /// `booked` and `in_progress` only. Used by conflict checks.
    Active,
    /// Every status. Used by timelines.
    All,
}

impl StatusFilter {
    pub fn admits(&self, status: BookingStatus) -> bool {
        match self {
            StatusFilter::Active => status.is_active(),
            StatusFilter::All => true,
        }
    }
}

/// An employee's assignment to a project task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub resource_id: Ulid,
    /// Project the assignment belongs to.
    pub group_id: Ulid,
    pub span: Span,
    pub status: BookingStatus,
    pub label: Option<String>,
}

impl Booking {
    pub fn new(resource_id: Ulid, group_id: Ulid, span: Span) -> Self {
        Self {
            id: Ulid::new(),
            resource_id,
            group_id,
            span,
            status: BookingStatus::Booked,
            label: None,
        }
    }

    pub fn with_status(mut self, status: BookingStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Per-resource booking list kept by the in-memory store.
#[derive(Debug, Clone)]
pub struct ResourceState {
    pub id: Ulid,
    /// Organization unit (department) the resource belongs to.
    pub unit: Option<String>,
    /// Inactive resources keep their bookings but drop out of unit listings.
    pub active: bool,
    /// All bookings, sorted by `span.start`.
    pub bookings: Vec<Booking>,
}

impl ResourceState {
    pub fn new(id: Ulid, unit: Option<String>) -> Self {
        Self {
            id,
            unit,
            active: true,
            bookings: Vec::new(),
        }
    }

    /// Insert booking maintaining sort order by span.start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .partition_point(|b| b.span.start <= booking.span.start);
        self.bookings.insert(pos, booking);
    }

    /// Remove booking by id.
    pub fn remove_booking(&mut self, id: Ulid) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn booking_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    /// Return only bookings whose span overlaps the query window.
    /// Uses binary search to skip bookings starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.span.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.span.end > query.start)
    }
}

// ── Query result types ───────────────────────────────────────────

/// One existing booking that collides with a proposed interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictInfo {
    pub booking_id: Ulid,
    pub group_id: Ulid,
    pub conflict_start: Ms,
    pub conflict_end: Ms,
    pub overlap_start: Ms,
    pub overlap_end: Ms,
    pub overlap_hours: f64,
    /// Share of the proposed interval that is covered, 0–100.
    pub overlap_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ConflictResult {
    pub has_conflict: bool,
    pub conflict_count: usize,
    pub conflicts: Vec<ConflictInfo>,
    pub total_overlap_hours: f64,
}

impl ConflictResult {
    /// Fold another result for the same resource into this one.
    pub fn absorb(&mut self, other: ConflictResult) {
        self.has_conflict |= other.has_conflict;
        self.conflict_count += other.conflict_count;
        self.total_overlap_hours += other.total_overlap_hours;
        self.conflicts.extend(other.conflicts);
    }
}

/// A proposed assignment for batch conflict checks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProposedBooking {
    pub resource_id: Ulid,
    pub start: Ms,
    pub end: Ms,
    #[serde(default)]
    pub exclude_booking_id: Option<Ulid>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MultiConflictReport {
    pub total_resources: usize,
    pub resources_with_conflicts: usize,
    pub conflict_rate: f64,
    pub details: BTreeMap<Ulid, ConflictResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AvailabilitySlot {
    pub start: Ms,
    pub end: Ms,
    pub duration_hours: f64,
}

impl From<Span> for AvailabilitySlot {
    fn from(span: Span) -> Self {
        Self {
            start: span.start,
            end: span.end,
            duration_hours: span.hours(),
        }
    }
}

/// Daily working window, whole hours in `[0, 24]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start_hour: 8,
            end_hour: 18,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommonSlot {
    pub start: Ms,
    pub end: Ms,
    pub duration_hours: f64,
    pub available_resources: Vec<Ulid>,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotSearch {
    pub found: bool,
    pub slot: Option<CommonSlot>,
}

impl From<Option<CommonSlot>> for SlotSearch {
    fn from(slot: Option<CommonSlot>) -> Self {
        Self {
            found: slot.is_some(),
            slot,
        }
    }
}

/// Granularity of a timeline grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Hour,
    #[default]
    Day,
    Week,
}

impl TimeUnit {
    pub fn width_ms(&self) -> Ms {
        match self {
            TimeUnit::Hour => HOUR_MS,
            TimeUnit::Day => DAY_MS,
            TimeUnit::Week => WEEK_MS,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = std::convert::Infallible;

    /// Unknown units fall back to `Day`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "hour" => TimeUnit::Hour,
            "week" => TimeUnit::Week,
            _ => TimeUnit::Day,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeGridCell {
    pub start: Ms,
    pub end: Ms,
    pub label: String,
    pub is_weekend: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ItemLayout {
    pub start_percentage: f64,
    pub width_percentage: f64,
    pub row: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineItem {
    pub booking_id: Ulid,
    pub group_id: Ulid,
    pub label: Option<String>,
    pub start: Ms,
    pub end: Ms,
    pub actual_start: Ms,
    pub actual_end: Ms,
    pub status: BookingStatus,
    pub duration_hours: f64,
    pub is_partial: bool,
    pub layout: ItemLayout,
}

impl TimelineItem {
    pub fn actual_span(&self) -> Span {
        Span::new(self.actual_start, self.actual_end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TimelineStats {
    pub total_hours: f64,
    pub assigned_hours: f64,
    pub utilization_rate: f64,
    pub assignment_count: usize,
    pub max_concurrent_assignments: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: Ms,
    pub end: Ms,
    pub unit: TimeUnit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceTimeline {
    pub resource_id: Ulid,
    pub range: TimeRange,
    pub time_grid: Vec<TimeGridCell>,
    pub items: Vec<TimelineItem>,
    pub stats: TimelineStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct GroupSummary {
    pub total_resources: usize,
    pub total_assignments: usize,
    pub total_hours: f64,
    pub average_hours_per_resource: f64,
    pub average_utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTimeline {
    pub range: TimeRange,
    pub time_grid: Vec<TimeGridCell>,
    pub timelines: Vec<ResourceTimeline>,
    pub summary: GroupSummary,
}

/// One resource's row block inside a project timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectLane {
    pub resource_id: Ulid,
    pub items: Vec<TimelineItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectTimeline {
    pub group_id: Ulid,
    pub range: TimeRange,
    pub time_grid: Vec<TimeGridCell>,
    pub lanes: Vec<ProjectLane>,
    pub summary: GroupSummary,
}
