use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

use super::conflict::check_no_conflict;
use super::{EngineError, SharedResourceState};

/// Where the engine reads bookings from. Results are ordered by start.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Bookings of one resource overlapping `window` that pass `filter`,
    /// minus `exclude`. Unknown resources are `NotFound`.
    async fn fetch_bookings(
        &self,
        resource_id: Ulid,
        window: Span,
        filter: StatusFilter,
        exclude: Option<Ulid>,
    ) -> Result<Vec<Booking>, EngineError>;

    /// Bookings of any status belonging to one project, across resources.
    async fn fetch_group_bookings(&self, group_id: Ulid, window: Span) -> Result<Vec<Booking>, EngineError>;

    /// Resources belonging to an organization unit such as a department.
    async fn resources_in_unit(&self, unit: &str) -> Result<Vec<Ulid>, EngineError>;
}

/// Reference store keeping every resource's bookings in memory.
///
/// Each resource sits behind its own lock, so writes to one resource are
/// serialized while other resources stay readable.
pub struct InMemoryStore {
    resources: DashMap<Ulid, SharedResourceState>,
    booking_to_resource: DashMap<Ulid, Ulid>,
    units: DashMap<String, Vec<Ulid>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
            booking_to_resource: DashMap::new(),
            units: DashMap::new(),
        }
    }

    // ── Resource CRUD ────────────────────────────────────────

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn get_resource(&self, id: &Ulid) -> Option<SharedResourceState> {
        self.resources.get(id).map(|e| e.value().clone())
    }

    /// Register a resource, optionally as a member of an organization unit.
    /// The id slot is claimed atomically, so concurrent creates of one id
    /// admit exactly one.
    pub fn create_resource(&self, id: Ulid, unit: Option<String>) -> Result<(), EngineError> {
        match self.resources.entry(id) {
            Entry::Occupied(_) => Err(EngineError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                if let Some(ref key) = unit {
                    self.units.entry(key.clone()).or_default().push(id);
                }
                slot.insert(Arc::new(RwLock::new(ResourceState::new(id, unit))));
                Ok(())
            }
        }
    }

    /// Inactive resources stay queryable by id but are left out of
    /// `resources_in_unit`.
    pub async fn set_active(&self, id: Ulid, active: bool) -> Result<(), EngineError> {
        let rs = self.get_resource(&id).ok_or(EngineError::NotFound(id))?;
        rs.write().await.active = active;
        Ok(())
    }

    pub fn resource_ids(&self) -> Vec<Ulid> {
        self.resources.iter().map(|e| *e.key()).collect()
    }

    // ── Bookings ─────────────────────────────────────────────

    pub fn resource_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_resource.get(booking_id).map(|e| *e.value())
    }

    /// Store a booking as-is, without any conflict check.
    pub async fn insert_booking(&self, booking: Booking) -> Result<(), EngineError> {
        let rs = self
            .get_resource(&booking.resource_id)
            .ok_or(EngineError::NotFound(booking.resource_id))?;
        let mut guard = rs.write().await;
        self.index_and_insert(&mut guard, booking)
    }

    /// Store a booking only if no active booking on the same resource
    /// overlaps it. Check and insert happen under one write lock, so two
    /// concurrent `book` calls for the same slot cannot both succeed.
    pub async fn book(&self, booking: Booking) -> Result<(), EngineError> {
        let rs = self
            .get_resource(&booking.resource_id)
            .ok_or(EngineError::NotFound(booking.resource_id))?;
        let mut guard = rs.write().await;
        if booking.status.is_active() {
            check_no_conflict(&guard, &booking.span, None)?;
        }
        self.index_and_insert(&mut guard, booking)
    }

    fn index_and_insert(&self, rs: &mut ResourceState, booking: Booking) -> Result<(), EngineError> {
        if self.booking_to_resource.contains_key(&booking.id) {
            return Err(EngineError::AlreadyExists(booking.id));
        }
        self.booking_to_resource.insert(booking.id, rs.id);
        rs.insert_booking(booking);
        Ok(())
    }

    pub async fn set_status(&self, booking_id: Ulid, status: BookingStatus) -> Result<(), EngineError> {
        let rs = self.resolve_booking(&booking_id)?;
        let mut guard = rs.write().await;
        let booking = guard
            .booking_mut(booking_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        booking.status = status;
        Ok(())
    }

    pub async fn remove_booking(&self, booking_id: Ulid) -> Result<Booking, EngineError> {
        let rs = self.resolve_booking(&booking_id)?;
        let mut guard = rs.write().await;
        let removed = guard
            .remove_booking(booking_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        self.booking_to_resource.remove(&booking_id);
        Ok(removed)
    }

    fn resolve_booking(&self, booking_id: &Ulid) -> Result<SharedResourceState, EngineError> {
        let resource_id = self
            .resource_for_booking(booking_id)
            .ok_or(EngineError::NotFound(*booking_id))?;
        self.get_resource(&resource_id)
            .ok_or(EngineError::NotFound(resource_id))
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn fetch_bookings(
        &self,
        resource_id: Ulid,
        window: Span,
        filter: StatusFilter,
        exclude: Option<Ulid>,
    ) -> Result<Vec<Booking>, EngineError> {
        let rs = self
            .get_resource(&resource_id)
            .ok_or(EngineError::NotFound(resource_id))?;
        let guard = rs.read().await;
        Ok(guard
            .overlapping(&window)
            .filter(|b| filter.admits(b.status) && Some(b.id) != exclude)
            .cloned()
            .collect())
    }

    async fn fetch_group_bookings(&self, group_id: Ulid, window: Span) -> Result<Vec<Booking>, EngineError> {
        let handles: Vec<SharedResourceState> =
            self.resources.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::new();
        for rs in handles {
            let guard = rs.read().await;
            out.extend(
                guard
                    .overlapping(&window)
                    .filter(|b| b.group_id == group_id)
                    .cloned(),
            );
        }
        out.sort_by_key(|b| (b.span.start, b.resource_id));
        Ok(out)
    }

    async fn resources_in_unit(&self, unit: &str) -> Result<Vec<Ulid>, EngineError> {
        let members = self
            .units
            .get(unit)
            .map(|e| e.value().clone())
            .ok_or_else(|| EngineError::UnitNotFound(unit.to_string()))?;
        let mut active = Vec::with_capacity(members.len());
        for id in members {
            if let Some(rs) = self.get_resource(&id)
                && rs.read().await.active
            {
                active.push(id);
            }
        }
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: Ms = HOUR_MS;

    fn store_with_resource() -> (InMemoryStore, Ulid) {
        let store = InMemoryStore::new();
        let rid = Ulid::new();
        store.create_resource(rid, Some("eng".into())).unwrap();
        (store, rid)
    }

    #[tokio::test]
    async fn duplicate_resource_rejected() {
        let (store, rid) = store_with_resource();
        assert_eq!(
            store.create_resource(rid, None),
            Err(EngineError::AlreadyExists(rid))
        );
        assert_eq!(store.resource_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_of_one_id_admit_one() {
        let store = Arc::new(InMemoryStore::new());
        let rid = Ulid::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.create_resource(rid, Some("eng".into()))
            }));
        }
        let mut ok = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.resources_in_unit("eng").await.unwrap(), vec![rid]);
    }

    #[tokio::test]
    async fn inactive_resources_leave_unit_listing() {
        let store = InMemoryStore::new();
        let (a, b) = (Ulid::new(), Ulid::new());
        store.create_resource(a, Some("eng".into())).unwrap();
        store.create_resource(b, Some("eng".into())).unwrap();

        store.set_active(a, false).await.unwrap();
        assert_eq!(store.resources_in_unit("eng").await.unwrap(), vec![b]);
        let still_there = store
            .fetch_bookings(a, Span::new(0, H), StatusFilter::All, None)
            .await;
        assert!(still_there.is_ok());

        store.set_active(a, true).await.unwrap();
        assert_eq!(store.resources_in_unit("eng").await.unwrap(), vec![a, b]);

        store.set_active(b, false).await.unwrap();
        store.set_active(a, false).await.unwrap();
        assert!(store.resources_in_unit("eng").await.unwrap().is_empty());

        let ghost = Ulid::new();
        assert_eq!(store.set_active(ghost, true).await, Err(EngineError::NotFound(ghost)));
    }

    #[tokio::test]
    async fn fetch_filters_status_window_and_exclusion() {
        let (store, rid) = store_with_resource();
        let project = Ulid::new();
        let a = Booking::new(rid, project, Span::new(8 * H, 12 * H));
        let b = Booking::new(rid, project, Span::new(13 * H, 15 * H)).with_status(BookingStatus::Completed);
        let c = Booking::new(rid, project, Span::new(20 * H, 22 * H));
        let a_id = a.id;
        for bk in [c, b, a] {
            store.insert_booking(bk).await.unwrap();
        }

        let window = Span::new(0, 16 * H);
        let active = store.fetch_bookings(rid, window, StatusFilter::Active, None).await.unwrap();
        assert_eq!(active.len(), 1);
        let all = store.fetch_bookings(rid, window, StatusFilter::All, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].span.start < all[1].span.start);
        let excluded = store
            .fetch_bookings(rid, window, StatusFilter::All, Some(a_id))
            .await
            .unwrap();
        assert_eq!(excluded.len(), 1);
    }

    #[tokio::test]
    async fn unknown_resource_is_not_found() {
        let store = InMemoryStore::new();
        let rid = Ulid::new();
        let result = store
            .fetch_bookings(rid, Span::new(0, H), StatusFilter::All, None)
            .await;
        assert_eq!(result, Err(EngineError::NotFound(rid)));
        assert!(matches!(
            store.resources_in_unit("nope").await,
            Err(EngineError::UnitNotFound(_))
        ));
    }

    #[tokio::test]
    async fn book_rejects_overlap_but_allows_touching() {
        let (store, rid) = store_with_resource();
        let project = Ulid::new();
        let first = Booking::new(rid, project, Span::new(8 * H, 12 * H));
        let first_id = first.id;
        store.book(first).await.unwrap();

        let clash = Booking::new(rid, project, Span::new(11 * H, 13 * H));
        assert_eq!(store.book(clash).await, Err(EngineError::Conflict(first_id)));

        let after = Booking::new(rid, project, Span::new(12 * H, 13 * H));
        store.book(after).await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_booking_frees_the_slot() {
        let (store, rid) = store_with_resource();
        let project = Ulid::new();
        let first = Booking::new(rid, project, Span::new(8 * H, 12 * H));
        let first_id = first.id;
        store.book(first).await.unwrap();
        store.set_status(first_id, BookingStatus::Cancelled).await.unwrap();

        store
            .book(Booking::new(rid, project, Span::new(9 * H, 10 * H)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_books_for_same_slot_admit_one() {
        let (store, rid) = store_with_resource();
        let store = Arc::new(store);
        let project = Ulid::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .book(Booking::new(rid, project, Span::new(8 * H, 9 * H)))
                    .await
            }));
        }
        let mut ok = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
    }

    #[tokio::test]
    async fn remove_and_status_on_missing_booking() {
        let (store, rid) = store_with_resource();
        let bk = Booking::new(rid, Ulid::new(), Span::new(0, H));
        let id = bk.id;
        store.insert_booking(bk).await.unwrap();
        assert_eq!(store.remove_booking(id).await.map(|b| b.id), Ok(id));
        assert_eq!(store.remove_booking(id).await, Err(EngineError::NotFound(id)));
        assert_eq!(
            store.set_status(id, BookingStatus::Completed).await,
            Err(EngineError::NotFound(id))
        );
    }

    #[tokio::test]
    async fn group_bookings_span_resources() {
        let store = InMemoryStore::new();
        let (r1, r2) = (Ulid::new(), Ulid::new());
        store.create_resource(r1, None).unwrap();
        store.create_resource(r2, None).unwrap();
        let project = Ulid::new();
        store.insert_booking(Booking::new(r2, project, Span::new(2 * H, 3 * H))).await.unwrap();
        store.insert_booking(Booking::new(r1, project, Span::new(H, 2 * H))).await.unwrap();
        store.insert_booking(Booking::new(r1, Ulid::new(), Span::new(H, 2 * H))).await.unwrap();

        let found = store.fetch_group_bookings(project, Span::new(0, 4 * H)).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].resource_id, r1);
        assert_eq!(found[1].resource_id, r2);
    }
}
