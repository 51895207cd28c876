use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

use crate::clock::{Clock, SystemClock};
use crate::model::*;

use super::BookingError;

/// Persistence collaborator for bookings. Implementations assign ids and
/// timestamps; they do not check conflicts.
#[async_trait]
pub trait BookingStore: Send + Sync + 'static {
    /// Every booking of the venue, cancelled ones included.
    async fn list_bookings(&self, venue: &VenueId) -> Result<Vec<Booking>, BookingError>;

    async fn get_booking(&self, id: Ulid) -> Result<Option<Booking>, BookingError>;

    /// Persist a new booking in `Pending` state.
    async fn create_booking(&self, venue: &VenueId, data: BookingData) -> Result<Booking, BookingError>;

    /// Replace the editable fields of a booking. Status is left alone.
    async fn update_booking(&self, id: Ulid, data: BookingData) -> Result<Booking, BookingError>;

    async fn update_status(&self, id: Ulid, status: BookingStatus) -> Result<Booking, BookingError>;

    async fn delete_booking(&self, id: Ulid) -> Result<(), BookingError>;
}

/// Store kept in process memory, one booking list per venue.
pub struct InMemoryBookingStore {
    venues: DashMap<VenueId, Vec<Booking>>,
    /// Reverse lookup: booking id → venue
    booking_to_venue: DashMap<Ulid, VenueId>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryBookingStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryBookingStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            venues: DashMap::new(),
            booking_to_venue: DashMap::new(),
            clock,
        }
    }

    pub fn booking_count(&self) -> usize {
        self.booking_to_venue.len()
    }

    fn venue_of(&self, id: Ulid) -> Result<VenueId, BookingError> {
        self.booking_to_venue
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(BookingError::NotFound(id))
    }

    /// Apply `f` to the stored booking and return a copy of the result.
    fn modify(&self, id: Ulid, f: impl FnOnce(&mut Booking)) -> Result<Booking, BookingError> {
        let venue = self.venue_of(id)?;
        let mut list = self
            .venues
            .get_mut(&venue)
            .ok_or(BookingError::NotFound(id))?;
        let booking = list
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(BookingError::NotFound(id))?;
        f(booking);
        booking.updated_at = self.clock.now_ms();
        Ok(booking.clone())
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn list_bookings(&self, venue: &VenueId) -> Result<Vec<Booking>, BookingError> {
        Ok(self
            .venues
            .get(venue)
            .map(|e| e.value().clone())
            .unwrap_or_default())
    }

    async fn get_booking(&self, id: Ulid) -> Result<Option<Booking>, BookingError> {
        let Ok(venue) = self.venue_of(id) else {
            return Ok(None);
        };
        Ok(self
            .venues
            .get(&venue)
            .and_then(|list| list.iter().find(|b| b.id == id).cloned()))
    }

    async fn create_booking(&self, venue: &VenueId, data: BookingData) -> Result<Booking, BookingError> {
        let now = self.clock.now_ms();
        let booking = Booking {
            id: Ulid::new(),
            venue: venue.clone(),
            requester_name: data.requester_name,
            contact_phone: data.contact_phone,
            event_date: data.event_date,
            slot: data.slot,
            event_type: data.event_type,
            notes: data.notes,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.venues
            .entry(venue.clone())
            .or_default()
            .push(booking.clone());
        self.booking_to_venue.insert(booking.id, venue.clone());
        Ok(booking)
    }

    async fn update_booking(&self, id: Ulid, data: BookingData) -> Result<Booking, BookingError> {
        self.modify(id, |b| {
            b.requester_name = data.requester_name;
            b.contact_phone = data.contact_phone;
            b.event_date = data.event_date;
            b.slot = data.slot;
            b.event_type = data.event_type;
            b.notes = data.notes;
        })
    }

    async fn update_status(&self, id: Ulid, status: BookingStatus) -> Result<Booking, BookingError> {
        self.modify(id, |b| b.status = status)
    }

    async fn delete_booking(&self, id: Ulid) -> Result<(), BookingError> {
        let (_, venue) = self
            .booking_to_venue
            .remove(&id)
            .ok_or(BookingError::NotFound(id))?;
        if let Some(mut list) = self.venues.get_mut(&venue) {
            list.retain(|b| b.id != id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::clock::ManualClock;

    fn data(start_h: u32, end_h: u32) -> BookingData {
        BookingData {
            requester_name: "Ana".into(),
            contact_phone: "555-0100".into(),
            event_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            slot: TimeSlot::new(
                NaiveTime::from_hms_opt(start_h, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(end_h, 0, 0).unwrap(),
            ),
            event_type: "birthday".into(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_id_status_and_timestamps() {
        let clock = Arc::new(ManualClock::new(42));
        let store = InMemoryBookingStore::new(clock.clone());
        let venue = VenueId::from("hall");

        let b = store.create_booking(&venue, data(10, 12)).await.unwrap();
        assert_eq!(b.status, BookingStatus::Pending);
        assert_eq!(b.created_at, 42);
        assert_eq!(b.updated_at, 42);
        assert_eq!(store.get_booking(b.id).await.unwrap(), Some(b.clone()));
        assert_eq!(store.list_bookings(&venue).await.unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn update_touches_updated_at_only() {
        let clock = Arc::new(ManualClock::new(1));
        let store = InMemoryBookingStore::new(clock.clone());
        let venue = VenueId::from("hall");
        let b = store.create_booking(&venue, data(10, 12)).await.unwrap();

        clock.set(5);
        let updated = store.update_booking(b.id, data(14, 16)).await.unwrap();
        assert_eq!(updated.created_at, 1);
        assert_eq!(updated.updated_at, 5);
        assert_eq!(updated.slot, data(14, 16).slot);
        assert_eq!(updated.status, BookingStatus::Pending);

        let confirmed = store.update_status(b.id, BookingStatus::Confirmed).await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.slot, data(14, 16).slot);
    }

    #[tokio::test]
    async fn venues_are_separate() {
        let store = InMemoryBookingStore::default();
        let hall = VenueId::from("hall");
        let pool = VenueId::from("pool");
        store.create_booking(&hall, data(10, 12)).await.unwrap();
        assert!(store.list_bookings(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_everywhere() {
        let store = InMemoryBookingStore::default();
        let venue = VenueId::from("hall");
        let b = store.create_booking(&venue, data(10, 12)).await.unwrap();

        store.delete_booking(b.id).await.unwrap();
        assert_eq!(store.get_booking(b.id).await.unwrap(), None);
        assert!(store.list_bookings(&venue).await.unwrap().is_empty());
        assert_eq!(store.booking_count(), 0);
        assert!(matches!(
            store.delete_booking(b.id).await,
            Err(BookingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = InMemoryBookingStore::default();
        let id = Ulid::new();
        assert!(matches!(
            store.update_status(id, BookingStatus::Confirmed).await,
            Err(BookingError::NotFound(x)) if x == id
        ));
        assert_eq!(store.get_booking(id).await.unwrap(), None);
    }
}
