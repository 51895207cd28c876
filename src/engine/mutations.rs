use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::{booking_error_label, BOOKING_CONFLICTS_TOTAL, BOOKING_REQUESTS_TOTAL};

use super::conflict::{overlaps, validate_request};
use super::{require_admin, BookingEngine, BookingError, BookingStore, ValidationError};

fn record<T>(op: &'static str, result: &Result<T, BookingError>) {
    let status = match result {
        Ok(_) => "ok",
        Err(e) => booking_error_label(e),
    };
    metrics::counter!(BOOKING_REQUESTS_TOTAL, "op" => op, "status" => status).increment(1);
}

impl<S: BookingStore> BookingEngine<S> {
    /// Submit a new booking request. Created as `Pending` if the slot is free.
    pub async fn submit(&self, venue: &VenueId, req: &BookingRequest) -> Result<Booking, BookingError> {
        let result = self.submit_inner(venue, req).await;
        record("submit", &result);
        result
    }

    async fn submit_inner(&self, venue: &VenueId, req: &BookingRequest) -> Result<Booking, BookingError> {
        let data = validate_request(req)?;

        let _guard = self.lock_venue(venue).await;
        let existing = self.store.list_bookings(venue).await?;
        if existing.len() >= MAX_BOOKINGS_PER_VENUE {
            return Err(BookingError::LimitExceeded("too many bookings on venue"));
        }
        let candidate = Candidate::new(data.event_date, data.slot);
        if overlaps(&candidate, &existing) {
            metrics::counter!(BOOKING_CONFLICTS_TOTAL).increment(1);
            warn!(%venue, date = %data.event_date, start = %data.slot.start, end = %data.slot.end, "booking rejected: slot taken");
            return Err(BookingError::Conflict);
        }

        let booking = self.store.create_booking(venue, data).await?;
        info!(%venue, id = %booking.id, date = %booking.event_date, "booking submitted");
        self.notify.send(venue, &BookingEvent::Submitted { booking: booking.clone() });
        Ok(booking)
    }

    /// Edit an existing booking. The new slot is checked against every other
    /// booking of the venue; the status is kept.
    pub async fn update(
        &self,
        venue: &VenueId,
        id: Ulid,
        req: &BookingRequest,
    ) -> Result<Booking, BookingError> {
        let result = self.update_inner(venue, id, req).await;
        record("update", &result);
        result
    }

    async fn update_inner(
        &self,
        venue: &VenueId,
        id: Ulid,
        req: &BookingRequest,
    ) -> Result<Booking, BookingError> {
        let data = validate_request(req)?;

        let _guard = self.lock_venue(venue).await;
        let existing = self.store.list_bookings(venue).await?;
        if !existing.iter().any(|b| b.id == id) {
            return Err(BookingError::NotFound(id));
        }
        let candidate = Candidate::new(data.event_date, data.slot).excluding(id);
        if overlaps(&candidate, &existing) {
            metrics::counter!(BOOKING_CONFLICTS_TOTAL).increment(1);
            warn!(%venue, %id, date = %data.event_date, "booking edit rejected: slot taken");
            return Err(BookingError::Conflict);
        }

        let booking = self.store.update_booking(id, data).await?;
        info!(%venue, %id, "booking updated");
        self.notify.send(venue, &BookingEvent::Updated { booking: booking.clone() });
        Ok(booking)
    }

    /// Confirm or cancel a pending booking. Administrators only. A decided
    /// booking keeps its status; reviving a cancelled one could collide with
    /// a booking that took its slot since.
    pub async fn set_status(
        &self,
        actor: Actor,
        id: Ulid,
        status: BookingStatus,
    ) -> Result<Booking, BookingError> {
        let result = self.set_status_inner(actor, id, status).await;
        record("set_status", &result);
        result
    }

    async fn set_status_inner(
        &self,
        actor: Actor,
        id: Ulid,
        status: BookingStatus,
    ) -> Result<Booking, BookingError> {
        require_admin(actor)?;
        if status == BookingStatus::Pending {
            return Err(ValidationError::InvalidStatusTarget(status).into());
        }

        let venue = self.require(id).await?.venue;
        let _guard = self.lock_venue(&venue).await;
        // Re-read under the lock; another writer may have decided it first.
        let current = self.require(id).await?;
        if current.status != BookingStatus::Pending {
            return Err(BookingError::AlreadyDecided {
                id,
                status: current.status,
            });
        }
        let booking = self.store.update_status(id, status).await?;
        info!(venue = %booking.venue, %id, from = %current.status, to = %status, "booking status changed");
        self.notify
            .send(&booking.venue, &BookingEvent::StatusChanged { id, status });
        Ok(booking)
    }

    /// Remove a booking in any state. Administrators only.
    pub async fn delete(&self, actor: Actor, id: Ulid) -> Result<(), BookingError> {
        let result = self.delete_inner(actor, id).await;
        record("delete", &result);
        result
    }

    async fn delete_inner(&self, actor: Actor, id: Ulid) -> Result<(), BookingError> {
        require_admin(actor)?;
        let venue = self.require(id).await?.venue;

        let _guard = self.lock_venue(&venue).await;
        self.require(id).await?;
        self.store.delete_booking(id).await?;
        info!(%venue, %id, "booking deleted");
        self.notify.send(&venue, &BookingEvent::Deleted { id });
        Ok(())
    }
}
