use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::availability::free_windows;
use super::{BookingEngine, BookingError, BookingStore, ValidationError};

impl<S: BookingStore> BookingEngine<S> {
    pub async fn get(&self, id: Ulid) -> Result<Booking, BookingError> {
        self.require(id).await
    }

    /// All bookings of the venue ordered by date, then start time.
    pub async fn list(&self, venue: &VenueId) -> Result<Vec<Booking>, BookingError> {
        let mut bookings = self.store.list_bookings(venue).await?;
        bookings.sort_by_key(|b| (b.event_date, b.slot.start, b.id));
        Ok(bookings)
    }

    pub async fn list_by_status(
        &self,
        venue: &VenueId,
        status: BookingStatus,
    ) -> Result<Vec<Booking>, BookingError> {
        let mut bookings = self.list(venue).await?;
        bookings.retain(|b| b.status == status);
        Ok(bookings)
    }

    pub async fn status_summary(&self, venue: &VenueId) -> Result<StatusSummary, BookingError> {
        let bookings = self.store.list_bookings(venue).await?;
        let mut summary = StatusSummary::default();
        for b in &bookings {
            match b.status {
                BookingStatus::Pending => summary.pending += 1,
                BookingStatus::Confirmed => summary.confirmed += 1,
                BookingStatus::Cancelled => summary.cancelled += 1,
            }
        }
        Ok(summary)
    }

    /// Free parts of `window` on `date`. Pending bookings count as taken.
    pub async fn day_availability(
        &self,
        venue: &VenueId,
        date: NaiveDate,
        window: TimeSlot,
    ) -> Result<Vec<TimeSlot>, BookingError> {
        if window.end <= window.start {
            return Err(ValidationError::InvertedInterval.into());
        }
        let bookings = self.store.list_bookings(venue).await?;
        Ok(free_windows(&bookings, date, window))
    }
}
