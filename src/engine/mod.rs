mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
mod store;

pub use availability::{free_windows, merge_overlapping, subtract_slots};
pub use conflict::{overlaps, validate_request};
pub use error::{BookingError, ValidationError};
pub use store::{BookingStore, InMemoryBookingStore};

use std::sync::Arc;

use tokio::sync::{broadcast, OwnedMutexGuard};

use crate::locks::KeyedLocks;
use crate::model::*;
use crate::notify::NotifyHub;

/// Booking lifecycle on top of a [`BookingStore`].
///
/// Check and commit for one venue run under that venue's lock, so two
/// submissions through the same engine cannot both pass the overlap check.
pub struct BookingEngine<S: BookingStore> {
    store: Arc<S>,
    pub notify: Arc<NotifyHub>,
    venue_locks: KeyedLocks<VenueId>,
}

impl<S: BookingStore> BookingEngine<S> {
    pub fn new(store: Arc<S>, notify: Arc<NotifyHub>) -> Self {
        Self {
            store,
            notify,
            venue_locks: KeyedLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Change notifications for one venue.
    pub fn subscribe(&self, venue: &VenueId) -> broadcast::Receiver<BookingEvent> {
        self.notify.subscribe(venue)
    }

    /// Serialize writers of one venue.
    pub(super) async fn lock_venue(&self, venue: &VenueId) -> OwnedMutexGuard<()> {
        self.venue_locks.lock(venue).await
    }

    /// Drop idle venue locks and abandoned notification channels.
    pub fn prune(&self) -> usize {
        self.venue_locks.prune() + self.notify.prune()
    }

    /// Look up a booking or fail with `NotFound`.
    pub(super) async fn require(&self, id: ulid::Ulid) -> Result<Booking, BookingError> {
        self.store
            .get_booking(id)
            .await?
            .ok_or(BookingError::NotFound(id))
    }
}

fn require_admin(actor: Actor) -> Result<(), BookingError> {
    match actor {
        Actor::Administrator => Ok(()),
        Actor::Resident => Err(BookingError::Forbidden),
    }
}
