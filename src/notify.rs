use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{BookingEvent, VenueId};

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for booking change notifications, one channel per venue.
pub struct NotifyHub {
    channels: DashMap<VenueId, broadcast::Sender<BookingEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to notifications for a venue. Creates the channel if needed.
    pub fn subscribe(&self, venue: &VenueId) -> broadcast::Receiver<BookingEvent> {
        let sender = self
            .channels
            .entry(venue.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, venue: &VenueId, event: &BookingEvent) {
        if let Some(sender) = self.channels.get(venue) {
            let _ = sender.send(event.clone());
        }
    }

    /// Drop channels whose subscribers have all gone away.
    pub fn prune(&self) -> usize {
        let before = self.channels.len();
        self.channels.retain(|_, sender| sender.receiver_count() > 0);
        before - self.channels.len()
    }
}

impl BookingEvent {
    /// JSON payload for forwarding to a push channel or webhook.
    pub fn to_payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use ulid::Ulid;

    use super::*;
    use crate::model::BookingStatus;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let venue = VenueId::from("hall");
        let mut rx = hub.subscribe(&venue);

        let event = BookingEvent::Deleted { id: Ulid::new() };
        hub.send(&venue, &event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn venues_do_not_leak() {
        let hub = NotifyHub::new();
        let hall = VenueId::from("hall");
        let pool = VenueId::from("pool");
        let mut rx = hub.subscribe(&pool);

        hub.send(&hall, &BookingEvent::Deleted { id: Ulid::new() });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        // Nobody listening
        hub.send(&VenueId::from("hall"), &BookingEvent::Deleted { id: Ulid::new() });
    }

    #[test]
    fn prune_drops_abandoned_channels() {
        let hub = NotifyHub::new();
        let rx = hub.subscribe(&VenueId::from("hall"));
        let _kept = hub.subscribe(&VenueId::from("pool"));
        drop(rx);
        assert_eq!(hub.prune(), 1);
        assert_eq!(hub.prune(), 0);
    }

    #[test]
    fn payload_is_tagged_json() {
        let id = Ulid::new();
        let payload = BookingEvent::StatusChanged {
            id,
            status: BookingStatus::Confirmed,
        }
        .to_payload();
        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(json["event"], "status_changed");
        assert_eq!(json["status"], "confirmed");
        assert_eq!(json["id"], id.to_string());
    }
}
