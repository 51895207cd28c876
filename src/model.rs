use std::fmt;

use chrono::{NaiveDate, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds.
pub type Ms = i64;

/// Key of a bookable facility. The community has a single hall, but bookings
/// are namespaced by venue so the store never mixes two calendars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VenueId(String);

impl VenueId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VenueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Half-open time-of-day interval `[start, end)` on a single date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSlot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        debug_assert!(start < end, "TimeSlot start must be before end");
        Self { start, end }
    }

    /// Build a slot from `HH:MM` pairs. Returns `None` for malformed or
    /// inverted input.
    pub fn from_hm(start: (u32, u32), end: (u32, u32)) -> Option<Self> {
        let start = NaiveTime::from_hms_opt(start.0, start.1, 0)?;
        let end = NaiveTime::from_hms_opt(end.0, end.1, 0)?;
        (start < end).then_some(Self { start, end })
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_slot(&self, other: &TimeSlot) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    /// Pending and confirmed bookings occupy their slot; cancelled ones don't.
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reservation of the venue as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub venue: VenueId,
    pub requester_name: String,
    pub contact_phone: String,
    pub event_date: NaiveDate,
    pub slot: TimeSlot,
    pub event_type: String,
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub created_at: Ms,
    pub updated_at: Ms,
}

/// Raw submission from the reservation form. Date and times are optional so
/// that an empty form field surfaces as a validation error, not a parse error
/// somewhere upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub requester_name: String,
    pub contact_phone: String,
    pub event_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub event_type: String,
    pub notes: Option<String>,
}

/// A request that passed validation: trimmed, complete, `start < end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingData {
    pub requester_name: String,
    pub contact_phone: String,
    pub event_date: NaiveDate,
    pub slot: TimeSlot,
    pub event_type: String,
    pub notes: Option<String>,
}

/// The slot a submission or edit wants to occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub event_date: NaiveDate,
    pub slot: TimeSlot,
    /// Booking being edited; never conflicts with itself.
    pub exclude_id: Option<Ulid>,
}

impl Candidate {
    pub fn new(event_date: NaiveDate, slot: TimeSlot) -> Self {
        Self {
            event_date,
            slot,
            exclude_id: None,
        }
    }

    pub fn excluding(mut self, id: Ulid) -> Self {
        self.exclude_id = Some(id);
        self
    }
}

/// Who is calling a lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Resident,
    Administrator,
}

/// Booking counts per status, as shown on the admin panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub pending: usize,
    pub confirmed: usize,
    pub cancelled: usize,
}

impl StatusSummary {
    pub fn total(&self) -> usize {
        self.pending + self.confirmed + self.cancelled
    }
}

/// Change notifications published per venue after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BookingEvent {
    Submitted { booking: Booking },
    Updated { booking: Booking },
    StatusChanged { id: Ulid, status: BookingStatus },
    Deleted { id: Ulid },
}

// ── Login throttling ─────────────────────────────────────────────

/// Scope against which failed attempts are counted (a device or browser),
/// not the account being logged into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoginContext(String);

impl LoginContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LoginContext {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for LoginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub failed_count: u32,
    /// Absent means not locked.
    pub lockout_until: Option<Ms>,
}

impl LedgerEntry {
    pub fn is_zero(&self) -> bool {
        self.failed_count == 0 && self.lockout_until.is_none()
    }

    /// Milliseconds of lockout left at `now`, if the lockout is still running.
    pub fn lockout_remaining(&self, now: Ms) -> Option<Ms> {
        self.lockout_until
            .filter(|&until| now < until)
            .map(|until| until - now)
    }
}

/// Durable ledger log record. This is the on-disk format of the file ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerRecord {
    Set {
        context: LoginContext,
        entry: LedgerEntry,
    },
    Clear {
        context: LoginContext,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn slot_basics() {
        let s = TimeSlot::new(t(10, 0), t(12, 30));
        assert_eq!(s.duration(), TimeDelta::minutes(150));
        assert!(s.contains_slot(&TimeSlot::new(t(10, 0), t(11, 0))));
        assert!(s.contains_slot(&s));
        assert!(!s.contains_slot(&TimeSlot::new(t(9, 0), t(11, 0))));
    }

    #[test]
    fn slot_overlap() {
        let a = TimeSlot::new(t(10, 0), t(12, 0));
        let b = TimeSlot::new(t(11, 0), t(13, 0));
        let c = TimeSlot::new(t(12, 0), t(14, 0));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn slot_single_minute_overlap() {
        let a = TimeSlot::new(t(10, 0), t(11, 1));
        let b = TimeSlot::new(t(11, 0), t(12, 0));
        assert!(a.overlaps(&b));
    }

    #[test]
    fn from_hm_rejects_inverted_and_malformed() {
        assert!(TimeSlot::from_hm((10, 0), (10, 0)).is_none());
        assert!(TimeSlot::from_hm((12, 0), (10, 0)).is_none());
        assert!(TimeSlot::from_hm((25, 0), (26, 0)).is_none());
        assert_eq!(
            TimeSlot::from_hm((10, 0), (11, 0)),
            Some(TimeSlot::new(t(10, 0), t(11, 0)))
        );
    }

    #[test]
    fn status_activity() {
        assert!(BookingStatus::Pending.is_active());
        assert!(BookingStatus::Confirmed.is_active());
        assert!(!BookingStatus::Cancelled.is_active());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&BookingStatus::Confirmed).unwrap();
        assert_eq!(json, "\"confirmed\"");
    }

    #[test]
    fn ledger_entry_lockout_remaining() {
        let entry = LedgerEntry {
            failed_count: 3,
            lockout_until: Some(1_000),
        };
        assert_eq!(entry.lockout_remaining(400), Some(600));
        assert_eq!(entry.lockout_remaining(1_000), None);
        assert_eq!(entry.lockout_remaining(2_000), None);
        assert!(!entry.is_zero());
        assert!(LedgerEntry::default().is_zero());
    }

    #[test]
    fn ledger_record_serialization_roundtrip() {
        let record = LedgerRecord::Set {
            context: LoginContext::from("browser-1"),
            entry: LedgerEntry {
                failed_count: 2,
                lockout_until: None,
            },
        };
        let bytes = bincode::serialize(&record).unwrap();
        let decoded: LedgerRecord = bincode::deserialize(&bytes).unwrap();
        assert_eq!(record, decoded);
    }
}
