use crate::limits::*;
use crate::model::*;

use super::ValidationError;

/// True if `candidate` clashes with any pending or confirmed booking in
/// `existing`.
///
/// Same date and `[start, end)` intersection is a clash; touching ends are
/// not. Cancelled bookings and the booking named by `exclude_id` are
/// skipped. Assumes `candidate.slot.start < candidate.slot.end`.
pub fn overlaps(candidate: &Candidate, existing: &[Booking]) -> bool {
    existing.iter().any(|b| {
        b.status.is_active()
            && Some(b.id) != candidate.exclude_id
            && b.event_date == candidate.event_date
            && b.slot.overlaps(&candidate.slot)
    })
}

/// Check a raw request and normalize it: trim text, turn blank notes into
/// `None`, require `start < end`.
pub fn validate_request(req: &BookingRequest) -> Result<BookingData, ValidationError> {
    let requester_name = required(&req.requester_name, "requester_name", MAX_NAME_LEN)?;
    let contact_phone = required(&req.contact_phone, "contact_phone", MAX_PHONE_LEN)?;
    let event_date = req
        .event_date
        .ok_or(ValidationError::MissingField("event_date"))?;
    let start = req
        .start_time
        .ok_or(ValidationError::MissingField("start_time"))?;
    let end = req.end_time.ok_or(ValidationError::MissingField("end_time"))?;
    let event_type = required(&req.event_type, "event_type", MAX_EVENT_TYPE_LEN)?;

    if end <= start {
        return Err(ValidationError::InvertedInterval);
    }

    let notes = match req.notes.as_deref().map(str::trim) {
        Some(n) if n.len() > MAX_NOTES_LEN => return Err(ValidationError::FieldTooLong("notes")),
        Some(n) if !n.is_empty() => Some(n.to_string()),
        _ => None,
    };

    Ok(BookingData {
        requester_name,
        contact_phone,
        event_date,
        slot: TimeSlot::new(start, end),
        event_type,
        notes,
    })
}

fn required(value: &str, field: &'static str, max_len: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    if trimmed.len() > max_len {
        return Err(ValidationError::FieldTooLong(field));
    }
    Ok(trimmed.to_string())
}
