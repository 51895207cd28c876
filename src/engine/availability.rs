use chrono::NaiveDate;

use crate::model::*;

// ── Free-window computation ──────────────────────────────────────

/// Free sub-slots of `window` on `date`, given the venue's bookings.
///
/// Pending and confirmed bookings on that date are clamped to the window,
/// merged, and subtracted. Cancelled bookings leave their slot free.
pub fn free_windows(bookings: &[Booking], date: NaiveDate, window: TimeSlot) -> Vec<TimeSlot> {
    let mut taken: Vec<TimeSlot> = bookings
        .iter()
        .filter(|b| b.status.is_active() && b.event_date == date && b.slot.overlaps(&window))
        .map(|b| TimeSlot::new(b.slot.start.max(window.start), b.slot.end.min(window.end)))
        .collect();

    if taken.is_empty() {
        return vec![window];
    }
    taken.sort_by_key(|s| s.start);
    let taken = merge_overlapping(&taken);
    subtract_slots(&[window], &taken)
}

/// Merge sorted overlapping/adjacent slots into disjoint slots.
pub fn merge_overlapping(sorted: &[TimeSlot]) -> Vec<TimeSlot> {
    let mut merged: Vec<TimeSlot> = Vec::new();
    for &slot in sorted {
        if let Some(last) = merged.last_mut()
            && slot.start <= last.end
        {
            last.end = last.end.max(slot.end);
            continue;
        }
        merged.push(slot);
    }
    merged
}

/// `base` minus `to_remove`. Both inputs sorted by start; `to_remove` disjoint.
pub fn subtract_slots(base: &[TimeSlot], to_remove: &[TimeSlot]) -> Vec<TimeSlot> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(TimeSlot::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(TimeSlot::new(current_start, current_end));
        }
    }

    result
}
