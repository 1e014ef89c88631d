use chrono::NaiveDateTime;

use crate::errors::InvalidTransition;
use crate::models::{Booking, BookingStatus, StatusHistoryEntry};

use crate::models::BookingStatus::*;

/// Every legal move. A status absent from the table has no way out.
///
/// `DepositPaid` is a known status with no entries here; nothing moves into
/// or out of it until the deposit flow is defined.
const TRANSITIONS: &[(BookingStatus, &[BookingStatus])] = &[
    (Pending, &[Confirmed, Cancelled]),
    (Confirmed, &[Scheduled, Cancelled]),
    (Scheduled, &[InProgress, Cancelled, NoShow]),
    (InProgress, &[Completed]),
];

pub fn allowed_transitions(from: BookingStatus) -> &'static [BookingStatus] {
    TRANSITIONS
        .iter()
        .find(|(status, _)| *status == from)
        .map(|(_, next)| *next)
        .unwrap_or(&[])
}

pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

pub fn is_terminal(status: BookingStatus) -> bool {
    matches!(status, Completed | Cancelled | NoShow)
}

/// Customers may only cancel before the booking is scheduled. Staff are not
/// bound by this and go through [`transition`] directly.
pub fn can_user_cancel(status: BookingStatus) -> bool {
    matches!(status, Pending | Confirmed)
}

pub fn initial_history(created_by: &str, now: NaiveDateTime) -> StatusHistoryEntry {
    StatusHistoryEntry {
        status: Pending,
        changed_by: created_by.to_string(),
        note: None,
        created_at: now,
    }
}

/// Moves `booking` to `requested` and appends the matching history entry.
/// On error the booking is left untouched.
pub fn transition(
    booking: &mut Booking,
    requested: BookingStatus,
    actor_id: &str,
    note: Option<String>,
    now: NaiveDateTime,
) -> Result<StatusHistoryEntry, InvalidTransition> {
    if !can_transition(booking.status, requested) {
        return Err(InvalidTransition {
            current: booking.status,
            requested,
        });
    }

    let entry = StatusHistoryEntry {
        status: requested,
        changed_by: actor_id.to_string(),
        note,
        created_at: now,
    };

    booking.status = requested;
    booking.updated_at = now;
    booking.status_history.push(entry.clone());

    Ok(entry)
}
