use ulid::Ulid;

use crate::model::BookingStatus;

/// Problems with the shape of a request. Reported before any state is read
/// or written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingField(&'static str),
    /// `end_time <= start_time`.
    InvertedInterval,
    FieldTooLong(&'static str),
    /// Administrators may only move a booking to confirmed or cancelled.
    InvalidStatusTarget(BookingStatus),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingField(field) => write!(f, "missing required field: {field}"),
            ValidationError::InvertedInterval => {
                write!(f, "end time must be after start time")
            }
            ValidationError::FieldTooLong(field) => write!(f, "field too long: {field}"),
            ValidationError::InvalidStatusTarget(status) => {
                write!(f, "cannot set booking status to {status}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug)]
pub enum BookingError {
    Validation(ValidationError),
    /// The slot overlaps a pending or confirmed booking. Which one is not disclosed.
    Conflict,
    NotFound(Ulid),
    /// Only pending bookings can be confirmed or cancelled.
    AlreadyDecided { id: Ulid, status: BookingStatus },
    /// Operation needs the administrator capability.
    Forbidden,
    LimitExceeded(&'static str),
    /// Persistence collaborator failed.
    Store(String),
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::Validation(e) => write!(f, "invalid booking: {e}"),
            BookingError::Conflict => write!(f, "venue already reserved for this time"),
            BookingError::NotFound(id) => write!(f, "booking not found: {id}"),
            BookingError::AlreadyDecided { id, status } => {
                write!(f, "booking {id} is already {status}")
            }
            BookingError::Forbidden => write!(f, "administrator access required"),
            BookingError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            BookingError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for BookingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BookingError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for BookingError {
    fn from(e: ValidationError) -> Self {
        BookingError::Validation(e)
    }
}
