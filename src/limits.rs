//! Hard caps on user-supplied input.

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_PHONE_LEN: usize = 40;
pub const MAX_EVENT_TYPE_LEN: usize = 100;
pub const MAX_NOTES_LEN: usize = 2_000;

pub const MAX_BOOKINGS_PER_VENUE: usize = 100_000;

pub const MAX_CONTEXT_LEN: usize = 256;
pub const MAX_IDENTIFIER_LEN: usize = 320;
pub const MAX_SECRET_LEN: usize = 1_024;
