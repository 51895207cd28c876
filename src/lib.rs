//! Reservation engine for a shared facility and a login throttle for its
//! admin panel.

pub mod clock;
pub mod config;
pub mod engine;
pub mod limits;
pub mod locks;
pub mod model;
pub mod notify;
pub mod observability;
pub mod reaper;
pub mod throttle;
pub mod wal;
