use std::net::SocketAddr;

use crate::engine::BookingError;
use crate::throttle::{Denial, LoginDecision, LoginError};

// ── Booking metrics ─────────────────────────────────────────────

/// Counter: lifecycle operations. Labels: op, status.
pub const BOOKING_REQUESTS_TOTAL: &str = "hallkeep_booking_requests_total";

/// Counter: submissions/edits rejected because the slot was taken.
pub const BOOKING_CONFLICTS_TOTAL: &str = "hallkeep_booking_conflicts_total";

// ── Login metrics ───────────────────────────────────────────────

/// Counter: login attempts. Labels: outcome.
pub const LOGIN_ATTEMPTS_TOTAL: &str = "hallkeep_login_attempts_total";

/// Counter: lockouts started.
pub const LOCKOUTS_TOTAL: &str = "hallkeep_lockouts_total";

/// Histogram: file ledger append + fsync duration in seconds.
pub const LEDGER_FLUSH_DURATION_SECONDS: &str = "hallkeep_ledger_flush_duration_seconds";

/// Gauge: contexts currently present in the attempt ledger.
pub const LEDGER_CONTEXTS: &str = "hallkeep_ledger_contexts";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Install a `fmt` subscriber. Does nothing if the host already installed one.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt().try_init();
}

/// Short label of a booking error for the `status` metric label.
pub fn booking_error_label(err: &BookingError) -> &'static str {
    match err {
        BookingError::Validation(_) => "validation",
        BookingError::Conflict => "conflict",
        BookingError::NotFound(_) => "not_found",
        BookingError::AlreadyDecided { .. } => "already_decided",
        BookingError::Forbidden => "forbidden",
        BookingError::LimitExceeded(_) => "limit_exceeded",
        BookingError::Store(_) => "store_error",
    }
}

/// Short label of a login result for the `outcome` metric label.
pub fn login_outcome_label(result: &Result<LoginDecision, LoginError>) -> &'static str {
    match result {
        Ok(LoginDecision::Allowed(_)) => "allowed",
        Ok(LoginDecision::Denied(Denial::InvalidCredentials { .. })) => "invalid_credentials",
        Ok(LoginDecision::Denied(Denial::LockedOut { .. })) => "locked_out",
        Ok(LoginDecision::Denied(Denial::StillLocked { .. })) => "still_locked",
        Err(LoginError::Validation(_)) => "validation",
        Err(LoginError::Credential(_)) => "credential_error",
        Err(LoginError::Ledger(_)) => "ledger_error",
    }
}
