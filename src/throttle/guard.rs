//! Pure lockout state machine over a single ledger entry.
//!
//! `Unlocked`: attempts are checked against the identity provider.
//! `Locked`: attempts are rejected until `lockout_until` passes, without
//! consulting the identity provider.

use crate::config::{ceil_secs, ThrottleConfig};
use crate::model::{LedgerEntry, Ms};

use super::Denial;

/// What the guard lets through before any credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Credential check may run. `entry` is the stored entry with any expired
    /// lockout already cleared.
    Open { entry: LedgerEntry },
    Closed { remaining_secs: u64 },
}

/// Decide whether an attempt may proceed at `now`.
pub fn admit(stored: LedgerEntry, now: Ms) -> Gate {
    if let Some(remaining) = stored.lockout_remaining(now) {
        return Gate::Closed {
            remaining_secs: ceil_secs(remaining),
        };
    }
    Gate::Open {
        entry: expire(stored, now),
    }
}

/// Clear an entry whose lockout has run out. Anything else is returned as is.
pub fn expire(entry: LedgerEntry, now: Ms) -> LedgerEntry {
    match entry.lockout_until {
        Some(until) if now >= until => LedgerEntry::default(),
        _ => entry,
    }
}

/// Entry after a failed credential check, plus the denial to surface.
pub fn record_failure(entry: LedgerEntry, now: Ms, config: &ThrottleConfig) -> (LedgerEntry, Denial) {
    let failed_count = entry.failed_count.saturating_add(1);
    if failed_count >= config.max_attempts {
        let next = LedgerEntry {
            failed_count,
            lockout_until: Some(now.saturating_add(config.lockout_ms)),
        };
        let denial = Denial::LockedOut {
            lockout_secs: config.lockout_secs(),
        };
        (next, denial)
    } else {
        let next = LedgerEntry {
            failed_count,
            lockout_until: None,
        };
        let denial = Denial::InvalidCredentials {
            remaining_attempts: config.max_attempts - failed_count,
        };
        (next, denial)
    }
}

/// Attempts left before a lockout, for an entry already passed through `expire`.
pub fn remaining_attempts(entry: &LedgerEntry, config: &ThrottleConfig) -> u32 {
    config.max_attempts.saturating_sub(entry.failed_count)
}
