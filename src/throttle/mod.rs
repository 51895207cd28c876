mod error;
mod guard;
mod identity;
mod ledger;

pub use error::{LedgerError, LoginError};
pub use guard::{admit, expire, record_failure, remaining_attempts, Gate};
pub use identity::{CredentialOutcome, IdentityProvider, InMemoryIdentity, Principal, WithAdminBypass};
pub use ledger::{AttemptLedger, FileLedger, InMemoryLedger};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::ThrottleConfig;
use crate::limits::*;
use crate::model::{LedgerEntry, LoginContext};
use crate::observability;

/// Why an attempt was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// Wrong credentials; this many tries remain before a lockout.
    InvalidCredentials { remaining_attempts: u32 },
    /// This attempt triggered a lockout lasting the full configured duration.
    LockedOut { lockout_secs: u64 },
    /// A lockout was already running; credentials were not checked.
    StillLocked { remaining_secs: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginDecision {
    Allowed(Principal),
    Denied(Denial),
}

/// Current throttle state of a context, for rendering before any attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Unlocked { remaining_attempts: u32 },
    Locked { remaining_secs: u64 },
}

/// Login entry point: administrator bypass, then lockout gate, then
/// credential check, then ledger update.
pub struct LoginGuard<L: AttemptLedger, I: IdentityProvider> {
    ledger: Arc<L>,
    identity: Arc<I>,
    clock: Arc<dyn Clock>,
    config: ThrottleConfig,
}

impl<L: AttemptLedger, I: IdentityProvider> LoginGuard<L, I> {
    pub fn new(ledger: Arc<L>, identity: Arc<I>, clock: Arc<dyn Clock>, config: ThrottleConfig) -> Self {
        Self {
            ledger,
            identity,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    pub async fn attempt_login(
        &self,
        context: &LoginContext,
        identifier: &str,
        secret: &str,
    ) -> Result<LoginDecision, LoginError> {
        let result = self.attempt(context, identifier, secret).await;
        metrics::counter!(
            observability::LOGIN_ATTEMPTS_TOTAL,
            "outcome" => observability::login_outcome_label(&result)
        )
        .increment(1);
        result
    }

    async fn attempt(
        &self,
        context: &LoginContext,
        identifier: &str,
        secret: &str,
    ) -> Result<LoginDecision, LoginError> {
        validate_attempt(context, identifier, secret)?;

        if let Some(principal) = self.identity.administrator_bypass(identifier, secret) {
            info!("administrator bypass login from context {context}");
            return Ok(LoginDecision::Allowed(principal));
        }

        // Held across the credential check so concurrent attempts from one
        // context each see the previous attempt's count.
        let _held = self.ledger.context_locks().lock(context).await;
        let now = self.clock.now_ms();
        let stored = self.ledger.read(context).await?;
        let entry = match admit(stored, now) {
            Gate::Closed { remaining_secs } => {
                debug!("context {context} still locked for {remaining_secs}s");
                return Ok(LoginDecision::Denied(Denial::StillLocked { remaining_secs }));
            }
            Gate::Open { entry } => entry,
        };

        let (next, result) = match self.identity.verify_credentials(identifier, secret).await {
            CredentialOutcome::Success(principal) => {
                (LedgerEntry::default(), Ok(LoginDecision::Allowed(principal)))
            }
            CredentialOutcome::InvalidCredentials | CredentialOutcome::EmailNotConfirmed => {
                let (next, denial) = record_failure(entry, now, &self.config);
                (next, Ok(LoginDecision::Denied(denial)))
            }
            // Provider trouble is not the user's fault; the count stays put.
            CredentialOutcome::Other(msg) => (entry, Err(LoginError::Credential(msg))),
        };

        if next != stored {
            self.ledger.write(context, next).await?;
        }

        if let Ok(LoginDecision::Denied(Denial::LockedOut { lockout_secs })) = &result {
            warn!(
                "context {context} locked out for {lockout_secs}s after {} failed attempts",
                next.failed_count
            );
            metrics::counter!(observability::LOCKOUTS_TOTAL).increment(1);
        }
        result
    }

    /// Throttle state of `context` right now. An expired lockout is cleared
    /// from the ledger as a side effect.
    pub async fn status(&self, context: &LoginContext) -> Result<LockStatus, LoginError> {
        let _held = self.ledger.context_locks().lock(context).await;
        let now = self.clock.now_ms();
        let stored = self.ledger.read(context).await?;
        match admit(stored, now) {
            Gate::Closed { remaining_secs } => Ok(LockStatus::Locked { remaining_secs }),
            Gate::Open { entry } => {
                if entry != stored {
                    self.ledger.write(context, entry).await?;
                }
                Ok(LockStatus::Unlocked {
                    remaining_attempts: remaining_attempts(&entry, &self.config),
                })
            }
        }
    }
}

fn validate_attempt(context: &LoginContext, identifier: &str, secret: &str) -> Result<(), LoginError> {
    if context.as_str().is_empty() {
        return Err(LoginError::Validation("login context is required"));
    }
    if context.as_str().len() > MAX_CONTEXT_LEN {
        return Err(LoginError::Validation("login context too long"));
    }
    if identifier.trim().is_empty() {
        return Err(LoginError::Validation("identifier is required"));
    }
    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(LoginError::Validation("identifier too long"));
    }
    if secret.is_empty() {
        return Err(LoginError::Validation("secret is required"));
    }
    if secret.len() > MAX_SECRET_LEN {
        return Err(LoginError::Validation("secret too long"));
    }
    Ok(())
}
