use async_trait::async_trait;
use dashmap::DashMap;

use crate::config::AdminBypass;

/// Who a successful login authenticated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Administrator,
    Resident(String),
}

/// Result of asking the identity provider to check a credential pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialOutcome {
    Success(Principal),
    InvalidCredentials,
    /// Account exists but its email was never confirmed. Counts as a failure.
    EmailNotConfirmed,
    /// Anything else (provider down, rate limited upstream). Not counted.
    Other(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    async fn verify_credentials(&self, identifier: &str, secret: &str) -> CredentialOutcome;

    /// Recognize a fixed administrator credential. Consulted before any
    /// throttling; the default provider recognizes nothing.
    fn administrator_bypass(&self, _identifier: &str, _secret: &str) -> Option<Principal> {
        None
    }
}

/// Wraps a provider with a configured administrator credential pair.
pub struct WithAdminBypass<I> {
    inner: I,
    bypass: Option<AdminBypass>,
}

impl<I: IdentityProvider> WithAdminBypass<I> {
    pub fn new(inner: I, bypass: Option<AdminBypass>) -> Self {
        Self { inner, bypass }
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }
}

#[async_trait]
impl<I: IdentityProvider> IdentityProvider for WithAdminBypass<I> {
    async fn verify_credentials(&self, identifier: &str, secret: &str) -> CredentialOutcome {
        self.inner.verify_credentials(identifier, secret).await
    }

    fn administrator_bypass(&self, identifier: &str, secret: &str) -> Option<Principal> {
        match &self.bypass {
            Some(bypass) if bypass.matches(identifier, secret) => Some(Principal::Administrator),
            _ => self.inner.administrator_bypass(identifier, secret),
        }
    }
}

struct Account {
    secret: String,
    confirmed: bool,
}

/// Account table held in memory. Stands in for the hosted identity service
/// in tests and local runs.
#[derive(Default)]
pub struct InMemoryIdentity {
    accounts: DashMap<String, Account>,
}

impl InMemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&self, identifier: impl Into<String>, secret: impl Into<String>, confirmed: bool) {
        self.accounts.insert(
            identifier.into(),
            Account {
                secret: secret.into(),
                confirmed,
            },
        );
    }

    pub fn confirm(&self, identifier: &str) -> bool {
        match self.accounts.get_mut(identifier) {
            Some(mut account) => {
                account.confirmed = true;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentity {
    async fn verify_credentials(&self, identifier: &str, secret: &str) -> CredentialOutcome {
        match self.accounts.get(identifier) {
            Some(account) if account.secret == secret => {
                if account.confirmed {
                    CredentialOutcome::Success(Principal::Resident(identifier.to_string()))
                } else {
                    CredentialOutcome::EmailNotConfirmed
                }
            }
            // Unknown account and wrong secret look the same to the caller.
            _ => CredentialOutcome::InvalidCredentials,
        }
    }
}
