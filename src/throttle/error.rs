use std::io;

#[derive(Debug)]
pub enum LedgerError {
    Io(String),
    Corrupt(String),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::Io(e) => write!(f, "ledger I/O error: {e}"),
            LedgerError::Corrupt(e) => write!(f, "ledger corrupt: {e}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<io::Error> for LedgerError {
    fn from(e: io::Error) -> Self {
        LedgerError::Io(e.to_string())
    }
}

/// Failures of a login attempt that are not throttling decisions.
/// Lockouts and wrong passwords are `LoginDecision::Denied`, not errors.
#[derive(Debug)]
pub enum LoginError {
    /// Malformed input; not counted as a failed attempt.
    Validation(&'static str),
    /// Identity provider failed for a reason other than bad credentials.
    Credential(String),
    Ledger(LedgerError),
}

impl std::fmt::Display for LoginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoginError::Validation(msg) => write!(f, "invalid login request: {msg}"),
            LoginError::Credential(msg) => write!(f, "identity provider error: {msg}"),
            LoginError::Ledger(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LoginError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoginError::Ledger(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LedgerError> for LoginError {
    fn from(e: LedgerError) -> Self {
        LoginError::Ledger(e)
    }
}
