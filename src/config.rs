use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::model::Ms;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_LOCKOUT: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_COMPACT_THRESHOLD: u64 = 1000;
pub const DEFAULT_LEDGER_PATH: &str = "./data/attempts.ledger";

/// Knobs of the login throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Failed attempts that trigger a lockout. Never below 1.
    pub max_attempts: u32,
    pub lockout_ms: Ms,
}

impl ThrottleConfig {
    pub fn new(max_attempts: u32, lockout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            lockout_ms: Ms::try_from(lockout.as_millis()).unwrap_or(Ms::MAX),
        }
    }

    pub fn lockout_secs(&self) -> u64 {
        ceil_secs(self.lockout_ms)
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_LOCKOUT)
    }
}

/// Milliseconds rounded up to whole seconds, so a countdown never shows 0
/// while the lockout still holds.
pub fn ceil_secs(ms: Ms) -> u64 {
    if ms <= 0 {
        return 0;
    }
    (ms as u64).div_ceil(1000)
}

/// Administrator credential pair recognized by the identity layer before
/// throttling is consulted.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminBypass {
    identifier: String,
    secret: String,
}

impl AdminBypass {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn matches(&self, identifier: &str, secret: &str) -> bool {
        self.identifier == identifier && self.secret == secret
    }
}

impl fmt::Debug for AdminBypass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminBypass")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub throttle: ThrottleConfig,
    pub admin_bypass: Option<AdminBypass>,
    pub ledger_path: PathBuf,
    pub sweep_interval: Duration,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            throttle: ThrottleConfig::default(),
            admin_bypass: None,
            ledger_path: PathBuf::from(DEFAULT_LEDGER_PATH),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Read `HALLKEEP_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Missing keys take defaults;
    /// unparsable values are logged and take defaults too.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let max_attempts = parse_or(&lookup, "HALLKEEP_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS);
        let lockout_secs = parse_or(&lookup, "HALLKEEP_LOCKOUT_SECS", DEFAULT_LOCKOUT.as_secs());
        let sweep_secs = parse_or(
            &lookup,
            "HALLKEEP_SWEEP_INTERVAL_SECS",
            DEFAULT_SWEEP_INTERVAL.as_secs(),
        );
        let compact_threshold =
            parse_or(&lookup, "HALLKEEP_COMPACT_THRESHOLD", DEFAULT_COMPACT_THRESHOLD);
        let metrics_port = lookup("HALLKEEP_METRICS_PORT").and_then(|s| s.parse().ok());
        let ledger_path = lookup("HALLKEEP_LEDGER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_PATH));

        // Both halves must be set; a lone identifier would match an empty secret.
        let admin_bypass = match (
            lookup("HALLKEEP_ADMIN_IDENTIFIER"),
            lookup("HALLKEEP_ADMIN_SECRET"),
        ) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some(AdminBypass::new(id, secret))
            }
            (None, None) => None,
            _ => {
                tracing::warn!("admin bypass needs both identifier and secret; disabled");
                None
            }
        };

        Self {
            throttle: ThrottleConfig::new(max_attempts, Duration::from_secs(lockout_secs)),
            admin_bypass,
            ledger_path,
            sweep_interval: Duration::from_secs(sweep_secs.max(1)),
            compact_threshold,
            metrics_port,
        }
    }
}

fn parse_or<T: FromStr + Copy>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("ignoring unparsable {key}={raw:?}");
            default
        }),
    }
}
