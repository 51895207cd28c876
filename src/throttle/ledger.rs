use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::locks::KeyedLocks;
use crate::model::{LedgerEntry, LedgerRecord, LoginContext};
use crate::wal::Wal;

use super::LedgerError;

/// Per-context record of failed attempts and lockout expiry.
///
/// Writes replace the previous entry. Writing a zero entry removes the
/// context, so a clean slate and "never seen" read the same.
///
/// `read` and `write` are individually atomic. A read-modify-write must hold
/// the context's lock from [`AttemptLedger::context_locks`] across both.
#[async_trait]
pub trait AttemptLedger: Send + Sync + 'static {
    async fn read(&self, context: &LoginContext) -> Result<LedgerEntry, LedgerError>;

    async fn write(&self, context: &LoginContext, entry: LedgerEntry) -> Result<(), LedgerError>;

    /// Contexts with a non-zero entry.
    async fn contexts(&self) -> Result<Vec<LoginContext>, LedgerError>;

    fn context_locks(&self) -> &KeyedLocks<LoginContext>;
}

/// Process-local ledger. State is lost on restart.
#[derive(Default)]
pub struct InMemoryLedger {
    entries: DashMap<LoginContext, LedgerEntry>,
    locks: KeyedLocks<LoginContext>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptLedger for InMemoryLedger {
    async fn read(&self, context: &LoginContext) -> Result<LedgerEntry, LedgerError> {
        Ok(self
            .entries
            .get(context)
            .map(|e| *e.value())
            .unwrap_or_default())
    }

    async fn write(&self, context: &LoginContext, entry: LedgerEntry) -> Result<(), LedgerError> {
        if entry.is_zero() {
            self.entries.remove(context);
        } else {
            self.entries.insert(context.clone(), entry);
        }
        Ok(())
    }

    async fn contexts(&self) -> Result<Vec<LoginContext>, LedgerError> {
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }

    fn context_locks(&self) -> &KeyedLocks<LoginContext> {
        &self.locks
    }
}

/// Durable ledger: every write is appended to an fsynced log before the
/// in-memory view changes, and the view is rebuilt by replay on open.
pub struct FileLedger {
    entries: DashMap<LoginContext, LedgerEntry>,
    wal: Mutex<Wal>,
    locks: KeyedLocks<LoginContext>,
}

impl FileLedger {
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        let (wal, records) = Wal::recover(path)?;
        let entries = DashMap::new();
        for record in records {
            apply_record(&entries, record);
        }
        tracing::info!(
            "attempt ledger opened at {} ({} contexts)",
            path.display(),
            entries.len()
        );
        Ok(Self {
            entries,
            wal: Mutex::new(wal),
            locks: KeyedLocks::new(),
        })
    }

    fn lock_wal(&self) -> Result<std::sync::MutexGuard<'_, Wal>, LedgerError> {
        self.wal
            .lock()
            .map_err(|_| LedgerError::Corrupt("ledger writer poisoned by an earlier panic".into()))
    }

    /// Rewrite the log with one record per live context.
    pub fn compact(&self) -> Result<(), LedgerError> {
        let mut wal = self.lock_wal()?;
        let records: Vec<LedgerRecord> = self
            .entries
            .iter()
            .map(|e| LedgerRecord::Set {
                context: e.key().clone(),
                entry: *e.value(),
            })
            .collect();
        wal.compact(&records)?;
        tracing::debug!("attempt ledger compacted to {} records", records.len());
        Ok(())
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.lock_wal()
            .map(|wal| wal.appends_since_compact())
            .unwrap_or(0)
    }
}

fn apply_record(entries: &DashMap<LoginContext, LedgerEntry>, record: LedgerRecord) {
    match record {
        LedgerRecord::Set { context, entry } => {
            entries.insert(context, entry);
        }
        LedgerRecord::Clear { context } => {
            entries.remove(&context);
        }
    }
}

#[async_trait]
impl AttemptLedger for FileLedger {
    async fn read(&self, context: &LoginContext) -> Result<LedgerEntry, LedgerError> {
        Ok(self
            .entries
            .get(context)
            .map(|e| *e.value())
            .unwrap_or_default())
    }

    async fn write(&self, context: &LoginContext, entry: LedgerEntry) -> Result<(), LedgerError> {
        let record = if entry.is_zero() {
            LedgerRecord::Clear {
                context: context.clone(),
            }
        } else {
            LedgerRecord::Set {
                context: context.clone(),
                entry,
            }
        };

        // Hold the writer across apply so log order matches map order.
        let mut wal = self.lock_wal()?;
        let flush_start = std::time::Instant::now();
        wal.append(&record)?;
        metrics::histogram!(crate::observability::LEDGER_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        apply_record(&self.entries, record);
        metrics::gauge!(crate::observability::LEDGER_CONTEXTS).set(self.entries.len() as f64);
        Ok(())
    }

    async fn contexts(&self) -> Result<Vec<LoginContext>, LedgerError> {
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }

    fn context_locks(&self) -> &KeyedLocks<LoginContext> {
        &self.locks
    }
}
