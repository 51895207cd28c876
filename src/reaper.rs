use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::model::Ms;
use crate::throttle::{expire, AttemptLedger, FileLedger, LedgerError};

/// Clear every ledger entry whose lockout has run out. Returns how many were
/// cleared. Entries with failures but no lockout are left alone.
pub async fn sweep_expired_lockouts<L: AttemptLedger>(ledger: &L, now: Ms) -> Result<usize, LedgerError> {
    let mut cleared = 0;
    for context in ledger.contexts().await? {
        let _held = ledger.context_locks().lock(&context).await;
        let entry = ledger.read(&context).await?;
        if entry.lockout_until.is_none() {
            continue;
        }
        let next = expire(entry, now);
        if next.is_zero() {
            ledger.write(&context, next).await?;
            debug!("lockout expired for {context}");
            cleared += 1;
        }
    }
    ledger.context_locks().prune();
    Ok(cleared)
}

/// Background task that periodically clears expired lockouts.
pub async fn run_sweeper<L: AttemptLedger>(ledger: Arc<L>, clock: Arc<dyn Clock>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        match sweep_expired_lockouts(ledger.as_ref(), clock.now_ms()).await {
            Ok(0) => {}
            Ok(n) => info!("swept {n} expired lockouts"),
            Err(e) => warn!("lockout sweep failed: {e}"),
        }
    }
}

/// Compact the ledger log once `threshold` appends have piled up since the
/// last compaction.
pub fn compact_if_needed(ledger: &FileLedger, threshold: u64) -> Result<bool, LedgerError> {
    if ledger.appends_since_compact() < threshold {
        return Ok(false);
    }
    ledger.compact()?;
    Ok(true)
}

/// Background task that checks the compaction threshold every `every`.
pub async fn run_compactor(ledger: Arc<FileLedger>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        match compact_if_needed(&ledger, threshold) {
            Ok(true) => info!("attempt ledger compacted"),
            Ok(false) => {}
            Err(e) => warn!("ledger compaction failed: {e}"),
        }
    }
}

/// Spawn the sweeper and the compactor for a durable ledger, using the
/// intervals and threshold from `config`.
pub fn spawn_maintenance(
    ledger: Arc<FileLedger>,
    clock: Arc<dyn Clock>,
    config: &Config,
) -> Vec<JoinHandle<()>> {
    let sweeper = tokio::spawn(run_sweeper(ledger.clone(), clock, config.sweep_interval));
    let compactor = tokio::spawn(run_compactor(
        ledger,
        config.compact_threshold,
        config.sweep_interval,
    ));
    vec![sweeper, compactor]
}
