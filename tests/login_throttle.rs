use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ulid::Ulid;

use hallkeep::clock::ManualClock;
use hallkeep::config::Config;
use hallkeep::model::LoginContext;
use hallkeep::reaper::sweep_expired_lockouts;
use hallkeep::throttle::*;

// ── Test infrastructure ──────────────────────────────────────

type Guard = LoginGuard<FileLedger, WithAdminBypass<InMemoryIdentity>>;

const ADMIN: &str = "sindico@condominio.example";
const ADMIN_SECRET: &str = "portaria-2025";
const RESIDENT: &str = "ana@example.com";

fn ledger_path() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("hallkeep_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join("attempts.ledger")
}

fn config(path: &Path) -> Config {
    let path = path.display().to_string();
    Config::from_lookup(|key| match key {
        "HALLKEEP_LEDGER_PATH" => Some(path.clone()),
        "HALLKEEP_ADMIN_IDENTIFIER" => Some(ADMIN.into()),
        "HALLKEEP_ADMIN_SECRET" => Some(ADMIN_SECRET.into()),
        _ => None,
    })
}

fn guard(config: &Config, clock: Arc<ManualClock>) -> (Guard, Arc<FileLedger>) {
    let ledger = Arc::new(FileLedger::open(&config.ledger_path).unwrap());
    let accounts = InMemoryIdentity::new();
    accounts.add_account(RESIDENT, "s3cret", true);
    let identity = WithAdminBypass::new(accounts, config.admin_bypass.clone());
    let guard = LoginGuard::new(ledger.clone(), Arc::new(identity), clock, config.throttle);
    (guard, ledger)
}

fn denied(decision: LoginDecision) -> Denial {
    match decision {
        LoginDecision::Denied(d) => d,
        other => panic!("expected denial, got {other:?}"),
    }
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn lockout_survives_restart_and_expires() {
    let path = ledger_path();
    let config = config(&path);
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let ctx = LoginContext::from("browser-7f3a");

    {
        let (guard, _) = guard(&config, clock.clone());
        for expected in [2, 1] {
            let d = denied(guard.attempt_login(&ctx, RESIDENT, "nope").await.unwrap());
            assert_eq!(d, Denial::InvalidCredentials { remaining_attempts: expected });
        }
        let d = denied(guard.attempt_login(&ctx, RESIDENT, "nope").await.unwrap());
        assert_eq!(d, Denial::LockedOut { lockout_secs: 900 });
    }

    // Process restarts five minutes later
    clock.advance(Duration::from_secs(300));
    let (guard, _) = guard(&config, clock.clone());
    let d = denied(guard.attempt_login(&ctx, RESIDENT, "s3cret").await.unwrap());
    assert_eq!(d, Denial::StillLocked { remaining_secs: 600 });
    assert_eq!(
        guard.status(&ctx).await.unwrap(),
        LockStatus::Locked { remaining_secs: 600 }
    );

    clock.advance(Duration::from_secs(600));
    assert_eq!(
        guard.attempt_login(&ctx, RESIDENT, "s3cret").await.unwrap(),
        LoginDecision::Allowed(Principal::Resident(RESIDENT.into()))
    );
    assert_eq!(
        guard.status(&ctx).await.unwrap(),
        LockStatus::Unlocked { remaining_attempts: 3 }
    );
}

#[tokio::test]
async fn admin_bypass_from_config_ignores_lockout() {
    let path = ledger_path();
    let config = config(&path);
    let clock = Arc::new(ManualClock::new(0));
    let (guard, ledger) = guard(&config, clock);
    let ctx = LoginContext::from("front-desk");

    for _ in 0..3 {
        guard.attempt_login(&ctx, RESIDENT, "nope").await.unwrap();
    }
    let locked = ledger.read(&ctx).await.unwrap();
    assert!(locked.lockout_until.is_some());

    assert_eq!(
        guard.attempt_login(&ctx, ADMIN, ADMIN_SECRET).await.unwrap(),
        LoginDecision::Allowed(Principal::Administrator)
    );
    assert_eq!(ledger.read(&ctx).await.unwrap(), locked);

    // Wrong admin secret is an ordinary attempt and stays locked out
    let d = denied(guard.attempt_login(&ctx, ADMIN, "guess").await.unwrap());
    assert!(matches!(d, Denial::StillLocked { .. }));
}

#[tokio::test]
async fn sweep_clears_lockouts_in_the_file_ledger() {
    let path = ledger_path();
    let config = config(&path);
    let clock = Arc::new(ManualClock::new(0));
    let (guard, ledger) = guard(&config, clock.clone());

    for name in ["a", "b"] {
        let ctx = LoginContext::from(name);
        for _ in 0..3 {
            guard.attempt_login(&ctx, RESIDENT, "nope").await.unwrap();
        }
    }
    guard
        .attempt_login(&LoginContext::from("c"), RESIDENT, "nope")
        .await
        .unwrap();
    assert_eq!(ledger.contexts().await.unwrap().len(), 3);

    clock.advance(Duration::from_secs(15 * 60));
    let cleared = sweep_expired_lockouts(ledger.as_ref(), 15 * 60 * 1000).await.unwrap();
    assert_eq!(cleared, 2);

    drop(guard);
    drop(ledger);
    let reopened = FileLedger::open(&path).unwrap();
    let remaining = reopened.contexts().await.unwrap();
    assert_eq!(remaining, vec![LoginContext::from("c")]);
}
