//! End-to-end lock coordination scenarios.
//!
//! Exercises the full surface against the in-memory backend and the testkit
//! doubles: acquisition and conflict rules, retry budgets, cancellation,
//! refresh health driving the derived scope, stale-peer sweeping, and the
//! maintenance operations.

use std::sync::Arc;
use std::time::{Duration, Instant};

use holdfast_core::{hostname, ClientIdentity, ObjectId};
use holdfast_lock::{lock_handle, CancelScope, LockConfig, LockManager, LockRecord, LockStore};
use holdfast_store::{Backend, MemoryBackend};
use holdfast_testkit::{init_test_tracing, RecordingBackend, WriteOnceBackend};

// ─── Shared helpers ──────────────────────────────────────────────────────────

/// Acquisition backoff shrunk to test scale; refresh stays at defaults.
fn fast_config() -> LockConfig {
    LockConfig::default()
        .with_backoff_initial_ms(20)
        .with_backoff_cap_ms(50)
}

fn new_manager(backend: Arc<dyn Backend>) -> LockManager {
    LockManager::new(backend, fast_config())
}

/// One connection to the repository, as a client process would see it: the
/// shared backend, its own manager and registry.
fn connection(backend: &Arc<MemoryBackend>) -> LockManager {
    new_manager(backend.clone() as Arc<dyn Backend>)
}

fn memory() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::new())
}

async fn lock_count(backend: &Arc<MemoryBackend>) -> usize {
    LockStore::new(backend.clone() as Arc<dyn Backend>)
        .list()
        .await
        .unwrap()
        .len()
}

fn assert_elapsed_between(start: Instant, min: Duration, max: Duration) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= min && elapsed < max,
        "elapsed {elapsed:?} outside [{min:?}, {max:?})"
    );
}

// ─── Plain lock / unlock ─────────────────────────────────────────────────────

#[tokio::test]
async fn lock_and_unlock_cycles_cleanly() {
    init_test_tracing();
    let backend = memory();
    let manager = connection(&backend);
    let scope = CancelScope::new();

    let guard = manager.lock_shared(&scope, Duration::ZERO).await.unwrap();
    assert!(!guard.scope().is_cancelled());
    assert!(!guard.is_stale());
    assert_eq!(manager.registry().len(), 1);
    assert_eq!(lock_count(&backend).await, 1);

    guard.unlock().await;
    assert!(guard.scope().is_cancelled());
    assert_eq!(manager.registry().len(), 0);
    assert_eq!(lock_count(&backend).await, 0);
}

#[tokio::test]
async fn unlock_is_idempotent() {
    init_test_tracing();
    let backend = memory();
    let manager = connection(&backend);
    let scope = CancelScope::new();

    let guard = manager.lock_exclusive(&scope, Duration::ZERO).await.unwrap();
    guard.unlock().await;
    guard.unlock().await;
    assert!(guard.released());
    assert_eq!(lock_count(&backend).await, 0);
}

#[tokio::test]
async fn parent_cancellation_reaches_the_derived_scope() {
    init_test_tracing();
    let backend = memory();
    let manager = connection(&backend);
    let scope = CancelScope::new();

    let guard = manager.lock_shared(&scope, Duration::ZERO).await.unwrap();
    scope.cancel();
    tokio::time::timeout(Duration::from_secs(1), guard.scope().cancelled())
        .await
        .expect("derived scope should observe parent cancellation");

    // Release after a cancelled parent must still clean up.
    guard.unlock().await;
    assert_eq!(lock_count(&backend).await, 0);
}

// ─── Conflicts ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn conflicting_acquire_fails_fast_with_zero_budget() {
    init_test_tracing();
    let backend = memory();
    let holder = connection(&backend);
    let contender = connection(&backend);
    let scope = CancelScope::new();

    let guard = holder.lock_exclusive(&scope, Duration::ZERO).await.unwrap();

    let err = contender
        .lock_shared(&scope, Duration::ZERO)
        .await
        .unwrap_err();
    assert!(
        err.to_string().contains("already locked exclusively"),
        "unexpected message: {err}"
    );

    // Only the holder's record may remain on the store.
    assert_eq!(lock_count(&backend).await, 1);
    guard.unlock().await;
}

#[tokio::test]
async fn exclusive_acquire_conflicts_with_shared_holder() {
    init_test_tracing();
    let backend = memory();
    let holder = connection(&backend);
    let contender = connection(&backend);
    let scope = CancelScope::new();

    let guard = holder.lock_shared(&scope, Duration::ZERO).await.unwrap();

    let err = contender
        .lock_exclusive(&scope, Duration::ZERO)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "repository is already locked");
    guard.unlock().await;
}

#[tokio::test]
async fn shared_holders_coexist() {
    init_test_tracing();
    let backend = memory();
    let first = connection(&backend);
    let second = connection(&backend);
    let scope = CancelScope::new();

    let a = first.lock_shared(&scope, Duration::ZERO).await.unwrap();
    let b = second.lock_shared(&scope, Duration::ZERO).await.unwrap();
    assert_eq!(lock_count(&backend).await, 2);

    a.unlock().await;
    b.unlock().await;
    assert_eq!(lock_count(&backend).await, 0);
}

// ─── Retry budget ────────────────────────────────────────────────────────────

#[tokio::test]
async fn conflicting_acquire_waits_out_its_budget() {
    init_test_tracing();
    let backend = memory();
    let holder = connection(&backend);
    let contender = connection(&backend);
    let scope = CancelScope::new();

    let guard = holder.lock_exclusive(&scope, Duration::ZERO).await.unwrap();

    let retry_for = Duration::from_millis(200);
    let start = Instant::now();
    let err = contender.lock_shared(&scope, retry_for).await.unwrap_err();
    assert!(err.is_conflict());
    assert!(err.to_string().contains("already locked exclusively"));
    assert_elapsed_between(start, retry_for, retry_for * 3 / 2);

    guard.unlock().await;
}

#[tokio::test]
async fn cancelling_the_caller_scope_ends_the_wait_early() {
    init_test_tracing();
    let backend = memory();
    let holder = connection(&backend);
    let contender = connection(&backend);

    let holder_scope = CancelScope::new();
    let guard = holder
        .lock_exclusive(&holder_scope, Duration::ZERO)
        .await
        .unwrap();

    let scope = CancelScope::new();
    let cancel_after = Duration::from_millis(40);
    {
        let scope = scope.clone();
        tokio::spawn(async move {
            tokio::time::sleep(cancel_after).await;
            scope.cancel();
        });
    }

    let retry_for = Duration::from_millis(200);
    let start = Instant::now();
    let err = contender.lock_shared(&scope, retry_for).await.unwrap_err();
    assert!(err.to_string().contains("cancel"), "unexpected: {err}");
    assert_elapsed_between(start, cancel_after, retry_for - Duration::from_millis(10));

    guard.unlock().await;
}

#[tokio::test]
async fn waiting_acquire_succeeds_once_the_holder_releases() {
    init_test_tracing();
    let backend = memory();
    let holder = connection(&backend);
    let contender = connection(&backend);
    let scope = CancelScope::new();

    let guard = holder.lock_exclusive(&scope, Duration::ZERO).await.unwrap();
    {
        let guard = Arc::clone(&guard);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            guard.unlock().await;
        });
    }

    let retry_for = Duration::from_millis(200);
    let start = Instant::now();
    let won = contender.lock_shared(&scope, retry_for).await.unwrap();
    assert!(start.elapsed() < retry_for);

    won.unlock().await;
}

// ─── Refresh health ──────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_refresh_cancels_the_derived_scope() {
    init_test_tracing();
    let backend: Arc<dyn Backend> = Arc::new(WriteOnceBackend::new(memory()));
    let config = LockConfig::default()
        .with_refresh_interval_ms(20)
        .with_refreshability_timeout_ms(100);
    let manager = LockManager::new(backend, config);
    let scope = CancelScope::new();

    let guard = manager.lock_shared(&scope, Duration::ZERO).await.unwrap();

    tokio::time::timeout(Duration::from_secs(1), guard.scope().cancelled())
        .await
        .expect("failed refresh should cancel the derived scope");
    assert!(!scope.is_cancelled(), "parent scope must stay untouched");

    // Release after refresh loss must not crash.
    guard.unlock().await;
}

#[tokio::test]
async fn successful_refresh_keeps_the_scope_alive() {
    init_test_tracing();
    let recording = Arc::new(RecordingBackend::new(memory()));
    let config = LockConfig::default()
        .with_refresh_interval_ms(60)
        .with_refreshability_timeout_ms(500);
    let manager = LockManager::new(recording.clone() as Arc<dyn Backend>, config);
    let scope = CancelScope::new();

    let guard = manager.lock_shared(&scope, Duration::ZERO).await.unwrap();
    let original_id = guard.current_id();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(
        !guard.scope().is_cancelled(),
        "healthy refresh must keep the scope alive"
    );
    assert!(
        recording.count("save") >= 2,
        "expected refresh writes beyond the initial placement"
    );
    assert_ne!(guard.current_id(), original_id, "refresh rotates the id");

    // Each refresh removed its predecessor: exactly one record remains.
    let store = LockStore::new(recording as Arc<dyn Backend>);
    assert_eq!(store.list().await.unwrap().len(), 1);

    guard.unlock().await;
    assert!(guard.scope().is_cancelled());
}

// ─── unlock_all ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn unlock_all_releases_everything_held() {
    init_test_tracing();
    let backend = memory();
    let manager = connection(&backend);
    let scope = CancelScope::new();

    let guard = manager.lock_shared(&scope, Duration::ZERO).await.unwrap();

    let released = manager.unlock_all(Duration::ZERO).await;
    assert_eq!(released, 1);
    assert!(guard.scope().is_cancelled());
    assert_eq!(manager.registry().len(), 0);
    assert_eq!(lock_count(&backend).await, 0);

    // Nothing left to release.
    assert_eq!(manager.unlock_all(Duration::ZERO).await, 0);

    // A later unlock on the same guard stays a no-op.
    guard.unlock().await;
}

// ─── Stale peers & maintenance ───────────────────────────────────────────────

/// A crashed same-host peer: real hostname, a pid that cannot be running.
fn crashed_local_peer() -> ClientIdentity {
    ClientIdentity {
        hostname: hostname(),
        username: "peer".into(),
        uid: 500,
        gid: 500,
        pid: u32::MAX - 1,
    }
}

#[tokio::test]
async fn acquisition_sweeps_a_crashed_peers_exclusive_lock() {
    if !std::path::Path::new("/proc").exists() {
        return;
    }
    init_test_tracing();
    let backend = memory();
    let store = LockStore::new(backend.clone() as Arc<dyn Backend>);

    let abandoned = LockRecord::new(true, &crashed_local_peer());
    let abandoned_id = store.put(&abandoned).await.unwrap();

    let manager = connection(&backend);
    let scope = CancelScope::new();
    let guard = manager
        .lock_exclusive(&scope, Duration::ZERO)
        .await
        .unwrap();

    let remaining = store.list().await.unwrap();
    assert!(!remaining.contains(&abandoned_id));
    guard.unlock().await;
}

#[tokio::test]
async fn remove_stale_locks_spares_live_holders() {
    if !std::path::Path::new("/proc").exists() {
        return;
    }
    init_test_tracing();
    let backend = memory();
    let store = LockStore::new(backend.clone() as Arc<dyn Backend>);
    let manager = connection(&backend);
    let scope = CancelScope::new();

    let guard = manager.lock_shared(&scope, Duration::ZERO).await.unwrap();
    store
        .put(&LockRecord::new(false, &crashed_local_peer()))
        .await
        .unwrap();

    let removed = manager.remove_stale_locks().await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(lock_count(&backend).await, 1);

    guard.unlock().await;
}

#[tokio::test]
async fn corrupt_records_survive_the_stale_sweep() {
    init_test_tracing();
    let backend = memory();
    let manager = connection(&backend);

    let bogus_id = ObjectId::hash(b"damaged");
    backend
        .save(lock_handle(bogus_id), bytes::Bytes::from_static(b"{ oops"))
        .await
        .unwrap();

    let locks = manager.list_locks().await.unwrap();
    assert_eq!(locks.len(), 1);
    assert!(locks[0].1.is_none(), "corrupt record reports as None");

    // An undecodable record has no timestamp to age-check, so the stale
    // sweep leaves it alone.
    let removed = manager.remove_stale_locks().await.unwrap();
    assert_eq!(removed, 0);
    assert_eq!(lock_count(&backend).await, 1);

    // Only the unconditional sweep clears it.
    let removed = manager.remove_all_locks().await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(lock_count(&backend).await, 0);
}

#[tokio::test]
async fn remove_all_locks_clears_the_collection() {
    init_test_tracing();
    let backend = memory();
    let store = LockStore::new(backend.clone() as Arc<dyn Backend>);
    let manager = connection(&backend);

    let peer = ClientIdentity {
        hostname: "elsewhere".into(),
        username: "peer".into(),
        uid: 1,
        gid: 1,
        pid: 1,
    };
    for (i, exclusive) in [false, false, true].into_iter().enumerate() {
        let mut record = LockRecord::new(exclusive, &peer);
        // Distinct timestamps give distinct ids.
        record.time -= chrono::Duration::milliseconds(i64::try_from(i).unwrap() + 1);
        store.put(&record).await.unwrap();
    }
    assert_eq!(lock_count(&backend).await, 3);

    let removed = manager.remove_all_locks().await.unwrap();
    assert_eq!(removed, 3);
    assert_eq!(lock_count(&backend).await, 0);
}
