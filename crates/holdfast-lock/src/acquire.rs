//! The acquisition protocol.
//!
//! The store offers no compare-and-swap, so placement is a two-phase dance:
//! scan for conflicts, place our record, then scan again. If the second scan
//! reveals a conflicting peer record that our first scan missed, the race is
//! resolved by a total order every client agrees on: the lexicographically
//! smaller id wins, the loser withdraws its record. Concurrent writers thus
//! converge on a deterministic winner without coordination.

use std::time::Duration;

use chrono::Utc;
use holdfast_core::{ClientIdentity, ObjectId};
use tokio::time::Instant;
use tracing::debug;

use crate::config::LockConfig;
use crate::error::LockError;
use crate::record::LockRecord;
use crate::scope::CancelScope;
use crate::stale;
use crate::store::LockStore;

/// Try to place a lock record, retrying conflicts with exponential backoff
/// until success, budget exhaustion, or cancellation.
///
/// With a zero `retry_for` a conflict fails immediately.
pub(crate) async fn acquire(
    store: &LockStore,
    config: &LockConfig,
    identity: &ClientIdentity,
    exclusive: bool,
    retry_for: Duration,
    scope: &CancelScope,
) -> Result<(LockRecord, ObjectId), LockError> {
    let start = Instant::now();
    let mut backoff = config.backoff_initial();

    loop {
        if scope.is_cancelled() {
            return Err(LockError::Cancelled);
        }
        match try_acquire(store, config, identity, exclusive).await {
            Ok(placed) => return Ok(placed),
            Err(err @ LockError::AlreadyLocked { .. }) => {
                let elapsed = start.elapsed();
                if retry_for.is_zero() || elapsed >= retry_for {
                    return Err(err);
                }
                let sleep = backoff.min(retry_for - elapsed);
                debug!(exclusive, ?sleep, "repository locked by a peer, backing off");
                tokio::select! {
                    () = scope.cancelled() => return Err(LockError::Cancelled),
                    () = tokio::time::sleep(sleep) => {}
                }
                backoff = (backoff * 2).min(config.backoff_cap());
            }
            Err(err) => return Err(err),
        }
    }
}

/// One pass of the protocol: scan, place, re-scan, withdraw on loss.
async fn try_acquire(
    store: &LockStore,
    config: &LockConfig,
    identity: &ClientIdentity,
    exclusive: bool,
) -> Result<(LockRecord, ObjectId), LockError> {
    check_conflicts(store, config, identity, exclusive, None).await?;

    let record = LockRecord::new(exclusive, identity);
    let id = store.put(&record).await?;

    // A peer may have placed a conflicting record between our scan and our
    // write. Re-scan; on loss our record must not linger and block them.
    if let Err(err) = check_conflicts(store, config, identity, exclusive, Some(id)).await {
        if let Err(remove_err) = store.remove(id).await {
            debug!(lock = %id, error = %remove_err, "could not withdraw losing lock record");
        }
        return Err(err);
    }

    Ok((record, id))
}

/// Scan all lock records for a conflict with the desired mode.
///
/// Stale records are dropped from consideration and removed best-effort.
/// Corrupt records never block acquisition. With `own` set (the re-scan
/// after placement), only conflicting peers whose id sorts before ours count
/// as a loss; later ids will withdraw themselves when they re-scan.
async fn check_conflicts(
    store: &LockStore,
    config: &LockConfig,
    identity: &ClientIdentity,
    exclusive: bool,
    own: Option<ObjectId>,
) -> Result<(), LockError> {
    let now = Utc::now();
    for id in store.list().await? {
        if own == Some(id) {
            continue;
        }
        let record = match store.load(id).await {
            Ok(record) => record,
            Err(LockError::Corrupt { id, reason }) => {
                debug!(lock = %id, %reason, "skipping corrupt lock record");
                continue;
            }
            Err(err) => return Err(err),
        };

        if stale::is_suspicious(&record, now, config) {
            debug!(lock = %id, time = %record.time, "lock record dated in the future, treating owner as alive");
        } else if stale::is_stale(&record, now, config, identity) {
            debug!(lock = %id, "removing stale lock record");
            if let Err(err) = store.remove(id).await {
                debug!(lock = %id, error = %err, "could not remove stale lock record");
            }
            continue;
        }

        if !(exclusive || record.exclusive) {
            continue;
        }
        match own {
            None => {
                return Err(LockError::AlreadyLocked {
                    exclusive: record.exclusive,
                })
            }
            Some(our_id) if id < our_id => {
                return Err(LockError::AlreadyLocked {
                    exclusive: record.exclusive,
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}
