//! The per-lock refresh task.
//!
//! Each held lock runs one background task that re-stamps the record every
//! refresh interval. A failed refresh is tolerated while the record is still
//! young enough to be honored by peers; once the last successful refresh is
//! older than the refreshability timeout, the task cancels the lock's scope
//! and stops. The owning operation observes the cancellation at its next
//! suspension point and aborts before it can mutate a repository it no
//! longer holds.
//!
//! A refresh step writes the re-stamped record under its new id first and
//! removes the predecessor second. If the write fails, the old record stays
//! authoritative and the step simply failed. If the remove fails, the orphan
//! is bounded garbage: it ages past the stale threshold and any peer's scan
//! sweeps it. The shared current-id is updated only after the write
//! succeeds.
//!
//! Wall clocks may step backwards between refreshes; a re-stamp with a
//! timestamp at or before the predecessor's is accepted, since staleness
//! only compares ages against the stale threshold.

use std::sync::Arc;

use holdfast_core::ObjectId;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::LockConfig;
use crate::error::LockError;
use crate::guard::LockState;
use crate::record::LockRecord;
use crate::scope::CancelScope;
use crate::store::LockStore;

/// Spawn the refresh task for a freshly acquired lock.
///
/// The task exits when the scope cancels (release, parent cancellation) or
/// when it declares the lock lost and cancels the scope itself.
pub(crate) fn spawn(
    store: LockStore,
    config: LockConfig,
    record: LockRecord,
    state: Arc<Mutex<LockState>>,
    scope: CancelScope,
) -> JoinHandle<()> {
    tokio::spawn(run(store, config, record, state, scope))
}

async fn run(
    store: LockStore,
    config: LockConfig,
    record: LockRecord,
    state: Arc<Mutex<LockState>>,
    scope: CancelScope,
) {
    let mut timer = interval(config.refresh_interval());
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the record was just written.
    timer.tick().await;

    let mut last_success = Instant::now();
    loop {
        tokio::select! {
            () = scope.cancelled() => break,
            _ = timer.tick() => {
                match refresh_step(&store, &record, &state).await {
                    Ok(id) => {
                        last_success = Instant::now();
                        debug!(lock = %id.short(), "lock record refreshed");
                    }
                    Err(err) => {
                        warn!(error = %err, "lock refresh failed");
                        if last_success.elapsed() > config.refreshability_timeout() {
                            warn!(
                                timeout_ms = config.refreshability_timeout_ms,
                                "lock not refreshable within the timeout, cancelling operation"
                            );
                            scope.cancel();
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// Write the re-stamped record, publish its id, remove the predecessor.
async fn refresh_step(
    store: &LockStore,
    base: &LockRecord,
    state: &Arc<Mutex<LockState>>,
) -> Result<ObjectId, LockError> {
    let fresh = base.restamped();
    let new_id = store.put(&fresh).await?;
    let prior = {
        let mut state = state.lock();
        let prior = state.id;
        state.id = new_id;
        state.time = fresh.time;
        prior
    };
    if prior != new_id {
        if let Err(err) = store.remove(prior).await {
            debug!(lock = %prior.short(), error = %err, "could not remove predecessor lock record");
        }
    }
    Ok(new_id)
}
