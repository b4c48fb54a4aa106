//! The staleness oracle.
//!
//! Decides whether a lock record's owner is believed dead. Cross-host
//! liveness is unknowable without consensus, so only same-host records get a
//! pid probe; foreign records fall back purely to the age threshold. It is
//! safer to wait than to break another host's lock.

use chrono::{DateTime, Utc};
use holdfast_core::{pid_alive, ClientIdentity};

use crate::config::LockConfig;
use crate::record::LockRecord;

/// Whether a record is timestamped suspiciously far in the future.
///
/// A peer's clock may run ahead of ours; anything within one refresh
/// interval of skew is normal. Beyond that the record is suspicious, but
/// never stale: its owner may be alive and merely mis-clocked.
pub(crate) fn is_suspicious(
    record: &LockRecord,
    now: DateTime<Utc>,
    config: &LockConfig,
) -> bool {
    let Ok(skew) = chrono::Duration::from_std(config.refresh_interval()) else {
        return false;
    };
    record.time > now + skew
}

/// Whether a record's owner is believed dead.
///
/// A record is stale iff any of:
/// 1. it is older than the stale age;
/// 2. it names the local host and its pid is not alive here.
///
/// Future-dated records (see [`is_suspicious`]) are never stale.
pub(crate) fn is_stale(
    record: &LockRecord,
    now: DateTime<Utc>,
    config: &LockConfig,
    local: &ClientIdentity,
) -> bool {
    if is_suspicious(record, now, config) {
        return false;
    }
    let age = now - record.time;
    if let Ok(stale_age) = chrono::Duration::from_std(config.stale_age()) {
        if age > stale_age {
            return true;
        }
    }
    record.hostname == local.hostname && !pid_alive(record.pid)
}
