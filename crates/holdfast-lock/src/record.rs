//! The on-store lock record and its wire encoding.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use holdfast_core::{ClientIdentity, FileHandle, FileKind, ObjectId};
use serde::{Deserialize, Serialize};

/// One client's persisted claim on the repository.
///
/// Records are serialized as JSON with nanosecond-precision UTC timestamps.
/// The encoding is deterministic (fixed field order, fixed timestamp
/// rendering), so the content hash of a record is reproducible and serves as
/// its id. Decoding tolerates unknown fields for forward compatibility.
///
/// `username`, `uid`, and `gid` are informational; they are never used for
/// access control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Instant of creation or last refresh.
    #[serde(with = "rfc3339_nanos")]
    pub time: DateTime<Utc>,
    /// True for an exclusive claim, false for a shared one.
    pub exclusive: bool,
    /// Host the owning process runs on.
    pub hostname: String,
    /// Owner login name.
    pub username: String,
    /// Owner user id.
    pub uid: u32,
    /// Owner group id.
    pub gid: u32,
    /// OS process id of the owner.
    pub pid: u32,
}

impl LockRecord {
    /// Build a fresh record describing the given acquirer, stamped now.
    #[must_use]
    pub fn new(exclusive: bool, identity: &ClientIdentity) -> Self {
        Self {
            time: Utc::now(),
            exclusive,
            hostname: identity.hostname.clone(),
            username: identity.username.clone(),
            uid: identity.uid,
            gid: identity.gid,
            pid: identity.pid,
        }
    }

    /// The same claim with the timestamp moved to now.
    ///
    /// Refresh never mutates a stored record; it writes the re-stamped copy
    /// under its new id and removes the predecessor.
    #[must_use]
    pub fn restamped(&self) -> Self {
        Self {
            time: Utc::now(),
            ..self.clone()
        }
    }

    /// Serialize to the wire form.
    ///
    /// # Errors
    /// Returns an error if JSON serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from the wire form. Unknown fields are ignored.
    ///
    /// # Errors
    /// Returns an error if the bytes are not a valid record.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// The content id this record is stored under.
    ///
    /// # Errors
    /// Returns an error if the record cannot be encoded.
    pub fn id(&self) -> Result<ObjectId, serde_json::Error> {
        Ok(ObjectId::hash(&self.encode()?))
    }

    /// Whether another record describes the same owning process.
    #[must_use]
    pub fn same_process(&self, other: &Self) -> bool {
        self.hostname == other.hostname && self.pid == other.pid
    }
}

impl fmt::Display for LockRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PID {} on {} by {} (UID {}, GID {}), {}, created at {} ({} ago)",
            self.pid,
            self.hostname,
            self.username,
            self.uid,
            self.gid,
            if self.exclusive { "exclusive" } else { "shared" },
            self.time.format("%Y-%m-%d %H:%M:%S"),
            format_age(Utc::now() - self.time),
        )
    }
}

fn format_age(age: chrono::Duration) -> String {
    let secs = age.num_seconds().max(0);
    if secs >= 3600 {
        format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

/// RFC3339 with forced nanosecond precision and a "Z" suffix, so identical
/// instants always encode to identical bytes.
mod rfc3339_nanos {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Handle addressing a lock record on the store.
#[must_use]
pub fn lock_handle(id: ObjectId) -> FileHandle {
    FileHandle::new(FileKind::Lock, id)
}

/// Render a timestamp the way the record encoding does.
#[must_use]
pub fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
