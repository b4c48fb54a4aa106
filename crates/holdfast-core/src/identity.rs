//! Owner identity for repository claims, and the local liveness probe.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Identity of the client process that owns a claim.
///
/// `username`, `uid`, and `gid` are informational only; they are never used
/// for access control. `hostname` and `pid` feed the staleness oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub hostname: String,
    pub username: String,
    pub uid: u32,
    pub gid: u32,
    pub pid: u32,
}

impl ClientIdentity {
    /// Identity of the current process.
    #[must_use]
    pub fn current() -> Self {
        let (uid, gid) = current_uid_gid();
        Self {
            hostname: hostname(),
            username: username(),
            uid,
            gid,
            pid: std::process::id(),
        }
    }

    /// Whether this identity names a process on the local host.
    #[must_use]
    pub fn is_local_host(&self) -> bool {
        self.hostname == hostname()
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} (pid {}, uid {}, gid {})",
            self.username, self.hostname, self.pid, self.uid, self.gid
        )
    }
}

/// The system hostname, or "unknown" if it can't be determined.
#[must_use]
pub fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("HOST"))
        .unwrap_or_else(|_| "unknown".into())
}

/// Check whether a PID is alive on the local system.
///
/// Uses `/proc/<pid>` existence as a safe alternative to `kill(pid, 0)`.
/// Where `/proc` is unavailable the probe cannot verify anything, so it
/// reports the process as alive; waiting on a possibly-dead peer is safer
/// than breaking a live one's lock.
#[must_use]
pub fn pid_alive(pid: u32) -> bool {
    if !Path::new("/proc").exists() {
        return true;
    }
    Path::new(&format!("/proc/{pid}")).exists()
}

fn username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".into())
}

/// Parse uid/gid from `/proc/self/status`. Falls back to (0, 0) where the
/// procfs view is unavailable.
fn current_uid_gid() -> (u32, u32) {
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return (0, 0);
    };
    let field = |tag: &str| -> u32 {
        status
            .lines()
            .find_map(|line| line.strip_prefix(tag))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    };
    (field("Uid:"), field("Gid:"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_identity_names_this_process() {
        let identity = ClientIdentity::current();
        assert_eq!(identity.pid, std::process::id());
        assert!(!identity.hostname.is_empty());
        assert!(identity.is_local_host());
    }

    #[test]
    fn own_pid_is_alive() {
        assert!(pid_alive(std::process::id()));
    }

    #[test]
    fn implausible_pid_is_dead() {
        // PID max on Linux is bounded well below this.
        if Path::new("/proc").exists() {
            assert!(!pid_alive(u32::MAX));
        }
    }

    #[test]
    fn identity_serde_roundtrip() {
        let identity = ClientIdentity::current();
        let json = serde_json::to_string(&identity).unwrap();
        let back: ClientIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, identity);
    }
}
