//! Typed addressing of repository objects.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ObjectId;

/// The collections a repository is partitioned into.
///
/// Each collection is a flat namespace of content-addressed files; no
/// directory hierarchy below the collection is assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Repository configuration.
    Config,
    /// Pack index files.
    Index,
    /// Encrypted master keys.
    Key,
    /// Advisory lock records.
    Lock,
    /// Data and tree packs.
    Pack,
    /// Snapshot manifests.
    Snapshot,
}

impl FileKind {
    /// Name of the collection on the store.
    #[must_use]
    pub const fn dirname(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Index => "index",
            Self::Key => "keys",
            Self::Lock => "locks",
            Self::Pack => "data",
            Self::Snapshot => "snapshots",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dirname())
    }
}

/// Addresses one object in the store: collection plus content id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHandle {
    /// Collection the object lives in.
    pub kind: FileKind,
    /// Content id naming the file within the collection.
    pub id: ObjectId,
}

impl FileHandle {
    /// Build a handle for an object of the given kind.
    #[must_use]
    pub const fn new(kind: FileKind, id: ObjectId) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}
