//! Content-addressed object identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Content-addressed identifier of one stored object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(#[serde(with = "hex::serde")] [u8; 32]);

impl ObjectId {
    /// Construct an `ObjectId` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hash content into its id.
    ///
    /// This is the repository's canonical hash; any client hashing the same
    /// bytes obtains the same id.
    #[must_use]
    pub fn hash(content: &[u8]) -> Self {
        Self(*blake3::hash(content).as_bytes())
    }

    /// Short hex prefix for log output.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectId").field(&self.to_string()).finish()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Error parsing an [`ObjectId`] from its hex rendering.
#[derive(Debug, Error)]
pub enum IdParseError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("wrong length: expected 32 bytes, got {0}")]
    Length(usize),
}

impl FromStr for ObjectId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| IdParseError::Length(v.len()))?;
        Ok(Self(arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let a = ObjectId::hash(b"some lock record");
        let b = ObjectId::hash(b"some lock record");
        assert_eq!(a, b);
        assert_ne!(a, ObjectId::hash(b"a different record"));
    }

    #[test]
    fn display_roundtrips_through_from_str() {
        let id = ObjectId::hash(b"roundtrip");
        let rendered = id.to_string();
        assert_eq!(rendered.len(), 64);
        assert_eq!(rendered.parse::<ObjectId>().unwrap(), id);
    }

    #[test]
    fn from_str_rejects_bad_input() {
        assert!(matches!(
            "zz".repeat(32).parse::<ObjectId>(),
            Err(IdParseError::Hex(_))
        ));
        assert!(matches!(
            "abcd".parse::<ObjectId>(),
            Err(IdParseError::Length(2))
        ));
    }

    #[test]
    fn serde_uses_hex_strings() {
        let id = ObjectId::hash(b"serde");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn ordering_follows_byte_order() {
        let lo = ObjectId::from_bytes([0x00; 32]);
        let hi = ObjectId::from_bytes([0xFF; 32]);
        assert!(lo < hi);
    }
}
