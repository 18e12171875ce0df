//! Content fingerprinting.
//!
//! Every equality decision in filesync goes through a [`Fingerprint`]: two
//! files are the same content iff both fingerprints are readable and carry
//! the same SHA-256 digest. A file that could not be read produces
//! [`Fingerprint::Unreadable`], which never matches anything.

use crate::error::ProtocolError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::str::FromStr;

/// Read buffer size used by [`fingerprint`].
pub const CHUNK_SIZE: usize = 8 * 1024;

/// SHA-256 digest of a file's bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Wraps raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Digests an in-memory buffer.
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps decision logs readable.
        write!(f, "ContentDigest({}…)", &self.to_hex()[..12])
    }
}

impl FromStr for ContentDigest {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| ProtocolError::InvalidDigest(format!("{s:?}: {e}")))?;
        Ok(Self(bytes))
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Result of fingerprinting a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fingerprint {
    /// The file was read to the end.
    Content(ContentDigest),
    /// The file could not be read (missing, locked, not a file).
    Unreadable,
}

impl Fingerprint {
    /// Returns true only if both sides were readable and their digests agree.
    ///
    /// `Unreadable` never matches, not even another `Unreadable`.
    pub fn matches(&self, other: &Fingerprint) -> bool {
        match (self, other) {
            (Fingerprint::Content(a), Fingerprint::Content(b)) => a == b,
            _ => false,
        }
    }

    /// Returns the digest if the file was readable.
    pub fn digest(&self) -> Option<ContentDigest> {
        match self {
            Fingerprint::Content(d) => Some(*d),
            Fingerprint::Unreadable => None,
        }
    }

    /// Returns true for [`Fingerprint::Unreadable`].
    pub fn is_unreadable(&self) -> bool {
        matches!(self, Fingerprint::Unreadable)
    }
}

impl From<ContentDigest> for Fingerprint {
    fn from(digest: ContentDigest) -> Self {
        Fingerprint::Content(digest)
    }
}

impl From<Option<ContentDigest>> for Fingerprint {
    fn from(digest: Option<ContentDigest>) -> Self {
        digest.map_or(Fingerprint::Unreadable, Fingerprint::Content)
    }
}

/// Fingerprints a byte stream, reading it in [`CHUNK_SIZE`] chunks.
///
/// The result depends only on the bytes, never on how the reader splits
/// them. A read error yields [`Fingerprint::Unreadable`].
pub fn fingerprint<R: Read>(mut reader: R) -> Fingerprint {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!("stream unreadable while fingerprinting: {e}");
                return Fingerprint::Unreadable;
            }
        }
    }

    Fingerprint::Content(ContentDigest(hasher.finalize().into()))
}

/// Fingerprints the file at `path`.
pub fn fingerprint_file(path: &Path) -> Fingerprint {
    match File::open(path) {
        Ok(file) => fingerprint(file),
        Err(e) => {
            tracing::debug!("cannot open {} for fingerprinting: {e}", path.display());
            Fingerprint::Unreadable
        }
    }
}
