//! Last-write-wins conflict resolution.

use filesync_protocol::Timestamp;

/// Outcome of comparing the two sides of a digest conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The local copy is strictly newer.
    PushLocal,
    /// The remote copy is strictly newer.
    PullRemote,
    /// Identical mtimes: no side wins and nothing is transferred.
    Tie,
}

/// Resolves a conflict between differing contents by modification time.
///
/// Deterministic in its inputs. Only ever called once both digests are
/// known to differ. Remote mtimes arrive in the wire form, so both sides
/// are compared at wire precision.
pub fn resolve(local: Timestamp, remote: Timestamp) -> Resolution {
    match local.at_wire_precision().cmp(&remote.at_wire_precision()) {
        std::cmp::Ordering::Greater => Resolution::PushLocal,
        std::cmp::Ordering::Less => Resolution::PullRemote,
        std::cmp::Ordering::Equal => Resolution::Tie,
    }
}
