//! Replica and sequence number identifiers.

use std::fmt;

#[cfg(any(feature = "quickcheck_generators", test))]
use quickcheck::{Arbitrary, Gen};

use serde::{Deserialize, Serialize};

/// The id of an individual replica of a CRDT.
///
/// Replica ids **must** be unique among replicas of a CRDT. A replica
/// whose id is `0` is conventionally read-only: it may receive merges,
/// but its mutators never originate new dots (see [`ReplicaId::is_read_only`]).
///
/// ##### Example
///
/// ```
/// use crdt::ReplicaId;
///
/// let id = ReplicaId::from(42);
/// assert_eq!(42, id.id());
/// assert!(!id.is_read_only());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaId(pub u64);

impl ReplicaId {
    /// The conventional read-only replica id.
    pub const READ_ONLY: ReplicaId = ReplicaId(0);

    /// Returns the underlying numeric id.
    pub fn id(self) -> u64 {
        self.0
    }

    /// Returns true if this replica id is the conventional read-only id.
    pub fn is_read_only(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for ReplicaId {
    fn from(id: u64) -> ReplicaId {
        ReplicaId(id)
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(any(feature = "quickcheck_generators", test))]
impl Arbitrary for ReplicaId {
    fn arbitrary(g: &mut Gen) -> ReplicaId {
        // Keep the space small so generated histories actually share
        // replica ids across operations; a fully random u64 would make
        // merges almost always disjoint.
        ReplicaId(u64::arbitrary(g) % 8)
    }
}

/// A per-replica monotonically increasing sequence number.
///
/// `SeqNum(0)` is reserved to mean "no event".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeqNum(pub u64);

impl SeqNum {
    /// The reserved "no event" sequence number.
    pub const NONE: SeqNum = SeqNum(0);

    /// Returns the underlying numeric sequence number.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Returns the next sequence number after this one.
    pub fn next(self) -> SeqNum {
        SeqNum(self.0 + 1)
    }
}

impl From<u64> for SeqNum {
    fn from(n: u64) -> SeqNum {
        SeqNum(n)
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(any(feature = "quickcheck_generators", test))]
impl Arbitrary for SeqNum {
    fn arbitrary(g: &mut Gen) -> SeqNum {
        SeqNum(u64::arbitrary(g) % 16)
    }
}
