//! The causal event identifier shared by every CRDT in this crate.

use std::fmt;

#[cfg(any(feature = "quickcheck_generators", test))]
use quickcheck::{Arbitrary, Gen};

use serde::{Deserialize, Serialize};

use crate::replica::{ReplicaId, SeqNum};

/// A `(ReplicaId, SeqNum)` pair uniquely identifying one event on one
/// replica.
///
/// Ordering is lexicographic on `(replica_id, seq)`.
///
/// ##### Example
///
/// ```
/// use crdt::{Dot, ReplicaId, SeqNum};
///
/// let d = Dot::new(ReplicaId::from(1), SeqNum::from(1));
/// assert!(d < Dot::new(ReplicaId::from(1), SeqNum::from(2)));
/// assert!(d < Dot::new(ReplicaId::from(2), SeqNum::from(1)));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Dot {
    pub replica_id: ReplicaId,
    pub seq: SeqNum,
}

impl Dot {
    /// Creates a new dot from a replica id and sequence number.
    pub fn new(replica_id: ReplicaId, seq: SeqNum) -> Dot {
        Dot { replica_id, seq }
    }
}

impl fmt::Display for Dot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.replica_id, self.seq)
    }
}

#[cfg(any(feature = "quickcheck_generators", test))]
impl Arbitrary for Dot {
    fn arbitrary(g: &mut Gen) -> Dot {
        Dot::new(ReplicaId::arbitrary(g), SeqNum::arbitrary(g))
    }
}
