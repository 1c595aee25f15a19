#[cfg(any(feature = "quickcheck_generators", test))]
use quickcheck::{Arbitrary, Gen};

use serde::{Deserialize, Serialize};

use crate::error::CrdtError;
use crate::kernel::{DotKernel, KernelScalar};
use crate::replica::ReplicaId;
use crate::token::{expect_count, FromTokens, ToTokens, Token};

/// An add-wins observed-remove set: a thin wrapper over [`DotKernel`]
/// fixing the aggregation rule so that a concurrent
/// `insert` always beats a concurrent `remove` of the same element
/// (the adder's dot is absent from the remover's context, so
/// `DotKernel::converge`'s observed-remove step can never drop it).
///
/// ##### Example
///
/// ```
/// use crdt::{ORSet, ReplicaId};
///
/// let a = ReplicaId::from(1);
/// let b = ReplicaId::from(2);
///
/// let mut set_a = ORSet::new(a);
/// let mut set_b = ORSet::new(b);
///
/// set_a.insert("x");
/// set_b.converge(&set_a);
/// assert!(set_b.contains(&"x"));
///
/// set_b.remove(&"x");
/// set_a.converge(&set_b);
/// assert!(!set_a.contains(&"x"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ORSet<T> {
    kernel: DotKernel<T>,
}

impl<T> ORSet<T> {
    /// Creates a new, empty set for replica `replica_id`.
    pub fn new(replica_id: ReplicaId) -> ORSet<T> {
        ORSet { kernel: DotKernel::new(replica_id) }
    }

    /// Like [`ORSet::new`], but rejects the read-only replica id
    /// instead of silently constructing a set whose mutators will all
    /// be no-ops.
    pub fn try_new(replica_id: ReplicaId) -> Result<ORSet<T>, CrdtError> {
        if replica_id.is_read_only() {
            return Err(CrdtError::OutOfRangeReplica);
        }
        Ok(ORSet::new(replica_id))
    }

    /// The replica id this set originates insertions for.
    pub fn replica_id(&self) -> ReplicaId {
        self.kernel.replica_id()
    }

    /// True if the set holds no elements.
    pub fn is_empty(&self) -> bool {
        self.kernel.is_empty()
    }

    /// The number of elements currently in the set.
    pub fn len(&self) -> usize {
        self.kernel.len()
    }

    /// An iterator over the set's current elements.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.kernel.values()
    }
}

impl<T: Eq> ORSet<T> {
    /// True if `value` is currently a member of the set.
    pub fn contains(&self, value: &T) -> bool {
        self.kernel.values().any(|v| v == value)
    }
}

impl<T: Clone + Eq> ORSet<T> {
    /// Inserts `value`, returning a delta containing only the new dot.
    pub fn insert(&mut self, value: T) -> ORSet<T> {
        ORSet { kernel: self.kernel.set(value) }
    }

    /// Removes every occurrence of `value`, returning a delta
    /// containing the removed dots.
    pub fn remove(&mut self, value: &T) -> ORSet<T> {
        ORSet { kernel: self.kernel.remove_value(value, |a, b| a == b) }
    }

    /// Removes every element, returning a delta containing every
    /// removed dot (the `Causal::clear` operation).
    pub fn clear(&mut self) -> ORSet<T> {
        ORSet { kernel: self.kernel.remove_all() }
    }

    /// Merges `other` (a full state or a delta) into this set.
    /// Returns true iff this set gained any new information.
    pub fn converge(&mut self, other: &ORSet<T>) -> bool {
        self.kernel.converge(&other.kernel)
    }
}

impl<T: PartialEq> PartialEq for ORSet<T> {
    fn eq(&self, other: &ORSet<T>) -> bool {
        self.kernel == other.kernel
    }
}

impl<T: Eq> Eq for ORSet<T> {}

impl<T: Clone> ToTokens<KernelScalar<T>> for ORSet<T> {
    fn to_tokens(&self, tokens: &mut Vec<Token<KernelScalar<T>>>) {
        tokens.push(Token::Count(1));
        for t in self.kernel.tokens() {
            tokens.push(t);
        }
    }
}

impl<T> FromTokens<KernelScalar<T>> for ORSet<T> {
    fn from_tokens(iter: &mut dyn Iterator<Item = Token<KernelScalar<T>>>) -> Result<Self, CrdtError> {
        expect_count(iter, 1)?;
        Ok(ORSet { kernel: DotKernel::from_tokens(iter)? })
    }
}

impl<T: Clone + Eq> crate::Create for ORSet<T> {
    fn create(replica_id: ReplicaId) -> ORSet<T> {
        ORSet::new(replica_id)
    }
}

impl<T: Clone + Eq> crate::Convergent for ORSet<T> {
    fn converge(&mut self, other: &ORSet<T>) -> bool {
        ORSet::converge(self, other)
    }
}

impl<T: Clone + Eq> crate::Causal for ORSet<T> {
    fn is_empty(&self) -> bool {
        ORSet::is_empty(self)
    }
    fn clear(&mut self) -> ORSet<T> {
        ORSet::clear(self)
    }
}

#[cfg(any(feature = "quickcheck_generators", test))]
impl<T: Arbitrary + Clone + Eq> Arbitrary for ORSet<T> {
    fn arbitrary(g: &mut Gen) -> ORSet<T> {
        ORSet { kernel: DotKernel::arbitrary(g) }
    }
}
