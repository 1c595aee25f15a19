#[cfg(any(feature = "quickcheck_generators", test))]
use quickcheck::{Arbitrary, Gen};

use serde::{Deserialize, Serialize};

use crate::error::CrdtError;
use crate::kernel::{DotKernelSingle, KernelScalar};
use crate::replica::ReplicaId;
use crate::token::{expect_count, FromTokens, ToTokens, Token};

/// A single-value, last-writer-wins register built on
/// [`DotKernelSingle`]: a last-writer-wins register whose winner is
/// chosen causally rather than by timestamp. When two replicas have
/// each written a value for the
/// same register, the write whose dot has the higher sequence number
/// for its replica wins — there is no wall-clock or transaction-id
/// tie-break, and no clock source to keep synchronized across
/// replicas.
///
/// ##### Example
///
/// ```
/// use crdt::{CausalLwwRegister, ReplicaId};
///
/// let a = ReplicaId::from(1);
/// let mut reg = CausalLwwRegister::new(a);
///
/// reg.set("v1");
/// reg.set("v2");
/// assert_eq!(Some(&"v2"), reg.get());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalLwwRegister<T> {
    kernel: DotKernelSingle<T>,
}

impl<T> CausalLwwRegister<T> {
    /// Creates a new, empty register for replica `replica_id`.
    pub fn new(replica_id: ReplicaId) -> CausalLwwRegister<T> {
        CausalLwwRegister { kernel: DotKernelSingle::new(replica_id) }
    }

    /// Like [`CausalLwwRegister::new`], but rejects the read-only
    /// replica id instead of silently constructing a register whose
    /// writes will all be no-ops.
    pub fn try_new(replica_id: ReplicaId) -> Result<CausalLwwRegister<T>, CrdtError> {
        if replica_id.is_read_only() {
            return Err(CrdtError::OutOfRangeReplica);
        }
        Ok(CausalLwwRegister::new(replica_id))
    }

    /// The replica id this register originates writes for.
    pub fn replica_id(&self) -> ReplicaId {
        self.kernel.replica_id()
    }

    /// True if the register has never been written (or has been
    /// cleared and never written since).
    pub fn is_empty(&self) -> bool {
        self.kernel.is_empty()
    }

    /// The current value, if the register has been written.
    ///
    /// Note: a quiescent register always holds at most one value, but
    /// immediately after merging two concurrent writes from different
    /// replicas, more than one dot may transiently be live until
    /// `converge`'s invariant-restoring pass runs (it runs on every
    /// `converge` call, so this is only ever observable mid-merge, not
    /// from the outside).
    pub fn get(&self) -> Option<&T> {
        self.kernel.values().next()
    }
}

impl<T: Clone> CausalLwwRegister<T> {
    /// Writes `value`, returning a delta reflecting the write.
    ///
    /// A no-op on a read-only replica.
    pub fn set(&mut self, value: T) -> CausalLwwRegister<T> {
        CausalLwwRegister { kernel: self.kernel.set(value) }
    }

    /// Clears the register, returning a delta carrying the removed
    /// dot (the `Causal::clear` operation).
    pub fn clear(&mut self) -> CausalLwwRegister<T> {
        CausalLwwRegister { kernel: self.kernel.remove_all() }
    }

    /// Merges `other` (a full state or a delta) into this register.
    pub fn converge(&mut self, other: &CausalLwwRegister<T>) -> bool {
        self.kernel.converge(&other.kernel)
    }
}

impl<T: PartialEq> PartialEq for CausalLwwRegister<T> {
    fn eq(&self, other: &CausalLwwRegister<T>) -> bool {
        self.kernel == other.kernel
    }
}

impl<T: Eq> Eq for CausalLwwRegister<T> {}

impl<T: Clone> ToTokens<KernelScalar<T>> for CausalLwwRegister<T> {
    fn to_tokens(&self, tokens: &mut Vec<Token<KernelScalar<T>>>) {
        tokens.push(Token::Count(1));
        for t in self.kernel.tokens() {
            tokens.push(t);
        }
    }
}

impl<T> FromTokens<KernelScalar<T>> for CausalLwwRegister<T> {
    fn from_tokens(iter: &mut dyn Iterator<Item = Token<KernelScalar<T>>>) -> Result<Self, CrdtError> {
        expect_count(iter, 1)?;
        Ok(CausalLwwRegister { kernel: DotKernelSingle::from_tokens(iter)? })
    }
}

impl<T: Clone> crate::Create for CausalLwwRegister<T> {
    fn create(replica_id: ReplicaId) -> CausalLwwRegister<T> {
        CausalLwwRegister::new(replica_id)
    }
}

impl<T: Clone> crate::Convergent for CausalLwwRegister<T> {
    fn converge(&mut self, other: &CausalLwwRegister<T>) -> bool {
        CausalLwwRegister::converge(self, other)
    }
}

impl<T: Clone> crate::Causal for CausalLwwRegister<T> {
    fn is_empty(&self) -> bool {
        CausalLwwRegister::is_empty(self)
    }
    fn clear(&mut self) -> CausalLwwRegister<T> {
        CausalLwwRegister::clear(self)
    }
}

#[cfg(any(feature = "quickcheck_generators", test))]
impl<T: Arbitrary + Clone> Arbitrary for CausalLwwRegister<T> {
    fn arbitrary(g: &mut Gen) -> CausalLwwRegister<T> {
        CausalLwwRegister { kernel: DotKernelSingle::arbitrary(g) }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn s5_higher_seq_wins_after_merge() {
        let a_id = ReplicaId::from(1);
        let b_id = ReplicaId::from(2);

        let mut a = CausalLwwRegister::new(a_id);
        a.set("v1");
        let mut b = CausalLwwRegister::new(b_id);
        b.converge(&a);
        assert_eq!(Some(&"v1"), b.get());

        a.set("v2");
        b.converge(&a);
        assert_eq!(Some(&"v2"), b.get());
    }

    #[test]
    fn clear_empties_the_register() {
        let mut reg = CausalLwwRegister::new(ReplicaId::from(1));
        reg.set("v1");
        reg.clear();
        assert!(reg.is_empty());
        assert_eq!(None, reg.get());
    }

    #[test]
    fn round_trip_preserves_value() {
        let mut reg = CausalLwwRegister::new(ReplicaId::from(1));
        reg.set("v1");

        let tokens = reg.tokens();
        let restored = CausalLwwRegister::from_tokens(&mut tokens.into_iter()).unwrap();
        assert_eq!(reg, restored);
    }

    #[test]
    fn try_new_rejects_read_only_replica() {
        assert!(CausalLwwRegister::<&str>::try_new(ReplicaId::READ_ONLY).is_err());
        assert!(CausalLwwRegister::<&str>::try_new(ReplicaId::from(1)).is_ok());
    }
}
