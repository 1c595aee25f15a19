#[cfg(any(feature = "quickcheck_generators", test))]
use quickcheck::{Arbitrary, Gen};

use serde::{Deserialize, Serialize};

use crate::error::CrdtError;
use crate::kernel::{DotKernel, KernelScalar};
use crate::replica::ReplicaId;
use crate::token::{expect_count, FromTokens, ToTokens, Token};

/// A multi-value register: `set` removes every dot
/// this replica has observed so far and records one fresh dot for the
/// new value. Two replicas writing concurrently, each unaware of the
/// other's write, each only remove what they've locally observed — so
/// after the two deltas merge, both values survive side by side, to be
/// resolved by the application. This is the "add-wins register" that
/// falls directly out of [`DotKernel`]'s observed-remove converge rule
/// — no new merge algorithm is introduced.
///
/// ##### Example
///
/// ```
/// use crdt::{MVRegister, ReplicaId};
///
/// let a = ReplicaId::from(1);
/// let b = ReplicaId::from(2);
///
/// let mut reg_a = MVRegister::new(a);
/// let mut reg_b = MVRegister::new(b);
///
/// reg_a.set("x");
/// reg_b.converge(&reg_a);
///
/// // concurrent writes from both replicas survive as multiple values
/// reg_a.set("y");
/// reg_b.set("z");
/// reg_a.converge(&reg_b);
/// reg_b.converge(&reg_a);
///
/// let mut values: Vec<_> = reg_a.values().collect();
/// values.sort();
/// assert_eq!(vec![&"y", &"z"], values);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MVRegister<T> {
    kernel: DotKernel<T>,
}

impl<T> MVRegister<T> {
    /// Creates a new, empty register for replica `replica_id`.
    pub fn new(replica_id: ReplicaId) -> MVRegister<T> {
        MVRegister { kernel: DotKernel::new(replica_id) }
    }

    /// Like [`MVRegister::new`], but rejects the read-only replica id
    /// instead of silently constructing a register whose writes will
    /// all be no-ops.
    pub fn try_new(replica_id: ReplicaId) -> Result<MVRegister<T>, CrdtError> {
        if replica_id.is_read_only() {
            return Err(CrdtError::OutOfRangeReplica);
        }
        Ok(MVRegister::new(replica_id))
    }

    /// The replica id this register originates writes for.
    pub fn replica_id(&self) -> ReplicaId {
        self.kernel.replica_id()
    }

    /// True if the register holds no value.
    pub fn is_empty(&self) -> bool {
        self.kernel.is_empty()
    }

    /// An iterator over every value currently held: a single value
    /// after a quiescent period, or several after concurrent writes.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.kernel.values()
    }
}

impl<T: Clone> MVRegister<T> {
    /// Replaces every value this kernel currently holds with `value`,
    /// returning a delta that causally supersedes this replica's prior
    /// writes and carries the new one.
    pub fn set(&mut self, value: T) -> MVRegister<T> {
        let removal = self.kernel.remove_all();
        let insertion = self.kernel.set(value);

        let mut delta = DotKernel::new(self.kernel.replica_id());
        delta.converge(&removal);
        delta.converge(&insertion);
        MVRegister { kernel: delta }
    }

    /// Clears the register, returning a delta carrying the removed
    /// dots (the `Causal::clear` operation).
    pub fn clear(&mut self) -> MVRegister<T> {
        MVRegister { kernel: self.kernel.remove_all() }
    }

    /// Merges `other` (a full state or a delta) into this register.
    pub fn converge(&mut self, other: &MVRegister<T>) -> bool {
        self.kernel.converge(&other.kernel)
    }
}

impl<T: PartialEq> PartialEq for MVRegister<T> {
    fn eq(&self, other: &MVRegister<T>) -> bool {
        self.kernel == other.kernel
    }
}

impl<T: Eq> Eq for MVRegister<T> {}

impl<T: Clone> ToTokens<KernelScalar<T>> for MVRegister<T> {
    fn to_tokens(&self, tokens: &mut Vec<Token<KernelScalar<T>>>) {
        tokens.push(Token::Count(1));
        for t in self.kernel.tokens() {
            tokens.push(t);
        }
    }
}

impl<T> FromTokens<KernelScalar<T>> for MVRegister<T> {
    fn from_tokens(iter: &mut dyn Iterator<Item = Token<KernelScalar<T>>>) -> Result<Self, CrdtError> {
        expect_count(iter, 1)?;
        Ok(MVRegister { kernel: DotKernel::from_tokens(iter)? })
    }
}

impl<T: Clone> crate::Create for MVRegister<T> {
    fn create(replica_id: ReplicaId) -> MVRegister<T> {
        MVRegister::new(replica_id)
    }
}

impl<T: Clone> crate::Convergent for MVRegister<T> {
    fn converge(&mut self, other: &MVRegister<T>) -> bool {
        MVRegister::converge(self, other)
    }
}

impl<T: Clone> crate::Causal for MVRegister<T> {
    fn is_empty(&self) -> bool {
        MVRegister::is_empty(self)
    }
    fn clear(&mut self) -> MVRegister<T> {
        MVRegister::clear(self)
    }
}

#[cfg(any(feature = "quickcheck_generators", test))]
impl<T: Arbitrary + Clone> Arbitrary for MVRegister<T> {
    fn arbitrary(g: &mut Gen) -> MVRegister<T> {
        MVRegister { kernel: DotKernel::arbitrary(g) }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single_writer_quiesces_to_one_value() {
        let mut reg = MVRegister::new(ReplicaId::from(1));
        reg.set("a");
        reg.set("b");
        assert_eq!(vec![&"b"], reg.values().collect::<Vec<_>>());
    }

    #[test]
    fn concurrent_writers_survive_as_multiple_values() {
        let a_id = ReplicaId::from(1);
        let b_id = ReplicaId::from(2);

        let mut a = MVRegister::new(a_id);
        let mut b = MVRegister::new(b_id);

        a.set("x");
        b.converge(&a);

        a.set("y");
        b.set("z");

        a.converge(&b);
        b.converge(&a);

        let mut a_values: Vec<_> = a.values().collect();
        a_values.sort();
        let mut b_values: Vec<_> = b.values().collect();
        b_values.sort();

        assert_eq!(vec![&"y", &"z"], a_values);
        assert_eq!(a_values, b_values);
    }

    #[test]
    fn round_trip_preserves_values() {
        let mut reg = MVRegister::new(ReplicaId::from(1));
        reg.set("a");

        let tokens = reg.tokens();
        let restored = MVRegister::from_tokens(&mut tokens.into_iter()).unwrap();
        assert_eq!(reg, restored);
    }

    #[test]
    fn try_new_rejects_read_only_replica() {
        assert!(MVRegister::<&str>::try_new(ReplicaId::READ_ONLY).is_err());
        assert!(MVRegister::<&str>::try_new(ReplicaId::from(1)).is_ok());
    }
}
