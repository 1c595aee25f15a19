#[cfg(any(feature = "quickcheck_generators", test))]
use quickcheck::{Arbitrary, Gen};

use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};

use crate::counter::{Count, GCounter};
use crate::error::CrdtError;
use crate::replica::ReplicaId;
use crate::token::{expect_count, next_scalar, CounterScalar, FromTokens, ToTokens, Token};

/// An incrementable and decrementable vector counter: a pair of
/// [`GCounter`]s keyed by the same replica id, one counting increments
/// and one counting decrements.
///
/// Value = `Σpos − Σneg`, computed in `i128` so the subtraction itself
/// cannot overflow even when `N` is at its own maximum on both sides.
///
/// ##### Example
///
/// ```
/// use crdt::{PnCounter, ReplicaId};
///
/// let mut local = PnCounter::<u64>::new(ReplicaId::from(1));
/// let mut remote = PnCounter::<u64>::new(ReplicaId::from(2));
///
/// local.decrement(12);
/// remote.increment(13);
///
/// local.converge(&remote);
/// assert_eq!(1, local.value());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnCounter<N: Count> {
    replica_id: ReplicaId,
    pos: GCounter<N>,
    neg: GCounter<N>,
}

impl<N: Count> PnCounter<N> {
    /// Creates a new counter with the provided replica id and an
    /// initial value of zero.
    pub fn new(replica_id: ReplicaId) -> PnCounter<N> {
        PnCounter { replica_id, pos: GCounter::new(replica_id), neg: GCounter::new(replica_id) }
    }

    /// Like [`PnCounter::new`], but rejects the read-only replica id
    /// instead of silently constructing a counter whose increments and
    /// decrements will all be no-ops.
    pub fn try_new(replica_id: ReplicaId) -> Result<PnCounter<N>, CrdtError> {
        if replica_id.is_read_only() {
            return Err(CrdtError::OutOfRangeReplica);
        }
        Ok(PnCounter::new(replica_id))
    }

    /// The replica id this counter originates operations for.
    pub fn replica_id(&self) -> ReplicaId {
        self.replica_id
    }

    /// The current value, `Σpos − Σneg`, widened to `i128`.
    pub fn value(&self) -> i128 {
        self.pos.value().as_() - self.neg.value().as_()
    }

    /// True if neither side has ever recorded an operation.
    pub fn is_empty(&self) -> bool {
        self.pos.is_empty() && self.neg.is_empty()
    }

    /// Increments the counter by `amount`, returning a delta of the
    /// same type carrying only the positive side's change.
    ///
    /// A no-op on a read-only replica.
    pub fn increment(&mut self, amount: N) -> PnCounter<N> {
        let pos_delta = self.pos.increment(amount);
        PnCounter { replica_id: self.replica_id, pos: pos_delta, neg: GCounter::new(self.replica_id) }
    }

    /// Decrements the counter by `amount`, returning a delta of the
    /// same type carrying only the negative side's change.
    ///
    /// A no-op on a read-only replica.
    pub fn decrement(&mut self, amount: N) -> PnCounter<N> {
        let neg_delta = self.neg.increment(amount);
        PnCounter { replica_id: self.replica_id, pos: GCounter::new(self.replica_id), neg: neg_delta }
    }

    /// Merges `other` into this counter: each side converges
    /// independently. Returns true iff either side changed.
    pub fn converge(&mut self, other: &PnCounter<N>) -> bool {
        let pos_changed = self.pos.converge(&other.pos);
        let neg_changed = self.neg.converge(&other.neg);
        pos_changed || neg_changed
    }

    /// Clears both sides, returning the cleared state as a delta. See
    /// [`GCounter::clear`]'s note: this is a local reset, not a
    /// replicated CRDT operation.
    pub fn clear(&mut self) -> PnCounter<N> {
        let delta = self.clone();
        self.pos.clear();
        self.neg.clear();
        delta
    }
}

impl<N: Count> PartialEq for PnCounter<N> {
    fn eq(&self, other: &PnCounter<N>) -> bool {
        self.value() == other.value()
    }
}

impl<N: Count> Eq for PnCounter<N> {}

impl<N: Count> ToTokens<CounterScalar<N>> for PnCounter<N> {
    fn to_tokens(&self, tokens: &mut Vec<Token<CounterScalar<N>>>) {
        tokens.push(Token::Count(3));
        tokens.push(Token::Scalar(CounterScalar::Replica(self.replica_id)));
        for t in self.pos.tokens() {
            tokens.push(t);
        }
        for t in self.neg.tokens() {
            tokens.push(t);
        }
    }
}

impl<N: Count> FromTokens<CounterScalar<N>> for PnCounter<N> {
    fn from_tokens(iter: &mut dyn Iterator<Item = Token<CounterScalar<N>>>) -> Result<Self, CrdtError> {
        expect_count(iter, 3)?;
        let replica_id = match next_scalar(iter)? {
            CounterScalar::Replica(r) => r,
            CounterScalar::Value(_) => {
                return Err(CrdtError::MalformedTokens("expected a replica id scalar".into()))
            }
        };

        // pos and neg are each a full embedded GCounter stream (they
        // read their own leading `Count(2)`), driven directly here.
        let pos = GCounter::from_tokens(iter)?;
        let neg = GCounter::from_tokens(iter)?;

        Ok(PnCounter { replica_id, pos, neg })
    }
}

impl<N: Count> crate::Create for PnCounter<N> {
    fn create(replica_id: ReplicaId) -> PnCounter<N> {
        PnCounter::new(replica_id)
    }
}

impl<N: Count> crate::Convergent for PnCounter<N> {
    fn converge(&mut self, other: &PnCounter<N>) -> bool {
        PnCounter::converge(self, other)
    }
}

impl<N: Count> crate::Causal for PnCounter<N> {
    fn is_empty(&self) -> bool {
        PnCounter::is_empty(self)
    }
    fn clear(&mut self) -> PnCounter<N> {
        PnCounter::clear(self)
    }
}

#[cfg(any(feature = "quickcheck_generators", test))]
impl<N: Count + Arbitrary> Arbitrary for PnCounter<N> {
    fn arbitrary(g: &mut Gen) -> PnCounter<N> {
        let replica_id = ReplicaId::arbitrary(g);
        let mut counter = PnCounter::new(replica_id);
        counter.pos = GCounter::arbitrary(g);
        counter.neg = GCounter::arbitrary(g);
        counter
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn s2_mixed_increments_and_decrements_converge() {
        let a_id = ReplicaId::from(1);
        let b_id = ReplicaId::from(2);
        let c_id = ReplicaId::from(3);

        let mut a = PnCounter::<u64>::new(a_id);
        let mut b = PnCounter::<u64>::new(b_id);
        let mut c = PnCounter::<u64>::new(c_id);

        a.increment(5);
        b.decrement(2);
        c.increment(7);

        a.converge(&b);
        a.converge(&c);
        b.converge(&a);
        c.converge(&a);

        assert_eq!(10, a.value());
        assert_eq!(10, b.value());
        assert_eq!(10, c.value());
    }

    #[test]
    fn decrement_then_increment_nets_out() {
        let mut counter = PnCounter::<u64>::new(ReplicaId::from(1));
        counter.decrement(13);
        assert_eq!(-13, counter.value());
        counter.increment(13);
        assert_eq!(0, counter.value());
    }

    #[test]
    fn converge_is_idempotent() {
        let mut a = PnCounter::<u64>::new(ReplicaId::from(1));
        a.increment(4);
        a.decrement(1);
        let b = a.clone();
        assert!(!a.converge(&b));
    }

    #[test]
    fn round_trip_preserves_value() {
        let mut a = PnCounter::<u64>::new(ReplicaId::from(1));
        a.increment(9);
        a.decrement(2);

        let tokens = a.tokens();
        let restored = PnCounter::<u64>::from_tokens(&mut tokens.into_iter()).unwrap();
        assert_eq!(a.value(), restored.value());
    }

    #[test]
    fn serde_json_round_trip_preserves_value() {
        let mut a = PnCounter::<u64>::new(ReplicaId::from(1));
        a.increment(9);
        a.decrement(2);

        let json = serde_json::to_string(&a).unwrap();
        let restored: PnCounter<u64> = serde_json::from_str(&json).unwrap();
        assert_eq!(a.value(), restored.value());
    }

    #[test]
    fn try_new_rejects_read_only_replica() {
        assert!(PnCounter::<u64>::try_new(ReplicaId::READ_ONLY).is_err());
        assert!(PnCounter::<u64>::try_new(ReplicaId::from(1)).is_ok());
    }
}
