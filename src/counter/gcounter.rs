use std::collections::HashMap;

#[cfg(any(feature = "quickcheck_generators", test))]
use quickcheck::{Arbitrary, Gen};

use serde::{Deserialize, Serialize};

use crate::counter::Count;
use crate::error::CrdtError;
use crate::replica::ReplicaId;
use crate::token::{expect_count, expect_pair_count, next_scalar, CounterScalar, FromTokens, ToTokens, Token};

/// A grow-only vector counter.
///
/// Value is the sum of every replica's entry. `converge` is a
/// per-replica max-merge, so the value is monotonically
/// non-decreasing across merges regardless of delivery order.
///
/// ##### Example
///
/// ```
/// use crdt::{GCounter, ReplicaId};
///
/// let mut local = GCounter::<u64>::new(ReplicaId::from(1));
/// let mut remote = GCounter::<u64>::new(ReplicaId::from(2));
///
/// local.increment(12);
/// remote.increment(13);
///
/// local.converge(&remote);
/// assert_eq!(25, local.value());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GCounter<N: Count> {
    replica_id: ReplicaId,
    counts: HashMap<ReplicaId, N>,
}

impl<N: Count> GCounter<N> {
    /// Creates a new grow-only counter with the provided replica id
    /// and an initial value of zero.
    pub fn new(replica_id: ReplicaId) -> GCounter<N> {
        GCounter { replica_id, counts: HashMap::new() }
    }

    /// Like [`GCounter::new`], but rejects the read-only replica id
    /// instead of silently constructing a counter whose increments
    /// will all be no-ops.
    pub fn try_new(replica_id: ReplicaId) -> Result<GCounter<N>, CrdtError> {
        if replica_id.is_read_only() {
            return Err(CrdtError::OutOfRangeReplica);
        }
        Ok(GCounter::new(replica_id))
    }

    /// The replica id this counter originates increments for.
    pub fn replica_id(&self) -> ReplicaId {
        self.replica_id
    }

    /// The current value: the sum of every replica's entry.
    pub fn value(&self) -> N {
        self.counts.values().fold(N::zero(), |acc, &n| acc + n)
    }

    /// True if no replica has incremented this counter.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Increments the counter by `amount`, returning a delta carrying
    /// only this replica's new entry.
    ///
    /// A no-op on a read-only replica: returns an empty delta.
    ///
    /// ##### Overflow
    ///
    /// Incrementing past `N::MAX` is undefined behavior: the
    /// increment limit is shared across all replicas and is not
    /// checked locally, matching `N`'s ordinary arithmetic.
    pub fn increment(&mut self, amount: N) -> GCounter<N> {
        if self.replica_id.is_read_only() {
            return GCounter::new(self.replica_id);
        }
        let entry = self.counts.entry(self.replica_id).or_insert_with(N::zero);
        *entry = *entry + amount;

        let mut delta = GCounter::new(self.replica_id);
        delta.counts.insert(self.replica_id, *entry);
        delta
    }

    /// Merges `other` into this counter: every replica entry is set to
    /// the max of the two sides. Returns true iff any entry grew.
    pub fn converge(&mut self, other: &GCounter<N>) -> bool {
        let mut changed = false;
        for (&id, &other_count) in other.counts.iter() {
            let entry = self.counts.entry(id).or_insert_with(N::zero);
            if other_count > *entry {
                *entry = other_count;
                changed = true;
            }
        }
        changed
    }

    /// Clears every entry, returning the cleared state as a delta.
    ///
    /// Note this breaks the grow-only monotonicity a `GCounter` is
    /// normally expected to uphold across replicas that have already
    /// observed the higher value; it exists for symmetry with the
    /// `Causal` contract's `clear`, and callers should understand it
    /// as a local reset rather than a replicated operation.
    pub fn clear(&mut self) -> GCounter<N> {
        let delta = self.clone();
        self.counts.clear();
        delta
    }
}

/// Value equality: two counters are equal iff their computed values
/// are equal, not iff their underlying per-replica maps match
/// structurally. Structural comparison for convergence purposes is
/// `converge`'s job, not `eq`'s.
impl<N: Count> PartialEq for GCounter<N> {
    fn eq(&self, other: &GCounter<N>) -> bool {
        self.value() == other.value()
    }
}

impl<N: Count> Eq for GCounter<N> {}

impl<N: Count> ToTokens<CounterScalar<N>> for GCounter<N> {
    fn to_tokens(&self, tokens: &mut Vec<Token<CounterScalar<N>>>) {
        tokens.push(Token::Count(2));
        tokens.push(Token::Scalar(CounterScalar::Replica(self.replica_id)));

        tokens.push(Token::Count(2 * self.counts.len() as u64));
        for (&id, &count) in self.counts.iter() {
            tokens.push(Token::Scalar(CounterScalar::Replica(id)));
            tokens.push(Token::Scalar(CounterScalar::Value(count)));
        }
    }
}

impl<N: Count> FromTokens<CounterScalar<N>> for GCounter<N> {
    fn from_tokens(iter: &mut dyn Iterator<Item = Token<CounterScalar<N>>>) -> Result<Self, CrdtError> {
        expect_count(iter, 2)?;
        let replica_id = expect_replica(iter)?;

        let pairs = expect_pair_count(iter)?;
        let mut counts = HashMap::with_capacity(pairs as usize);
        for _ in 0..pairs {
            let id = expect_replica(iter)?;
            let count = expect_value(iter)?;
            counts.insert(id, count);
        }

        Ok(GCounter { replica_id, counts })
    }
}

fn expect_replica<N>(iter: &mut dyn Iterator<Item = Token<CounterScalar<N>>>) -> Result<ReplicaId, CrdtError> {
    match next_scalar(iter)? {
        CounterScalar::Replica(r) => Ok(r),
        CounterScalar::Value(_) => Err(CrdtError::MalformedTokens("expected a replica id scalar".into())),
    }
}

fn expect_value<N>(iter: &mut dyn Iterator<Item = Token<CounterScalar<N>>>) -> Result<N, CrdtError> {
    match next_scalar(iter)? {
        CounterScalar::Value(n) => Ok(n),
        CounterScalar::Replica(_) => Err(CrdtError::MalformedTokens("expected a counter value scalar".into())),
    }
}

impl<N: Count> crate::Create for GCounter<N> {
    fn create(replica_id: ReplicaId) -> GCounter<N> {
        GCounter::new(replica_id)
    }
}

impl<N: Count> crate::Convergent for GCounter<N> {
    fn converge(&mut self, other: &GCounter<N>) -> bool {
        GCounter::converge(self, other)
    }
}

impl<N: Count> crate::Causal for GCounter<N> {
    fn is_empty(&self) -> bool {
        GCounter::is_empty(self)
    }
    fn clear(&mut self) -> GCounter<N> {
        GCounter::clear(self)
    }
}

#[cfg(any(feature = "quickcheck_generators", test))]
impl<N: Count + Arbitrary> Arbitrary for GCounter<N> {
    fn arbitrary(g: &mut Gen) -> GCounter<N> {
        GCounter { replica_id: ReplicaId::arbitrary(g), counts: Arbitrary::arbitrary(g) }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ids() -> (ReplicaId, ReplicaId, ReplicaId) {
        (ReplicaId::from(1), ReplicaId::from(2), ReplicaId::from(3))
    }

    #[test]
    fn local_increments_sum() {
        let mut counter = GCounter::<u64>::new(ReplicaId::from(1));
        counter.increment(5);
        counter.increment(8);
        assert_eq!(13, counter.value());
    }

    #[test]
    fn s1_three_replicas_converge_pairwise() {
        let (a_id, b_id, c_id) = ids();
        let mut a = GCounter::<u64>::new(a_id);
        let mut b = GCounter::<u64>::new(b_id);
        let mut c = GCounter::<u64>::new(c_id);

        a.increment(1);
        b.increment(2);
        c.increment(3);

        a.converge(&b);
        a.converge(&c);
        b.converge(&a);
        b.converge(&c);
        c.converge(&a);
        c.converge(&b);

        assert_eq!(6, a.value());
        assert_eq!(6, b.value());
        assert_eq!(6, c.value());

        a.increment(9);
        b.increment(8);
        c.increment(7);

        a.converge(&b);
        a.converge(&c);
        b.converge(&a);
        b.converge(&c);
        c.converge(&a);
        c.converge(&b);

        assert_eq!(30, a.value());
        assert_eq!(30, b.value());
        assert_eq!(30, c.value());
    }

    #[test]
    fn converge_is_idempotent() {
        let mut a = GCounter::<u64>::new(ReplicaId::from(1));
        a.increment(4);
        let b = a.clone();
        assert!(!a.converge(&b));
    }

    #[test]
    fn read_only_replica_increments_are_no_ops() {
        let mut counter = GCounter::<u64>::new(ReplicaId::READ_ONLY);
        let delta = counter.increment(10);
        assert_eq!(0, counter.value());
        assert!(delta.is_empty());
    }

    #[test]
    fn try_new_rejects_read_only_replica() {
        assert!(GCounter::<u64>::try_new(ReplicaId::READ_ONLY).is_err());
        assert!(GCounter::<u64>::try_new(ReplicaId::from(1)).is_ok());
    }

    #[test]
    fn round_trip_preserves_value() {
        let mut a = GCounter::<u64>::new(ReplicaId::from(1));
        a.increment(7);

        let tokens = a.tokens();
        let restored = GCounter::<u64>::from_tokens(&mut tokens.into_iter()).unwrap();
        assert_eq!(a.value(), restored.value());
        assert!(!a.clone().converge(&restored));
    }

    #[test]
    fn serde_json_round_trip_preserves_value() {
        let mut a = GCounter::<u64>::new(ReplicaId::from(1));
        a.increment(3);
        a.increment(4);

        let json = serde_json::to_string(&a).unwrap();
        let restored: GCounter<u64> = serde_json::from_str(&json).unwrap();
        assert_eq!(a.value(), restored.value());
    }
}
