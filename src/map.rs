//! A map of keys to nested causal CRDTs.
//!
//! [`ORMap`] is a thin wrapper over [`DotKernel`] keyed by `(K, V)`
//! pairs, exactly like [`crate::ORSet`] is over `T` — but where two
//! live entries share a key (because two replicas wrote to it
//! concurrently, or a dot hasn't yet been reconciled by a local
//! `update`), the map exposes the *merge* of their values rather than
//! picking one arbitrarily. This only works because `V` is itself a
//! [`Causal`] CRDT: folding two sibling values together with
//! `V::converge` is exactly as well-defined as folding two replicas of
//! `V` together over a network.

#[cfg(any(feature = "quickcheck_generators", test))]
use quickcheck::{Arbitrary, Gen};

use serde::{Deserialize, Serialize};

use crate::error::CrdtError;
use crate::kernel::{DotKernel, KernelScalar};
use crate::replica::ReplicaId;
use crate::token::{expect_count, FromTokens, ToTokens, Token};
use crate::{Causal, Convergent, Create};

/// A map from keys to nested CRDT values, built on [`DotKernel`].
///
/// ##### Example
///
/// ```
/// use crdt::{Causal, Create, GCounter, ORMap, ReplicaId};
///
/// let a = ReplicaId::from(1);
/// let b = ReplicaId::from(2);
///
/// let mut map_a: ORMap<&str, GCounter<u64>> = ORMap::new(a);
/// let mut map_b: ORMap<&str, GCounter<u64>> = ORMap::new(b);
///
/// map_a.update("views", |mut counter| { counter.increment(1); counter });
/// map_b.converge(&map_a);
/// map_b.update("views", |mut counter| { counter.increment(1); counter });
/// map_a.converge(&map_b);
///
/// assert_eq!(2, map_a.get(&"views").unwrap().value());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ORMap<K, V> {
    kernel: DotKernel<(K, V)>,
}

impl<K, V> ORMap<K, V> {
    /// Creates a new, empty map for replica `replica_id`.
    pub fn new(replica_id: ReplicaId) -> ORMap<K, V> {
        ORMap { kernel: DotKernel::new(replica_id) }
    }

    /// Like [`ORMap::new`], but rejects the read-only replica id
    /// instead of silently constructing a map whose mutators will all
    /// be no-ops.
    pub fn try_new(replica_id: ReplicaId) -> Result<ORMap<K, V>, CrdtError> {
        if replica_id.is_read_only() {
            return Err(CrdtError::OutOfRangeReplica);
        }
        Ok(ORMap::new(replica_id))
    }

    /// The replica id this map originates writes for.
    pub fn replica_id(&self) -> ReplicaId {
        self.kernel.replica_id()
    }

    /// True if the map holds no keys.
    pub fn is_empty(&self) -> bool {
        self.kernel.is_empty()
    }
}

impl<K: Eq + Clone, V: Causal + Create + Clone> ORMap<K, V> {
    /// The current value for `key`, or `None` if the key isn't
    /// present. If more than one dot currently carries `key` (a
    /// concurrent write from another replica not yet reconciled by a
    /// local `update`), the returned value is their `Causal::converge`
    /// — siblings are merged on read rather than on write.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut values = self.kernel.values().filter(|(k, _)| k == key).map(|(_, v)| v.clone());
        let mut merged = values.next()?;
        for sibling in values {
            merged.converge(&sibling);
        }
        Some(merged)
    }

    /// True if `key` is currently present (possibly as multiple
    /// unreconciled sibling entries; see [`ORMap::get`]).
    pub fn contains_key(&self, key: &K) -> bool {
        self.kernel.values().any(|(k, _)| k == key)
    }

    /// The distinct keys currently present, each listed once.
    pub fn keys(&self) -> Vec<K> {
        let mut keys: Vec<K> = Vec::new();
        for (k, _) in self.kernel.values() {
            if !keys.contains(k) {
                keys.push(k.clone());
            }
        }
        keys
    }

    /// Applies `f` to the current (merged) value for `key` — or a
    /// fresh, empty `V` if absent — and records the result under a new
    /// dot, dropping this replica's prior entries for `key` (causally,
    /// the way [`DotKernel::remove_value`] drops them: they stay in the
    /// context so a stale concurrent re-add can't resurrect them).
    /// Returns a delta reflecting both the drop and the new entry.
    ///
    /// The value handed to `f` is always freshly created under *this*
    /// replica's id (absorbing whatever merged state [`ORMap::get`]
    /// found via `V::converge`), never the id embedded in a value some
    /// other replica originated. Skipping this rebind would make `f`
    /// mutate state still tagged with another replica's id — for a
    /// nested `GCounter`, that means the local write lands in the
    /// wrong replica's slot, and the next max-merge silently discards
    /// whichever side wrote less, rather than summing both.
    ///
    /// A no-op on a read-only replica.
    pub fn update<F>(&mut self, key: K, f: F) -> ORMap<K, V>
    where
        F: FnOnce(V) -> V,
    {
        if self.kernel.replica_id().is_read_only() {
            return ORMap { kernel: DotKernel::new(self.kernel.replica_id()) };
        }

        let mut current = V::create(self.kernel.replica_id());
        if let Some(existing) = self.get(&key) {
            current.converge(&existing);
        }
        let updated = f(current);

        let probe = (key.clone(), V::create(self.kernel.replica_id()));
        let removal = self.kernel.remove_value(&probe, |p, existing| p.0 == existing.0);
        let insertion = self.kernel.set((key, updated));

        let mut delta = DotKernel::new(self.kernel.replica_id());
        delta.converge(&removal);
        delta.converge(&insertion);
        ORMap { kernel: delta }
    }

    /// Removes every entry for `key` (all siblings, including ones
    /// written by other replicas this replica has observed). Returns a
    /// delta carrying the removed dots.
    pub fn remove(&mut self, key: &K) -> ORMap<K, V> {
        let probe = (key.clone(), V::create(self.kernel.replica_id()));
        ORMap { kernel: self.kernel.remove_value(&probe, |p, existing| p.0 == existing.0) }
    }

    /// Removes every key, returning a delta carrying every removed dot
    /// (the `Causal::clear` operation).
    pub fn clear(&mut self) -> ORMap<K, V> {
        ORMap { kernel: self.kernel.remove_all() }
    }

    /// Merges `other` (a full state or a delta) into this map. Entries
    /// are merged at the dot-kernel level; sibling entries sharing a
    /// key are reconciled lazily by [`ORMap::get`], not eagerly during
    /// converge.
    pub fn converge(&mut self, other: &ORMap<K, V>) -> bool {
        self.kernel.converge(&other.kernel)
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for ORMap<K, V> {
    fn eq(&self, other: &ORMap<K, V>) -> bool {
        self.kernel == other.kernel
    }
}

impl<K: Eq, V: Eq> Eq for ORMap<K, V> {}

impl<K: Clone, V: Clone> ToTokens<KernelScalar<(K, V)>> for ORMap<K, V> {
    fn to_tokens(&self, tokens: &mut Vec<Token<KernelScalar<(K, V)>>>) {
        tokens.push(Token::Count(1));
        for t in self.kernel.tokens() {
            tokens.push(t);
        }
    }
}

impl<K, V> FromTokens<KernelScalar<(K, V)>> for ORMap<K, V> {
    fn from_tokens(iter: &mut dyn Iterator<Item = Token<KernelScalar<(K, V)>>>) -> Result<Self, CrdtError> {
        expect_count(iter, 1)?;
        Ok(ORMap { kernel: DotKernel::from_tokens(iter)? })
    }
}

impl<K: Eq + Clone, V: Causal + Create + Clone> crate::Create for ORMap<K, V> {
    fn create(replica_id: ReplicaId) -> ORMap<K, V> {
        ORMap::new(replica_id)
    }
}

impl<K: Eq + Clone, V: Causal + Create + Clone> crate::Convergent for ORMap<K, V> {
    fn converge(&mut self, other: &ORMap<K, V>) -> bool {
        ORMap::converge(self, other)
    }
}

impl<K: Eq + Clone, V: Causal + Create + Clone> crate::Causal for ORMap<K, V> {
    fn is_empty(&self) -> bool {
        ORMap::is_empty(self)
    }
    fn clear(&mut self) -> ORMap<K, V> {
        ORMap::clear(self)
    }
}

#[cfg(any(feature = "quickcheck_generators", test))]
impl<K: Arbitrary + Clone, V: Arbitrary + Clone> Arbitrary for ORMap<K, V> {
    fn arbitrary(g: &mut Gen) -> ORMap<K, V> {
        ORMap { kernel: DotKernel::arbitrary(g) }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::counter::GCounter;

    #[test]
    fn update_defaults_missing_key_to_empty_nested_crdt() {
        let mut map: ORMap<&str, GCounter<u64>> = ORMap::new(ReplicaId::from(1));
        map.update("views", |mut c| {
            c.increment(5);
            c
        });
        assert_eq!(5, map.get(&"views").unwrap().value());
    }

    #[test]
    fn concurrent_updates_to_same_key_merge_nested_crdts() {
        let a_id = ReplicaId::from(1);
        let b_id = ReplicaId::from(2);

        let mut a: ORMap<&str, GCounter<u64>> = ORMap::new(a_id);
        let mut b: ORMap<&str, GCounter<u64>> = ORMap::new(b_id);

        a.update("views", |mut c| {
            c.increment(1);
            c
        });
        b.converge(&a);

        a.update("views", |mut c| {
            c.increment(2);
            c
        });
        b.update("views", |mut c| {
            c.increment(3);
            c
        });

        a.converge(&b);
        b.converge(&a);

        assert_eq!(6, a.get(&"views").unwrap().value());
        assert_eq!(6, b.get(&"views").unwrap().value());
    }

    #[test]
    fn remove_drops_all_siblings_for_a_key() {
        let a_id = ReplicaId::from(1);
        let b_id = ReplicaId::from(2);

        let mut a: ORMap<&str, GCounter<u64>> = ORMap::new(a_id);
        a.update("views", |mut c| {
            c.increment(1);
            c
        });

        let mut b: ORMap<&str, GCounter<u64>> = ORMap::new(b_id);
        b.converge(&a);
        b.remove(&"views");

        let mut a2 = a.clone();
        a2.converge(&b);
        assert!(!a2.contains_key(&"views"));
    }

    #[test]
    fn clear_removes_every_key() {
        let mut map: ORMap<&str, GCounter<u64>> = ORMap::new(ReplicaId::from(1));
        map.update("a", |mut c| {
            c.increment(1);
            c
        });
        map.update("b", |mut c| {
            c.increment(1);
            c
        });
        map.clear();
        assert!(map.is_empty());
    }

    #[test]
    fn try_new_rejects_read_only_replica() {
        assert!(ORMap::<&str, GCounter<u64>>::try_new(ReplicaId::READ_ONLY).is_err());
        assert!(ORMap::<&str, GCounter<u64>>::try_new(ReplicaId::from(1)).is_ok());
    }

    #[test]
    fn round_trip_preserves_entries() {
        let mut map: ORMap<&str, GCounter<u64>> = ORMap::new(ReplicaId::from(1));
        map.update("views", |mut c| {
            c.increment(4);
            c
        });

        let tokens = map.tokens();
        let restored: ORMap<&str, GCounter<u64>> = ORMap::from_tokens(&mut tokens.into_iter()).unwrap();
        assert_eq!(map, restored);
    }
}
