//! The dot kernel: the shared causal memory engine behind every
//! observed-remove CRDT in this crate (sets, registers, maps). A kernel
//! is a [`DotContext`] plus a `Dot -> V` map; removal drops an entry
//! from the map while keeping its dot in the context, so a stale
//! concurrent re-add of the same value can never resurrect it.
//!
//! `V` is carried directly as a scalar in the token stream (the scalar
//! union for kernel-backed CRDTs is `ReplicaId | SeqNum | T`), so no
//! separate `ToTokens` bound on `V` is required here.

use std::collections::HashMap;

#[cfg(any(feature = "quickcheck_generators", test))]
use quickcheck::{Arbitrary, Gen};

use serde::{Deserialize, Serialize};

use crate::context::{ContextScalar, DotContext};
use crate::dot::Dot;
use crate::error::CrdtError;
use crate::replica::{ReplicaId, SeqNum};
use crate::token::{expect_count, expect_pair_count, next_scalar, FromTokens, ToTokens, Token};

/// The scalar union a dot-kernel-backed CRDT serializes to tokens with:
/// `ReplicaId | SeqNum | T`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KernelScalar<T> {
    Replica(ReplicaId),
    Seq(SeqNum),
    Value(T),
}

/// A map from causal dots to values, with observed-remove converge
/// semantics.
///
/// ##### Example
///
/// ```
/// use crdt::{DotKernel, ReplicaId};
///
/// let a = ReplicaId::from(1);
/// let b = ReplicaId::from(2);
///
/// let mut kernel_a = DotKernel::new(a);
/// let mut kernel_b = DotKernel::new(b);
///
/// kernel_a.set("x");
/// kernel_b.converge(&kernel_a);
/// assert_eq!(vec![&"x"], kernel_b.values().collect::<Vec<_>>());
///
/// kernel_b.remove_value(&"x", |a, b| a == b);
/// kernel_a.converge(&kernel_b);
/// assert!(kernel_a.values().next().is_none());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DotKernel<V> {
    replica_id: ReplicaId,
    map: HashMap<Dot, V>,
    ctx: DotContext,
}

impl<V> DotKernel<V> {
    /// Creates a new, empty kernel for replica `replica_id`.
    pub fn new(replica_id: ReplicaId) -> DotKernel<V> {
        DotKernel { replica_id, map: HashMap::new(), ctx: DotContext::new() }
    }

    /// Like [`DotKernel::new`], but rejects the read-only replica id
    /// instead of silently constructing a kernel whose mutators will
    /// all be no-ops.
    pub fn try_new(replica_id: ReplicaId) -> Result<DotKernel<V>, CrdtError> {
        if replica_id.is_read_only() {
            return Err(CrdtError::OutOfRangeReplica);
        }
        Ok(DotKernel::new(replica_id))
    }

    /// The replica id this kernel originates dots for.
    pub fn replica_id(&self) -> ReplicaId {
        self.replica_id
    }

    /// An iterator over the live values (not the removed-but-remembered
    /// dots) held by this kernel.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.map.values()
    }

    /// An iterator over the live `(dot, value)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (Dot, &V)> {
        self.map.iter().map(|(&d, v)| (d, v))
    }

    /// The number of live values.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if no values are live. Note this differs from the
    /// context being empty: a kernel can have an empty map but a
    /// non-empty context (everything added has since been removed).
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn empty_delta(&self) -> DotKernel<V> {
        DotKernel { replica_id: self.replica_id, map: HashMap::new(), ctx: DotContext::new() }
    }
}

impl<V: Clone> DotKernel<V> {
    /// Records a new value under a freshly allocated dot for this
    /// kernel's replica id, returning a delta containing only that
    /// dot and value.
    ///
    /// A no-op on a read-only ([`ReplicaId::is_read_only`]) replica:
    /// returns an empty delta without mutating `self`.
    pub fn set(&mut self, value: V) -> DotKernel<V> {
        if self.replica_id.is_read_only() {
            return self.empty_delta();
        }
        let dot = self.ctx.next_dot(self.replica_id);
        self.map.insert(dot, value.clone());

        let mut delta = self.empty_delta();
        delta.ctx.set(dot, true);
        delta.map.insert(dot, value);
        delta
    }

    /// Removes every live entry whose value is `eq`-equal to `v`.
    /// Returns a delta carrying the removed dots in its context (its
    /// map stays empty: removal never reintroduces a value).
    pub fn remove_value<F>(&mut self, v: &V, mut eq: F) -> DotKernel<V>
    where
        F: FnMut(&V, &V) -> bool,
    {
        let mut delta = self.empty_delta();
        let removed: Vec<Dot> = self
            .map
            .iter()
            .filter(|(_, existing)| eq(v, existing))
            .map(|(&d, _)| d)
            .collect();

        for dot in removed {
            self.map.remove(&dot);
            delta.ctx.set(dot, false);
        }
        delta.ctx.compact();
        delta
    }

    /// Removes every live entry. Returns a delta carrying every
    /// removed dot in its context.
    pub fn remove_all(&mut self) -> DotKernel<V> {
        let mut delta = self.empty_delta();
        for dot in self.map.keys().copied().collect::<Vec<_>>() {
            delta.ctx.set(dot, false);
        }
        delta.ctx.compact();
        self.map.clear();
        delta
    }

    /// Merges `other` (a full state or a delta) into this kernel.
    /// Returns true iff any of the three converge steps (add, remove,
    /// history) observed a change.
    pub fn converge(&mut self, other: &DotKernel<V>) -> bool {
        let mut changed = false;

        for (&dot, value) in other.map.iter() {
            if !self.map.contains_key(&dot) && !self.ctx.contains(dot) {
                self.map.insert(dot, value.clone());
                changed = true;
            }
        }

        let stale: Vec<Dot> = self
            .map
            .keys()
            .copied()
            .filter(|d| !other.map.contains_key(d) && other.ctx.contains(*d))
            .collect();
        for dot in stale {
            self.map.remove(&dot);
            changed = true;
        }

        changed |= self.ctx.converge(&other.ctx);
        changed
    }
}

impl<V: PartialEq> PartialEq for DotKernel<V> {
    fn eq(&self, other: &DotKernel<V>) -> bool {
        self.map == other.map && self.ctx == other.ctx
    }
}

impl<V: Eq> Eq for DotKernel<V> {}

impl<V: Clone> ToTokens<KernelScalar<V>> for DotKernel<V> {
    fn to_tokens(&self, tokens: &mut Vec<Token<KernelScalar<V>>>) {
        tokens.push(Token::Count(3));
        tokens.push(Token::Scalar(KernelScalar::Replica(self.replica_id)));

        tokens.push(Token::Count(2 * self.map.len() as u64));
        for (&dot, value) in self.map.iter() {
            tokens.push(Token::Scalar(KernelScalar::Replica(dot.replica_id)));
            tokens.push(Token::Scalar(KernelScalar::Seq(dot.seq)));
            tokens.push(Token::Scalar(KernelScalar::Value(value.clone())));
        }

        for t in self.ctx.tokens() {
            tokens.push(match t {
                Token::Count(n) => Token::Count(n),
                Token::Scalar(ContextScalar::Replica(r)) => Token::Scalar(KernelScalar::Replica(r)),
                Token::Scalar(ContextScalar::Seq(s)) => Token::Scalar(KernelScalar::Seq(s)),
            });
        }
    }
}

impl<V> FromTokens<KernelScalar<V>> for DotKernel<V> {
    fn from_tokens(iter: &mut dyn Iterator<Item = Token<KernelScalar<V>>>) -> Result<Self, CrdtError> {
        expect_count(iter, 3)?;
        let replica_id = expect_replica(iter)?;

        let pairs = expect_pair_count(iter)?;
        // Each (dot, value) pair is three raw tokens (replica, seq,
        // value), but `expect_pair_count` halves a key/value count —
        // account for that by reading three scalars per logical pair.
        let mut map = HashMap::with_capacity(pairs as usize);
        for _ in 0..pairs {
            let r = expect_replica(iter)?;
            let seq = expect_seq(iter)?;
            let value = expect_value(iter)?;
            map.insert(Dot::new(r, seq), value);
        }

        let ctx = DotContext::from_tokens(&mut ContextTokenAdapter { inner: iter })?;

        Ok(DotKernel { replica_id, map, ctx })
    }
}

/// Adapts the trailing `KernelScalar<V>` stream down to `ContextScalar`
/// for the embedded `DotContext`'s own `FromTokens` impl.
struct ContextTokenAdapter<'a, V> {
    inner: &'a mut dyn Iterator<Item = Token<KernelScalar<V>>>,
}

impl<'a, V> Iterator for ContextTokenAdapter<'a, V> {
    type Item = Token<ContextScalar>;
    fn next(&mut self) -> Option<Token<ContextScalar>> {
        self.inner.next().map(|t| match t {
            Token::Count(n) => Token::Count(n),
            Token::Scalar(KernelScalar::Replica(r)) => Token::Scalar(ContextScalar::Replica(r)),
            Token::Scalar(KernelScalar::Seq(s)) => Token::Scalar(ContextScalar::Seq(s)),
            // A value scalar has no place in the context sub-stream;
            // this only happens on a malformed stream.
            Token::Scalar(KernelScalar::Value(_)) => Token::Count(0),
        })
    }
}

fn expect_replica<V>(iter: &mut dyn Iterator<Item = Token<KernelScalar<V>>>) -> Result<ReplicaId, CrdtError> {
    match next_scalar(iter)? {
        KernelScalar::Replica(r) => Ok(r),
        _ => Err(CrdtError::MalformedTokens("expected a replica id scalar".into())),
    }
}

fn expect_seq<V>(iter: &mut dyn Iterator<Item = Token<KernelScalar<V>>>) -> Result<SeqNum, CrdtError> {
    match next_scalar(iter)? {
        KernelScalar::Seq(s) => Ok(s),
        _ => Err(CrdtError::MalformedTokens("expected a seq num scalar".into())),
    }
}

fn expect_value<V>(iter: &mut dyn Iterator<Item = Token<KernelScalar<V>>>) -> Result<V, CrdtError> {
    match next_scalar(iter)? {
        KernelScalar::Value(v) => Ok(v),
        _ => Err(CrdtError::MalformedTokens("expected a value scalar".into())),
    }
}

#[cfg(any(feature = "quickcheck_generators", test))]
impl<V: Arbitrary + Clone> Arbitrary for DotKernel<V> {
    fn arbitrary(g: &mut Gen) -> DotKernel<V> {
        let replica_id = ReplicaId::arbitrary(g);
        let mut kernel = DotKernel::new(replica_id);
        let values: Vec<V> = Arbitrary::arbitrary(g);
        for value in values {
            kernel.set(value);
        }
        kernel
    }
}

/// Same contract as [`DotKernel`], plus: at most one dot per replica id
/// is ever live in the map. Used by last-writer-wins registers whose
/// winner is chosen causally.
///
/// ##### Example
///
/// ```
/// use crdt::{DotKernelSingle, ReplicaId};
///
/// let a = ReplicaId::from(1);
/// let mut kernel = DotKernelSingle::new(a);
/// kernel.set("v1");
/// kernel.set("v2");
/// assert_eq!(vec![&"v2"], kernel.values().collect::<Vec<_>>());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DotKernelSingle<V> {
    inner: DotKernel<V>,
}

impl<V> DotKernelSingle<V> {
    /// Creates a new, empty kernel for replica `replica_id`.
    pub fn new(replica_id: ReplicaId) -> DotKernelSingle<V> {
        DotKernelSingle { inner: DotKernel::new(replica_id) }
    }

    /// Like [`DotKernelSingle::new`], but rejects the read-only
    /// replica id instead of silently constructing a kernel whose
    /// mutators will all be no-ops.
    pub fn try_new(replica_id: ReplicaId) -> Result<DotKernelSingle<V>, CrdtError> {
        if replica_id.is_read_only() {
            return Err(CrdtError::OutOfRangeReplica);
        }
        Ok(DotKernelSingle::new(replica_id))
    }

    /// The replica id this kernel originates dots for.
    pub fn replica_id(&self) -> ReplicaId {
        self.inner.replica_id()
    }

    /// An iterator over the live values (0 or 1 per replica id).
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.values()
    }

    /// True if no value is live.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<V: Clone> DotKernelSingle<V> {
    /// Drops this replica's existing dot (if any) from the live map
    /// — it survives only in the context — then records `value` under
    /// a fresh dot. Returns a delta reflecting both the drop and the
    /// new entry.
    pub fn set(&mut self, value: V) -> DotKernelSingle<V> {
        if self.inner.replica_id.is_read_only() {
            return DotKernelSingle { inner: self.inner.empty_delta() };
        }
        let stale: Vec<Dot> = self
            .inner
            .map
            .keys()
            .copied()
            .filter(|d| d.replica_id == self.inner.replica_id)
            .collect();
        let mut dropped = Vec::new();
        for dot in stale {
            self.inner.map.remove(&dot);
            dropped.push(dot);
        }

        let dot = self.inner.ctx.next_dot(self.inner.replica_id);
        self.inner.map.insert(dot, value.clone());

        let mut delta = self.inner.empty_delta();
        for d in dropped {
            delta.ctx.set(d, false);
        }
        delta.ctx.set(dot, true);
        delta.map.insert(dot, value);
        DotKernelSingle { inner: delta }
    }

    /// Removes the live value for this kernel's replica id, if any.
    pub fn remove_all(&mut self) -> DotKernelSingle<V> {
        DotKernelSingle { inner: self.inner.remove_all() }
    }

    /// Merges `other` into this kernel. After the usual three-step
    /// kernel converge, re-establishes the at-most-one-dot-per-replica
    /// invariant locally by keeping only the highest-seq surviving dot
    /// for each replica id — this is what makes the winner "causally"
    /// chosen: whichever replica's dot has the higher seq number.
    pub fn converge(&mut self, other: &DotKernelSingle<V>) -> bool {
        let mut changed = self.inner.converge(&other.inner);

        let mut best: HashMap<ReplicaId, Dot> = HashMap::new();
        for &dot in self.inner.map.keys() {
            best.entry(dot.replica_id)
                .and_modify(|cur| if dot.seq > cur.seq { *cur = dot })
                .or_insert(dot);
        }
        let stale: Vec<Dot> = self
            .inner
            .map
            .keys()
            .copied()
            .filter(|d| best.get(&d.replica_id) != Some(d))
            .collect();
        for dot in stale {
            self.inner.map.remove(&dot);
            changed = true;
        }

        changed
    }
}

impl<V: Clone> ToTokens<KernelScalar<V>> for DotKernelSingle<V> {
    fn to_tokens(&self, tokens: &mut Vec<Token<KernelScalar<V>>>) {
        self.inner.to_tokens(tokens)
    }
}

impl<V> FromTokens<KernelScalar<V>> for DotKernelSingle<V> {
    fn from_tokens(iter: &mut dyn Iterator<Item = Token<KernelScalar<V>>>) -> Result<Self, CrdtError> {
        DotKernel::from_tokens(iter).map(|inner| DotKernelSingle { inner })
    }
}

#[cfg(any(feature = "quickcheck_generators", test))]
impl<V: Arbitrary + Clone> Arbitrary for DotKernelSingle<V> {
    fn arbitrary(g: &mut Gen) -> DotKernelSingle<V> {
        let replica_id = ReplicaId::arbitrary(g);
        let mut kernel = DotKernelSingle::new(replica_id);
        let values: Vec<V> = Arbitrary::arbitrary(g);
        for value in values {
            kernel.set(value);
        }
        kernel
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn observed_remove_suppresses_stale_readd_but_not_concurrent_add() {
        // S3: a.set("x") -> (a,1). Merge to b. b removes "x". Merge back
        // to a: a's map is empty, a's ctx holds (a,1). If a concurrently
        // (before seeing the remove) set("x") again producing (a,2),
        // after a full merge the element survives because (a,2) is
        // absent from b's context.
        let a_id = ReplicaId::from(1);
        let b_id = ReplicaId::from(2);

        let mut a = DotKernel::new(a_id);
        a.set("x");

        let mut b = DotKernel::new(b_id);
        b.converge(&a);
        b.remove_value(&"x", |x, y| x == y);

        let mut a2 = a.clone();
        a2.converge(&b);
        assert!(a2.values().next().is_none());

        a.set("x"); // concurrent re-add, dot (a,2)
        a.converge(&b);
        assert_eq!(vec![&"x"], a.values().collect::<Vec<_>>());
    }

    #[test]
    fn single_kernel_keeps_only_highest_seq_per_replica() {
        // S5: a.set("v1") -> (a,1); a.set("v2") -> (a,2); map holds only
        // (a,2)->"v2"; ctx holds {(a,1),(a,2)}. Merging into a replica
        // that only saw "v1" converges to "v2".
        let a_id = ReplicaId::from(1);
        let mut a = DotKernelSingle::new(a_id);
        a.set("v1");
        a.set("v2");
        assert_eq!(vec![&"v2"], a.values().collect::<Vec<_>>());

        let mut b = DotKernelSingle::new(ReplicaId::from(2));
        let mut a_v1_only = DotKernelSingle::new(a_id);
        let delta = a_v1_only.set("v1");
        b.converge(&delta);
        assert_eq!(vec![&"v1"], b.values().collect::<Vec<_>>());

        b.converge(&a);
        assert_eq!(vec![&"v2"], b.values().collect::<Vec<_>>());
    }

    #[test]
    fn converge_is_idempotent_and_self_merge_is_identity() {
        let mut a = DotKernel::new(ReplicaId::from(1));
        a.set("x");
        let snapshot = a.clone();

        assert!(!a.clone().converge(&snapshot));

        let mut b = a.clone();
        assert!(!b.converge(&a.clone()));
        assert_eq!(a, b);
    }

    #[test]
    fn round_trip_preserves_map_and_context() {
        let mut a = DotKernel::new(ReplicaId::from(1));
        a.set("x");
        a.set("y");
        a.remove_value(&"x", |x, y| x == y);

        let tokens = a.tokens();
        let restored: DotKernel<&str> = DotKernel::from_tokens(&mut tokens.into_iter()).unwrap();
        assert_eq!(a, restored);
    }

    #[test]
    fn serde_json_round_trip_preserves_map_and_context() {
        let mut a = DotKernel::new(ReplicaId::from(1));
        a.set("x".to_string());
        a.set("y".to_string());
        a.remove_value(&"x".to_string(), |x, y| x == y);

        let json = serde_json::to_string(&a).unwrap();
        let restored: DotKernel<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(a, restored);
    }

    #[test]
    fn try_new_rejects_read_only_replica() {
        assert!(DotKernel::<&str>::try_new(ReplicaId::READ_ONLY).is_err());
        assert!(DotKernelSingle::<&str>::try_new(ReplicaId::READ_ONLY).is_err());
        assert!(DotKernel::<&str>::try_new(ReplicaId::from(1)).is_ok());
    }
}
