//! The dot context: a compact representation of every causal event any
//! replica has ever observed.
//!
//! A context is a dense prefix per replica id (`dense[r]` means every seq
//! in `[1..=dense[r]]` has been observed) plus a "gap" set holding later,
//! non-contiguous dots. Compaction folds any contiguous suffix of the gap
//! set into the dense prefix, keeping the common sequential case compact.

use std::collections::{HashMap, HashSet};

#[cfg(any(feature = "quickcheck_generators", test))]
use quickcheck::{Arbitrary, Gen};

use serde::{Deserialize, Serialize};

use crate::dot::Dot;
use crate::error::CrdtError;
use crate::replica::{ReplicaId, SeqNum};
use crate::token::{expect_count, next_scalar, FromTokens, ToTokens, Token};

/// The scalar union a [`DotContext`] serializes to tokens with:
/// `ReplicaId | SeqNum`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContextScalar {
    Replica(ReplicaId),
    Seq(SeqNum),
}

/// A compact set of observed dots.
///
/// ##### Example
///
/// ```
/// use crdt::{DotContext, Dot, ReplicaId, SeqNum};
///
/// let mut ctx = DotContext::new();
/// let a = ReplicaId::from(1);
/// ctx.set(Dot::new(a, SeqNum::from(2)), true);
/// ctx.set(Dot::new(a, SeqNum::from(3)), true);
/// assert!(!ctx.contains(Dot::new(a, SeqNum::from(1))));
///
/// ctx.set(Dot::new(a, SeqNum::from(1)), true);
/// assert!(ctx.contains(Dot::new(a, SeqNum::from(1))));
/// assert!(ctx.contains(Dot::new(a, SeqNum::from(3))));
/// assert!(!ctx.contains(Dot::new(a, SeqNum::from(4))));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DotContext {
    dense: HashMap<ReplicaId, SeqNum>,
    gaps: HashSet<Dot>,
}

impl DotContext {
    /// Creates a new, empty dot context.
    pub fn new() -> DotContext {
        DotContext::default()
    }

    /// Returns true if `dot` has been observed: either it falls within
    /// the dense prefix for its replica, or it sits in the gap set.
    pub fn contains(&self, dot: Dot) -> bool {
        let dense = self.dense.get(&dot.replica_id).copied().unwrap_or(SeqNum::NONE);
        dot.seq.get() <= dense.get() || self.gaps.contains(&dot)
    }

    /// Inserts `dot` into the gap set, optionally compacting immediately.
    ///
    /// Non-compacting inserts are useful when a caller is about to
    /// insert a whole batch of dots and wants to defer compaction to a
    /// single trailing call.
    pub fn set(&mut self, dot: Dot, compact_now: bool) {
        if !self.contains(dot) {
            self.gaps.insert(dot);
        }
        if compact_now {
            self.compact_replica(dot.replica_id);
        }
    }

    /// Computes, records, and returns the next dot for replica `r`:
    /// the smallest seq such that the resulting dot is not already
    /// contained in this context.
    pub fn next_dot(&mut self, r: ReplicaId) -> Dot {
        let mut seq = self.dense.get(&r).copied().unwrap_or(SeqNum::NONE).next();
        while self.gaps.contains(&Dot::new(r, seq)) {
            seq = seq.next();
        }
        let dot = Dot::new(r, seq);
        self.gaps.insert(dot);
        self.compact_replica(r);
        dot
    }

    /// Folds any contiguous suffix of the gap set into the dense
    /// prefix, for every replica id the gap set mentions.
    pub fn compact(&mut self) {
        let replicas: Vec<ReplicaId> = self.gaps.iter().map(|d| d.replica_id).collect();
        for r in replicas {
            self.compact_replica(r);
        }
    }

    fn compact_replica(&mut self, r: ReplicaId) {
        loop {
            let next = self.dense.get(&r).copied().unwrap_or(SeqNum::NONE).next();
            if self.gaps.remove(&Dot::new(r, next)) {
                self.dense.insert(r, next);
            } else {
                break;
            }
        }
    }

    /// Merges `other` into this context: the dense prefixes unify by
    /// max, the gap sets union, then the result is compacted. Returns
    /// true iff this context gained any new information.
    pub fn converge(&mut self, other: &DotContext) -> bool {
        let mut changed = false;

        for (&r, &seq) in other.dense.iter() {
            let entry = self.dense.entry(r).or_insert(SeqNum::NONE);
            if seq.get() > entry.get() {
                *entry = seq;
                changed = true;
            }
        }

        for &dot in other.gaps.iter() {
            if !self.contains(dot) {
                self.gaps.insert(dot);
                changed = true;
            }
        }

        self.compact();
        changed
    }

    /// Returns true if no dots have been observed.
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty() && self.gaps.is_empty()
    }
}

impl ToTokens<ContextScalar> for DotContext {
    fn to_tokens(&self, tokens: &mut Vec<Token<ContextScalar>>) {
        tokens.push(Token::Count(2));

        tokens.push(Token::Count(2 * self.dense.len() as u64));
        for (&r, &seq) in self.dense.iter() {
            tokens.push(Token::Scalar(ContextScalar::Replica(r)));
            tokens.push(Token::Scalar(ContextScalar::Seq(seq)));
        }

        tokens.push(Token::Count(2 * self.gaps.len() as u64));
        for dot in self.gaps.iter() {
            tokens.push(Token::Scalar(ContextScalar::Replica(dot.replica_id)));
            tokens.push(Token::Scalar(ContextScalar::Seq(dot.seq)));
        }
    }
}

impl FromTokens<ContextScalar> for DotContext {
    fn from_tokens(iter: &mut dyn Iterator<Item = Token<ContextScalar>>) -> Result<Self, CrdtError> {
        expect_count(iter, 2)?;

        let dense_pairs = expect_pairs(iter)?;
        let mut dense = HashMap::with_capacity(dense_pairs as usize);
        for _ in 0..dense_pairs {
            let r = expect_replica(iter)?;
            let seq = expect_seq(iter)?;
            dense.insert(r, seq);
        }

        let gap_pairs = expect_pairs(iter)?;
        let mut gaps = HashSet::with_capacity(gap_pairs as usize);
        for _ in 0..gap_pairs {
            let r = expect_replica(iter)?;
            let seq = expect_seq(iter)?;
            gaps.insert(Dot::new(r, seq));
        }

        Ok(DotContext { dense, gaps })
    }
}

fn expect_pairs(iter: &mut dyn Iterator<Item = Token<ContextScalar>>) -> Result<u64, CrdtError> {
    match next_scalar_count(iter)? {
        n if n % 2 == 0 => Ok(n / 2),
        n => Err(CrdtError::MalformedTokens(format!(
            "dot context group count {n} has odd parity, expected an even count of (replica, seq) pairs"
        ))),
    }
}

fn next_scalar_count(iter: &mut dyn Iterator<Item = Token<ContextScalar>>) -> Result<u64, CrdtError> {
    match iter.next() {
        Some(Token::Count(n)) => Ok(n),
        Some(Token::Scalar(_)) => Err(CrdtError::MalformedTokens("expected a count token, found a scalar".into())),
        None => Err(CrdtError::MalformedTokens("unexpected end of token stream".into())),
    }
}

fn expect_replica(iter: &mut dyn Iterator<Item = Token<ContextScalar>>) -> Result<ReplicaId, CrdtError> {
    match next_scalar(iter)? {
        ContextScalar::Replica(r) => Ok(r),
        ContextScalar::Seq(_) => Err(CrdtError::MalformedTokens("expected a replica id scalar".into())),
    }
}

fn expect_seq(iter: &mut dyn Iterator<Item = Token<ContextScalar>>) -> Result<SeqNum, CrdtError> {
    match next_scalar(iter)? {
        ContextScalar::Seq(s) => Ok(s),
        ContextScalar::Replica(_) => Err(CrdtError::MalformedTokens("expected a seq num scalar".into())),
    }
}

impl crate::Convergent for DotContext {
    fn converge(&mut self, other: &DotContext) -> bool {
        DotContext::converge(self, other)
    }
}

#[cfg(any(feature = "quickcheck_generators", test))]
impl Arbitrary for DotContext {
    fn arbitrary(g: &mut Gen) -> DotContext {
        let mut ctx = DotContext::new();
        let dots: Vec<Dot> = Arbitrary::arbitrary(g);
        for dot in dots {
            ctx.set(dot, false);
        }
        ctx.compact();
        ctx
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compaction_folds_gaps_in_any_insertion_order() {
        // S4: insert (a,2), (a,3), (a,1); after (a,1) lands, dense[a] == 3
        // and the gap set is empty.
        let a = ReplicaId::from(1);
        let mut ctx = DotContext::new();
        ctx.set(Dot::new(a, SeqNum::from(2)), true);
        ctx.set(Dot::new(a, SeqNum::from(3)), true);
        ctx.set(Dot::new(a, SeqNum::from(1)), true);

        assert_eq!(Some(&SeqNum::from(3)), ctx.dense.get(&a));
        assert!(ctx.gaps.is_empty());
    }

    #[test]
    fn next_dot_skips_already_observed_seqs() {
        let a = ReplicaId::from(1);
        let mut ctx = DotContext::new();
        assert_eq!(Dot::new(a, SeqNum::from(1)), ctx.next_dot(a));
        assert_eq!(Dot::new(a, SeqNum::from(2)), ctx.next_dot(a));

        ctx.set(Dot::new(a, SeqNum::from(4)), true);
        assert_eq!(Dot::new(a, SeqNum::from(3)), ctx.next_dot(a));
        assert_eq!(Dot::new(a, SeqNum::from(5)), ctx.next_dot(a));
    }

    #[test]
    fn converge_unions_dense_and_gaps_then_compacts() {
        let a = ReplicaId::from(1);
        let mut x = DotContext::new();
        let mut y = DotContext::new();

        x.next_dot(a);
        x.next_dot(a);
        y.set(Dot::new(a, SeqNum::from(3)), true);

        assert!(x.converge(&y));
        assert!(x.contains(Dot::new(a, SeqNum::from(3))));
        assert_eq!(Some(&SeqNum::from(3)), x.dense.get(&a));
        assert!(x.gaps.is_empty());

        assert!(!x.converge(&y));
    }

    #[test]
    fn round_trip_preserves_contents() {
        let a = ReplicaId::from(1);
        let b = ReplicaId::from(2);
        let mut ctx = DotContext::new();
        ctx.next_dot(a);
        ctx.next_dot(a);
        ctx.set(Dot::new(b, SeqNum::from(5)), true);

        let tokens = ctx.tokens();
        let restored = DotContext::from_tokens(&mut tokens.into_iter()).unwrap();
        assert_eq!(ctx, restored);
    }
}
