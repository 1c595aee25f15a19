//! A library of delta-state Conflict-free Replicated Data Types.
//!
//! The core is the causal/dotted-state machinery ([`DotContext`],
//! [`DotKernel`]/[`DotKernelSingle`]) and the family of CRDTs built on
//! top of it: observed-remove sets, add-wins and causal last-writer-
//! wins registers, maps of CRDTs, and state-based vector counters.
//! Every CRDT here supports both full-state merge (`converge` on a
//! complete replica) and delta-state merge (`converge` on a small
//! mutation descriptor returned by the mutator that produced it) —
//! they are the same operation, so no separate delta API exists.
//!
//! ###### Further Reading
//!
//! 1. [_A comprehensive study of Convergent and Commutative Replicated Data Types_](http://hal.inria.fr/docs/00/55/55/88/PDF/techreport.pdf) (Shapiro, et al.)
//! 2. [_An Optimized Conflict-free Replicated Set_](http://arxiv.org/pdf/1210.3368.pdf) (Bieniusa, et al.)
//!
//! ###### Replication
//!
//! Updates to CRDTs can be shared with replicas in two ways: full
//! state-based replication, where the entire state of the mutated CRDT
//! is merged into remote replicas, and delta-state replication, where
//! only the small delta a mutator returned is merged. Both go through
//! the same `converge` method; delta-state replication is lighter
//! weight in terms of the data transmitted per mutation, at the cost
//! of requiring (eventual, any-order, duplicates-tolerated) delivery
//! of every delta to every replica.
//!
//! ###### Partial Ordering
//!
//! Replicas of a CRDT are partially ordered by their causal history.
//! If every event reflected in replica `B` has also been observed by
//! `A` (equivalently: merging `B` into `A` leaves `A` unchanged), then
//! `A`'s state already dominates `B`'s.
//!
//! ###### Equality
//!
//! For the dot-kernel-backed CRDTs (sets, registers, maps), equality
//! compares causal state (live dots and values), not the replica id.
//! For the vector counters, equality compares the computed numeric
//! value rather than the underlying per-replica map — two counters
//! that reached the same total by a different history of increments
//! are equal.

pub mod context;
pub mod counter;
pub mod dot;
pub mod error;
pub mod kernel;
pub mod map;
pub mod register;
pub mod replica;
pub mod set;
pub mod token;

#[cfg(any(feature = "quickcheck_generators", test))]
pub mod test;

pub use context::DotContext;
pub use counter::{GCounter, PnCounter};
pub use dot::Dot;
pub use error::CrdtError;
pub use kernel::{DotKernel, DotKernelSingle};
pub use map::ORMap;
pub use register::{CausalLwwRegister, MVRegister};
pub use replica::{ReplicaId, SeqNum};
pub use set::ORSet;

/// Merges another replica's state into `self`, returning whether
/// `self` gained any new information.
///
/// `other` may be a full replica or a delta produced by one of the
/// implementing type's own mutators — both are values of the same
/// type, and both merge through this one method.
pub trait Convergent {
    /// Merges `other` into this replica.
    ///
    /// Idempotent, commutative, and associative: merging the same
    /// state any number of times, in any order, interleaved with any
    /// other deltas, converges to the same result.
    fn converge(&mut self, other: &Self) -> bool;
}

/// The common surface every concrete CRDT in this crate implements, on
/// top of [`Convergent`].
pub trait Causal: Convergent {
    /// True if this replica holds no live state.
    fn is_empty(&self) -> bool;

    /// Clears this replica, returning the cleared state as a delta
    /// that, merged elsewhere, propagates the clear.
    fn clear(&mut self) -> Self;
}

/// Constructs a fresh, empty replica for a given replica id.
///
/// Split out from [`Causal`] because it has no `&self` to dispatch on
/// (it's where a replica's causal history starts from nothing), and
/// because [`DotContext`] — which is `Convergent` but not itself a
/// replica-identified CRDT — has no construction-time replica id.
pub trait Create: Sized {
    /// Creates a new, empty instance for `replica_id`.
    fn create(replica_id: ReplicaId) -> Self;
}
