//! Counter CRDTs: vector counters whose convergence is a per-replica
//! max-merge rather than the dot-kernel machinery the rest of the
//! crate is built on.

pub use self::gcounter::GCounter;
pub use self::pncounter::PnCounter;
pub use crate::token::CounterScalar;

mod gcounter;
mod pncounter;

use std::fmt;
use std::hash::Hash;
use std::ops::Add;

#[cfg(any(feature = "quickcheck_generators", test))]
use quickcheck::Arbitrary;

use num_traits::{AsPrimitive, Unsigned, Zero};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// The bound every counter value type `N` must satisfy: an unsigned
/// integer, widenable to `i128` so [`PnCounter::value`] can compute a
/// signed difference without risking overflow on the subtraction
/// itself.
pub trait Count:
    Copy
    + Clone
    + fmt::Debug
    + Default
    + PartialEq
    + Eq
    + Hash
    + Add<Output = Self>
    + Unsigned
    + Zero
    + AsPrimitive<i128>
    + Serialize
    + DeserializeOwned
{
}

impl<T> Count for T where
    T: Copy
        + Clone
        + fmt::Debug
        + Default
        + PartialEq
        + Eq
        + Hash
        + Add<Output = T>
        + Unsigned
        + Zero
        + AsPrimitive<i128>
        + Serialize
        + DeserializeOwned
{
}

#[cfg(any(feature = "quickcheck_generators", test))]
pub trait ArbitraryCount: Count + Arbitrary {}
#[cfg(any(feature = "quickcheck_generators", test))]
impl<T: Count + Arbitrary> ArbitraryCount for T {}
