//! Set CRDTs.
//!
//! The `add` and `remove` operations on a traditional set do not
//! commute, so this crate builds its set entirely on the dot-kernel's
//! observed-remove semantics instead of offering multiple competing
//! conflict-resolution strategies.
//!
//! ###### `ORSet`
//!
//! An observed-remove set. Clients may only remove elements from the
//! set which are present in the local replica. In the event of a
//! concurrent add and remove of the same element, add wins — the
//! outcome depends only on the causal history of the operations, never
//! on wall-clock or transaction-id tie-breaking.

pub use self::orset::ORSet;

mod orset;
