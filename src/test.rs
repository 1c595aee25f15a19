//! Generic quickcheck property helpers for the universal CRDT laws:
//! idempotence, commutativity, associativity, and self-merge-is-
//! identity. Each concrete CRDT already carries its own
//! hand-written unit tests for the concrete S1..S6 scenarios in its own
//! module; this module holds the *general* laws once, parameterized
//! over [`Convergent`], so every type that implements it gets the same
//! randomized check rather than a hand-rolled copy per type.

use crate::Convergent;

/// `x.converge(&y)` twice in a row: the second call reports no change
/// and leaves `x` unchanged.
pub fn idempotent<C: Convergent + Clone + PartialEq>(x: C, y: C) -> bool {
    let mut once = x;
    once.converge(&y);
    let mut twice = once.clone();
    let changed_again = twice.converge(&y);
    !changed_again && twice == once
}

/// Starting from equal states, merging `a` then `b` equals merging `b`
/// then `a`.
pub fn commutative<C: Convergent + Clone + PartialEq>(start: C, a: C, b: C) -> bool {
    let mut a_then_b = start.clone();
    a_then_b.converge(&a);
    a_then_b.converge(&b);

    let mut b_then_a = start;
    b_then_a.converge(&b);
    b_then_a.converge(&a);

    a_then_b == b_then_a
}

/// Merging `a`, then `b`, then `c` equals merging (`a` merged with `b`)
/// then `c`.
pub fn associative<C: Convergent + Clone + PartialEq>(start: C, a: C, b: C, c: C) -> bool {
    let mut left = start.clone();
    left.converge(&a);
    left.converge(&b);
    left.converge(&c);

    let mut a_and_b = start.clone();
    a_and_b.converge(&a);
    a_and_b.converge(&b);

    let mut right = start;
    right.converge(&a_and_b);
    right.converge(&c);

    left == right
}

/// `x.converge(x)` reports no change and leaves `x` unchanged
/// (self-merge is identity).
pub fn self_merge_is_identity<C: Convergent + Clone + PartialEq>(x: C) -> bool {
    let mut merged = x.clone();
    let changed = merged.converge(&x);
    !changed && merged == x
}

#[cfg(test)]
mod law_tests {
    use quickcheck_macros::quickcheck;

    use super::*;
    use crate::counter::{GCounter, PnCounter};
    use crate::{CausalLwwRegister, DotContext, MVRegister, ORMap, ORSet};

    #[quickcheck]
    fn gcounter_laws(start: GCounter<u64>, a: GCounter<u64>, b: GCounter<u64>, c: GCounter<u64>) -> bool {
        idempotent(start.clone(), a.clone())
            && commutative(start.clone(), a.clone(), b.clone())
            && associative(start.clone(), a, b, c)
            && self_merge_is_identity(start)
    }

    #[quickcheck]
    fn pncounter_laws(start: PnCounter<u64>, a: PnCounter<u64>, b: PnCounter<u64>, c: PnCounter<u64>) -> bool {
        idempotent(start.clone(), a.clone())
            && commutative(start.clone(), a.clone(), b.clone())
            && associative(start.clone(), a, b, c)
            && self_merge_is_identity(start)
    }

    #[quickcheck]
    fn dot_context_laws(start: DotContext, a: DotContext, b: DotContext, c: DotContext) -> bool {
        idempotent(start.clone(), a.clone())
            && commutative(start.clone(), a.clone(), b.clone())
            && associative(start.clone(), a, b, c)
            && self_merge_is_identity(start)
    }

    #[quickcheck]
    fn orset_laws(start: ORSet<u8>, a: ORSet<u8>, b: ORSet<u8>, c: ORSet<u8>) -> bool {
        idempotent(start.clone(), a.clone())
            && commutative(start.clone(), a.clone(), b.clone())
            && associative(start.clone(), a, b, c)
            && self_merge_is_identity(start)
    }

    #[quickcheck]
    fn mvregister_laws(start: MVRegister<u8>, a: MVRegister<u8>, b: MVRegister<u8>, c: MVRegister<u8>) -> bool {
        idempotent(start.clone(), a.clone())
            && commutative(start.clone(), a.clone(), b.clone())
            && associative(start.clone(), a, b, c)
            && self_merge_is_identity(start)
    }

    #[quickcheck]
    fn causal_lww_register_laws(
        start: CausalLwwRegister<u8>,
        a: CausalLwwRegister<u8>,
        b: CausalLwwRegister<u8>,
        c: CausalLwwRegister<u8>,
    ) -> bool {
        idempotent(start.clone(), a.clone())
            && commutative(start.clone(), a.clone(), b.clone())
            && associative(start.clone(), a, b, c)
            && self_merge_is_identity(start)
    }

    #[quickcheck]
    fn ormap_laws(
        start: ORMap<u8, GCounter<u64>>,
        a: ORMap<u8, GCounter<u64>>,
        b: ORMap<u8, GCounter<u64>>,
        c: ORMap<u8, GCounter<u64>>,
    ) -> bool {
        idempotent(start.clone(), a.clone())
            && commutative(start.clone(), a.clone(), b.clone())
            && associative(start.clone(), a, b, c)
            && self_merge_is_identity(start)
    }
}
