//! The token serialization contract shared by every CRDT.
//!
//! A token stream is a tree of counted groups whose leaves are scalars
//! drawn from a CRDT's scalar union. Every public CRDT in this crate
//! implements [`ToTokens`]/[`FromTokens`] over its own scalar type, so
//! that a parser knowing only the type's field-arity can reconstruct
//! the value from the stream alone.

use crate::error::CrdtError;
use crate::replica::ReplicaId;

/// A single element of a token stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token<S> {
    /// The number of fields in the group that follows.
    Count(u64),
    /// A scalar value from the CRDT's scalar union.
    Scalar(S),
}

/// The scalar union for counter CRDTs: `ReplicaId | N`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CounterScalar<N> {
    Replica(ReplicaId),
    Value(N),
}

/// Producer side of the token contract.
pub trait ToTokens<S> {
    /// Appends this value's token representation to `tokens`.
    fn to_tokens(&self, tokens: &mut Vec<Token<S>>);

    /// Convenience wrapper returning a fresh token vector.
    fn tokens(&self) -> Vec<Token<S>> {
        let mut tokens = Vec::new();
        self.to_tokens(&mut tokens);
        tokens
    }
}

/// Consumer side of the token contract.
pub trait FromTokens<S>: Sized {
    /// Reconstructs a value by consuming tokens from `iter`.
    fn from_tokens(iter: &mut dyn Iterator<Item = S2Token<S>>) -> Result<Self, CrdtError>;
}

// Token<S> is re-exported under a short alias so FromTokens's signature
// doesn't need two generic parameters for the same thing.
type S2Token<S> = Token<S>;

/// Pulls the next token out of `iter`, failing with `MalformedTokens`
/// if the stream ended early.
pub fn next_token<S>(iter: &mut dyn Iterator<Item = Token<S>>) -> Result<Token<S>, CrdtError> {
    iter.next()
        .ok_or_else(|| CrdtError::MalformedTokens("unexpected end of token stream".into()))
}

/// Pulls the next token and asserts it is a `Count`, returning the count.
pub fn next_count<S>(iter: &mut dyn Iterator<Item = Token<S>>) -> Result<u64, CrdtError> {
    match next_token(iter)? {
        Token::Count(n) => Ok(n),
        Token::Scalar(_) => Err(CrdtError::MalformedTokens(
            "expected a count token, found a scalar".into(),
        )),
    }
}

/// Pulls the next token and asserts it is a `Scalar`, returning it.
pub fn next_scalar<S>(iter: &mut dyn Iterator<Item = Token<S>>) -> Result<S, CrdtError> {
    match next_token(iter)? {
        Token::Scalar(s) => Ok(s),
        Token::Count(_) => Err(CrdtError::MalformedTokens(
            "expected a scalar token, found a count".into(),
        )),
    }
}

/// Asserts the next count equals `expected`, failing with
/// `MalformedTokens` otherwise. Used to pin a type's leading
/// field-arity count.
pub fn expect_count<S>(iter: &mut dyn Iterator<Item = Token<S>>, expected: u64) -> Result<(), CrdtError> {
    let n = next_count(iter)?;
    if n != expected {
        return Err(CrdtError::MalformedTokens(format!(
            "expected a count of {expected}, found {n}"
        )));
    }
    Ok(())
}

/// Reads a `map{K->V}` group's leading count and asserts it has even
/// parity, returning the number of pairs `k = count / 2`.
pub fn expect_pair_count<S>(iter: &mut dyn Iterator<Item = Token<S>>) -> Result<u64, CrdtError> {
    let n = next_count(iter)?;
    if n % 2 != 0 {
        return Err(CrdtError::MalformedTokens(format!(
            "map group count {n} has odd parity, expected an even count of key/value pairs"
        )));
    }
    Ok(n / 2)
}

/// Round-trips `value` through its own token stream and back,
/// returning the reconstructed value. Used by tests and by callers
/// wanting to validate a `ToTokens`/`FromTokens` pair is consistent.
pub fn round_trip<T, S>(value: &T) -> Result<T, CrdtError>
where
    T: ToTokens<S> + FromTokens<S>,
{
    let tokens = value.tokens();
    T::from_tokens(&mut tokens.into_iter())
}
