//! Error kinds surfaced by the CRDT core.

use thiserror::Error;

/// Errors that can arise from token (de)serialization and, optionally,
/// from constructing a CRDT with a reserved replica id.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrdtError {
    /// The leading count was wrong for this type, a nested group's
    /// count had the wrong parity for a key/value sequence, a scalar
    /// had the wrong variant, or the token stream ended prematurely.
    #[error("malformed token stream: {0}")]
    MalformedTokens(String),

    /// Replica id `0` is conventionally read-only; this error is only
    /// returned by the strict `try_new` constructors, never by
    /// mutators (mutators on a read-only replica silently no-op
    /// instead, since every mutator already returns a delta rather
    /// than a `Result`).
    #[error("replica id 0 is read-only and cannot originate events")]
    OutOfRangeReplica,
}

pub type Result<T> = std::result::Result<T, CrdtError>;
