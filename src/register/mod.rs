//! Register CRDTs.
//!
//! The `set` operation on a register does not commute, so a
//! traditional register cannot be a CRDT on its own. Both registers
//! here are built on the dot-kernel's causal converge rule rather than
//! timestamps or transaction ids.
//!
//! ###### `MVRegister`
//!
//! A multi-value register. Concurrent writes from different replicas
//! survive side by side until the application resolves them.
//!
//! ###### `CausalLwwRegister`
//!
//! A single-value, last-writer-wins register whose winner is the write
//! with the higher causal sequence number, not the most recent
//! wall-clock timestamp.

pub use self::causal_lww::CausalLwwRegister;
pub use self::mvregister::MVRegister;

mod causal_lww;
mod mvregister;
