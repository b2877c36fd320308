//! `mercato-store`: the keyed persistence boundary.
//!
//! The engine is agnostic to storage technology beyond three primitives:
//! point read/write by key, a conditional-write transaction (atomic keyed
//! read-modify-write with retry on conflict), and a change subscription
//! delivering the current value at a key whenever it changes. Any backend
//! exposing atomic compare-and-swap per key satisfies [`KeyedStore`]; the
//! in-memory implementation here is the reference (and the test double).

pub mod in_memory;
pub mod kv;
pub mod subscription;

pub use in_memory::InMemoryStore;
pub use kv::{KeyedStore, StoreError, TxDecision, TxOutcome};
pub use subscription::Subscription;
