//! Keyed store contract.

use std::sync::Arc;

use thiserror::Error;

use mercato_core::DomainError;

use crate::subscription::Subscription;

/// What a conditional write decided to do with the value at a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxDecision<V> {
    /// Replace (or insert) the value.
    Put(V),
    /// Delete the value.
    Remove,
    /// Leave the key untouched and report [`TxOutcome::Aborted`].
    Abort,
}

/// Result of a committed (or aborted) conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome<V> {
    /// The decision was applied; carries the value now stored at the key
    /// (`None` after a remove).
    Committed(Option<V>),
    /// The closure chose to abort; nothing was written.
    Aborted,
}

impl<V> TxOutcome<V> {
    pub fn is_committed(&self) -> bool {
        matches!(self, TxOutcome::Committed(_))
    }
}

/// Store-level failure.
///
/// Deliberately small: domain meaning (stock conflict, review conflict, ...)
/// is assigned at each call site, not here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The conditional write kept losing the version race.
    #[error("conditional write conflicted {attempts} times, giving up")]
    Conflict { attempts: u32 },

    /// An internal lock was poisoned; the store is unusable.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Default mapping into the domain taxonomy: a store that cannot commit is
/// an unavailable collaborator. Call sites with a more specific meaning
/// (stock reservation, review aggregates) map explicitly instead.
impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        DomainError::unavailable(e.to_string())
    }
}

/// Keyed store: point reads/writes, a conditional-write transaction, and a
/// change subscription.
///
/// Kept dyn-compatible on purpose (no generic methods) so call sites can hold
/// `Arc<dyn KeyedStore<K, V>>` where composing several stores.
pub trait KeyedStore<K, V>: Send + Sync {
    /// Point read.
    fn get(&self, key: &K) -> Result<Option<V>, StoreError>;

    /// Unconditional upsert.
    fn put(&self, key: K, value: V) -> Result<(), StoreError>;

    /// Unconditional delete. Deleting an absent key is a no-op.
    fn remove(&self, key: &K) -> Result<(), StoreError>;

    /// Snapshot of every live entry. O(n); callers that scan (cart
    /// reconciliation, revenue queries) accept the full sweep.
    fn entries(&self) -> Result<Vec<(K, V)>, StoreError>;

    /// Conditional write: read the current value, let `apply` decide, commit
    /// only if the stored value has not changed since the read. On a lost
    /// race the read-decide-commit cycle is retried a bounded number of
    /// times before surfacing [`StoreError::Conflict`].
    ///
    /// Serializable per key against all other conditional writes on the same
    /// key; writes to disjoint keys never conflict with each other.
    fn transact(
        &self,
        key: &K,
        apply: &mut dyn FnMut(Option<&V>) -> TxDecision<V>,
    ) -> Result<TxOutcome<V>, StoreError>;

    /// Subscribe to the value at `key`: the current value is delivered
    /// immediately, then again after every committed change. A lazy,
    /// restartable sequence of snapshots, not an event log.
    fn watch(&self, key: &K) -> Result<Subscription<Option<V>>, StoreError>;
}

impl<K, V, S> KeyedStore<K, V> for Arc<S>
where
    S: KeyedStore<K, V> + ?Sized,
{
    fn get(&self, key: &K) -> Result<Option<V>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: K, value: V) -> Result<(), StoreError> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &K) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn entries(&self) -> Result<Vec<(K, V)>, StoreError> {
        (**self).entries()
    }

    fn transact(
        &self,
        key: &K,
        apply: &mut dyn FnMut(Option<&V>) -> TxDecision<V>,
    ) -> Result<TxOutcome<V>, StoreError> {
        (**self).transact(key, apply)
    }

    fn watch(&self, key: &K) -> Result<Subscription<Option<V>>, StoreError> {
        (**self).watch(key)
    }
}
