//! In-memory keyed store.
//!
//! Reference implementation of [`KeyedStore`] for tests/dev and the
//! single-process deployment. Optimistic concurrency per key: every cell
//! carries a version, and a conditional write commits only if the version it
//! read is still current. Versions survive removal (tombstones) so a
//! delete/insert pair between read and commit is still detected.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::mpsc;
use std::sync::{Mutex, RwLock};

use crate::kv::{KeyedStore, StoreError, TxDecision, TxOutcome};
use crate::subscription::Subscription;

/// Bounded retry count for conditional writes.
const MAX_CAS_ATTEMPTS: u32 = 16;

#[derive(Debug, Clone)]
struct Cell<V> {
    version: u64,
    /// `None` is a tombstone: the key is absent but its version history
    /// remains, keeping conditional writes sound across remove/insert.
    value: Option<V>,
}

#[derive(Debug)]
pub struct InMemoryStore<K, V> {
    cells: RwLock<HashMap<K, Cell<V>>>,
    watchers: Mutex<HashMap<K, Vec<mpsc::Sender<Option<V>>>>>,
}

impl<K, V> InMemoryStore<K, V> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K, V> Default for InMemoryStore<K, V> {
    fn default() -> Self {
        Self {
            cells: RwLock::new(HashMap::new()),
            watchers: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> InMemoryStore<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Fan the new value at `key` out to its watchers, dropping any whose
    /// receiver has gone away.
    fn notify(&self, key: &K, value: &Option<V>) {
        let Ok(mut watchers) = self.watchers.lock() else {
            return;
        };
        if let Some(senders) = watchers.get_mut(key) {
            senders.retain(|tx| tx.send(value.clone()).is_ok());
            if senders.is_empty() {
                watchers.remove(key);
            }
        }
    }
}

impl<K, V> KeyedStore<K, V> for InMemoryStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Result<Option<V>, StoreError> {
        let cells = self.cells.read().map_err(|_| StoreError::Poisoned)?;
        Ok(cells.get(key).and_then(|c| c.value.clone()))
    }

    fn put(&self, key: K, value: V) -> Result<(), StoreError> {
        {
            let mut cells = self.cells.write().map_err(|_| StoreError::Poisoned)?;
            let cell = cells.entry(key.clone()).or_insert(Cell {
                version: 0,
                value: None,
            });
            cell.version += 1;
            cell.value = Some(value.clone());
        }
        self.notify(&key, &Some(value));
        Ok(())
    }

    fn remove(&self, key: &K) -> Result<(), StoreError> {
        let removed = {
            let mut cells = self.cells.write().map_err(|_| StoreError::Poisoned)?;
            match cells.get_mut(key) {
                Some(cell) if cell.value.is_some() => {
                    cell.version += 1;
                    cell.value = None;
                    true
                }
                _ => false,
            }
        };
        if removed {
            self.notify(key, &None);
        }
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(K, V)>, StoreError> {
        let cells = self.cells.read().map_err(|_| StoreError::Poisoned)?;
        Ok(cells
            .iter()
            .filter_map(|(k, c)| c.value.clone().map(|v| (k.clone(), v)))
            .collect())
    }

    fn transact(
        &self,
        key: &K,
        apply: &mut dyn FnMut(Option<&V>) -> TxDecision<V>,
    ) -> Result<TxOutcome<V>, StoreError> {
        for _attempt in 0..MAX_CAS_ATTEMPTS {
            // Read phase: snapshot value + version without holding the lock
            // while the closure runs.
            let (read_version, read_value) = {
                let cells = self.cells.read().map_err(|_| StoreError::Poisoned)?;
                match cells.get(key) {
                    Some(cell) => (cell.version, cell.value.clone()),
                    None => (0, None),
                }
            };

            let decision = apply(read_value.as_ref());
            if matches!(decision, TxDecision::Abort) {
                return Ok(TxOutcome::Aborted);
            }

            // Commit phase: re-check the version under the write lock.
            let committed = {
                let mut cells = self.cells.write().map_err(|_| StoreError::Poisoned)?;
                let current = cells.get(key).map(|c| c.version).unwrap_or(0);
                if current != read_version {
                    None // lost the race, retry
                } else {
                    let cell = cells.entry(key.clone()).or_insert(Cell {
                        version: 0,
                        value: None,
                    });
                    cell.version += 1;
                    cell.value = match decision {
                        TxDecision::Put(v) => Some(v),
                        TxDecision::Remove => None,
                        TxDecision::Abort => unreachable!(),
                    };
                    Some(cell.value.clone())
                }
            };

            if let Some(new_value) = committed {
                self.notify(key, &new_value);
                return Ok(TxOutcome::Committed(new_value));
            }
        }

        Err(StoreError::Conflict {
            attempts: MAX_CAS_ATTEMPTS,
        })
    }

    fn watch(&self, key: &K) -> Result<Subscription<Option<V>>, StoreError> {
        let (tx, rx) = mpsc::channel();

        // Snapshot and register while holding the cells lock: a write that
        // commits after the snapshot cannot fan out before the sender is
        // registered, so the subscriber sees the snapshot and then every
        // later change, with no gap. Writers take the watchers lock only
        // after releasing the cells lock, so this nesting cannot deadlock.
        let cells = self.cells.read().map_err(|_| StoreError::Poisoned)?;
        let current = cells.get(key).and_then(|c| c.value.clone());
        let _ = tx.send(current);

        let mut watchers = self.watchers.lock().map_err(|_| StoreError::Poisoned)?;
        watchers.entry(key.clone()).or_default().push(tx);

        Ok(Subscription::new(rx))
    }
}
