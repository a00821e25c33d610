//! # Keyed Locks
//!
//! Per-table and per-stock exclusive locks.
//!
//! ## Lock Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   1. table lock            lock_table(table_id)                        │
//! │   2. stock locks           lock_stocks([b, a, c]) → a, b, c            │
//! │   3. database connection   db.begin()                                  │
//! │                                                                         │
//! │   Every path takes locks in this order and never waits for a lock     │
//! │   while holding a connection, so two finalizes on different tables     │
//! │   that share stock cannot deadlock, and a single-connection pool       │
//! │   cannot be starved by a lock waiter.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Locks are process-local. Each acquisition is bounded by a timeout; when it
//! elapses the operation fails with [`FloorError::LockTimeout`] before it has
//! written anything.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{trace, warn};

use crate::error::{FloorError, FloorResult};

type Slots = DashMap<String, Arc<Mutex<()>>>;

/// One namespace of named locks. Clones share the same slots.
///
/// A slot exists only while someone holds or waits on it, so probing
/// unknown ids leaves nothing behind.
#[derive(Debug, Clone, Default)]
struct KeyedLocks {
    slots: Arc<Slots>,
}

impl KeyedLocks {
    fn slot(&self, key: &str) -> Arc<Mutex<()>> {
        // Clone the Arc out so the map shard is released before awaiting.
        self.slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn acquire(&self, kind: &str, key: &str, timeout: Duration) -> FloorResult<SlotGuard> {
        let slot = self.slot(key);
        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => {
                trace!(kind, key, "Lock acquired");
                Ok(SlotGuard {
                    key: key.to_string(),
                    slots: Arc::clone(&self.slots),
                    guard: Some(guard),
                })
            }
            Err(_) => {
                warn!(kind, key, timeout_ms = timeout.as_millis() as u64, "Lock wait timed out");
                Err(FloorError::LockTimeout {
                    resource: format!("{kind} {key}"),
                    waited_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

/// A held slot. Dropping it unlocks, then evicts the slot if the map holds
/// the only remaining reference.
#[derive(Debug)]
struct SlotGuard {
    key: String,
    slots: Arc<Slots>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        // Unlock first; waiters hold their own clone of the slot and keep it alive.
        drop(self.guard.take());
        self.slots.remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}

/// Guard for a table lock. Released on drop.
#[derive(Debug)]
pub struct TableGuard {
    table_id: String,
    _guard: SlotGuard,
}

impl TableGuard {
    pub fn table_id(&self) -> &str {
        &self.table_id
    }
}

/// Guards for a set of stock locks, held in ascending id order.
#[derive(Debug)]
pub struct StockGuards {
    stock_ids: Vec<String>,
    _guards: Vec<SlotGuard>,
}

impl StockGuards {
    /// Locked stock ids, ascending.
    pub fn stock_ids(&self) -> &[String] {
        &self.stock_ids
    }

    /// Whether `ids` is exactly the locked set.
    pub fn covers_exactly(&self, ids: &[String]) -> bool {
        let mut wanted: Vec<&str> = ids.iter().map(String::as_str).collect();
        wanted.sort_unstable();
        wanted.dedup();
        wanted.len() == self.stock_ids.len()
            && wanted.iter().zip(&self.stock_ids).all(|(a, b)| *a == b.as_str())
    }
}

/// Registry of table and stock locks shared by every component.
#[derive(Debug, Clone)]
pub struct LockManager {
    tables: KeyedLocks,
    stocks: KeyedLocks,
    timeout: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        LockManager {
            tables: KeyedLocks::default(),
            stocks: KeyedLocks::default(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The same registry with a different wait bound.
    pub fn with_timeout(&self, timeout: Duration) -> LockManager {
        LockManager {
            tables: self.tables.clone(),
            stocks: self.stocks.clone(),
            timeout,
        }
    }

    /// Locks one table with the default timeout.
    pub async fn lock_table(&self, table_id: &str) -> FloorResult<TableGuard> {
        self.lock_table_within(table_id, self.timeout).await
    }

    /// Locks one table, giving up after `timeout`.
    pub async fn lock_table_within(
        &self,
        table_id: &str,
        timeout: Duration,
    ) -> FloorResult<TableGuard> {
        let guard = self.tables.acquire("table", table_id, timeout).await?;
        Ok(TableGuard {
            table_id: table_id.to_string(),
            _guard: guard,
        })
    }

    /// Locks a set of stocks in ascending id order. Duplicates are ignored.
    ///
    /// If any lock times out, the ones already taken are released.
    pub async fn lock_stocks(&self, stock_ids: &[String]) -> FloorResult<StockGuards> {
        let mut ids: Vec<String> = stock_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in &ids {
            guards.push(self.stocks.acquire("stock", id, self.timeout).await?);
        }

        Ok(StockGuards {
            stock_ids: ids,
            _guards: guards,
        })
    }

    /// Number of live lock slots (tables, stocks).
    pub fn slot_counts(&self) -> (usize, usize) {
        (self.tables.len(), self.stocks.len())
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
