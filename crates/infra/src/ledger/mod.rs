//! Concurrent batch ledger.
//!
//! One [`StockLedger`] aggregate per (product, branch) key, each behind its own mutex.
//! Every mutation runs inside [`BatchLedger::atomically`]:
//!
//! ```text
//! sort + dedup keys → lock each key in order → clone working copies
//!   → run closure (decide + apply on copies) → Ok: write back + append movements
//!                                             → Err: drop copies (nothing changed)
//! ```
//!
//! Keys are always locked in `StockKey` order, so two multi-key transactions can
//! never wait on each other in a cycle. Locks are held from the availability check
//! through commit or rollback.

mod snapshot;

pub use snapshot::StockSnapshot;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use stockflow_core::{Aggregate, BatchId, BranchId, Money, MovementId, ProductId};
use stockflow_inventory::{
    Batch, BatchDraw, ConsumeStock, LedgerCommand, LedgerEvent, ReceiveBatch, StockKey,
    StockLedger, StockMovement,
};

use crate::error::InventoryError;

/// Outcome of a FIFO consumption inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumption {
    pub cogs: Money,
    pub draws: Vec<BatchDraw>,
}

/// A committed single-key consumption and the OUT movement it recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionRecord {
    pub cogs: Money,
    pub draws: Vec<BatchDraw>,
    pub movement: StockMovement,
}

/// A committed replenishment and the IN movement it recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replenishment {
    pub batch_id: BatchId,
    pub movement: StockMovement,
}

/// Result of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed<T> {
    pub value: T,
    pub movements: Vec<StockMovement>,
}

/// Working state of one transaction. Mutations touch clones only.
#[derive(Debug)]
pub struct LedgerTx<'a> {
    ledger: &'a BatchLedger,
    working: BTreeMap<StockKey, StockLedger>,
    events: Vec<LedgerEvent>,
}

impl LedgerTx<'_> {
    fn working_mut(&mut self, key: StockKey) -> Result<&mut StockLedger, InventoryError> {
        self.working.get_mut(&key).ok_or_else(|| {
            InventoryError::InvariantViolation(format!("stock key {key} is not locked by this transaction"))
        })
    }

    fn execute(&mut self, key: StockKey, command: LedgerCommand) -> Result<Vec<LedgerEvent>, InventoryError> {
        let events = self.working_mut(key)?.execute(&command)?;
        self.events.extend(events.iter().cloned());
        Ok(events)
    }

    /// Insert a new batch and record an IN movement on commit.
    pub fn replenish(
        &mut self,
        key: StockKey,
        expiry_date: Option<NaiveDate>,
        unit_cost: Money,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> Result<BatchId, InventoryError> {
        let batch_id = self.ledger.next_batch_id();
        self.execute(
            key,
            LedgerCommand::ReceiveBatch(ReceiveBatch {
                key,
                batch_id,
                expiry_date,
                unit_cost,
                quantity,
                occurred_at,
            }),
        )?;
        Ok(batch_id)
    }

    /// Draw `quantity` in FIFO order and record an OUT movement on commit.
    pub fn consume_fifo(
        &mut self,
        key: StockKey,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> Result<Consumption, InventoryError> {
        let events = self.execute(
            key,
            LedgerCommand::ConsumeStock(ConsumeStock {
                key,
                quantity,
                occurred_at,
            }),
        )?;
        events
            .into_iter()
            .find_map(|e| match e {
                LedgerEvent::StockConsumed(c) => Some(Consumption {
                    cogs: c.cogs,
                    draws: c.draws,
                }),
                LedgerEvent::BatchReceived(_) => None,
            })
            .ok_or_else(|| InventoryError::InvariantViolation("consumption emitted no event".to_string()))
    }

    /// Available quantity for a locked key, including this transaction's changes.
    pub fn available(&self, key: StockKey) -> Option<i64> {
        self.working.get(&key).map(StockLedger::available)
    }
}

/// Thread-safe owner of every batch and every stock movement.
#[derive(Debug, Default)]
pub struct BatchLedger {
    ledgers: RwLock<HashMap<StockKey, Arc<Mutex<StockLedger>>>>,
    movements: Mutex<Vec<StockMovement>>,
    next_batch: AtomicU64,
    next_movement: AtomicU64,
}

impl BatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_batch_id(&self) -> BatchId {
        BatchId::from_raw(self.next_batch.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn next_movement_id(&self) -> MovementId {
        MovementId::from_raw(self.next_movement.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Get or create the per-key cells, in key order.
    fn cells(&self, keys: &[StockKey]) -> Result<Vec<Arc<Mutex<StockLedger>>>, InventoryError> {
        {
            let map = self.ledgers.read().map_err(|_| InventoryError::Poisoned("ledger index"))?;
            if let Some(cells) = keys.iter().map(|k| map.get(k).cloned()).collect::<Option<Vec<_>>>() {
                return Ok(cells);
            }
        }

        let mut map = self.ledgers.write().map_err(|_| InventoryError::Poisoned("ledger index"))?;
        Ok(keys
            .iter()
            .map(|k| {
                map.entry(*k)
                    .or_insert_with(|| Arc::new(Mutex::new(StockLedger::empty(*k))))
                    .clone()
            })
            .collect())
    }

    /// Existing per-key cells, optionally filtered, without creating any.
    fn existing_cells(
        &self,
        filter: impl Fn(&StockKey) -> bool,
    ) -> Result<Vec<(StockKey, Arc<Mutex<StockLedger>>)>, InventoryError> {
        let map = self.ledgers.read().map_err(|_| InventoryError::Poisoned("ledger index"))?;
        let mut cells: Vec<_> = map
            .iter()
            .filter(|(k, _)| filter(k))
            .map(|(k, cell)| (*k, cell.clone()))
            .collect();
        cells.sort_by_key(|(k, _)| *k);
        Ok(cells)
    }

    fn lock(cell: &Mutex<StockLedger>) -> Result<MutexGuard<'_, StockLedger>, InventoryError> {
        cell.lock().map_err(|_| InventoryError::Poisoned("stock key"))
    }

    /// Run `f` with exclusive access to `keys`; commit every change or none.
    pub fn atomically<T>(
        &self,
        keys: &[StockKey],
        f: impl FnOnce(&mut LedgerTx<'_>) -> Result<T, InventoryError>,
    ) -> Result<Committed<T>, InventoryError> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let cells = self.cells(&keys)?;
        let mut guards = Vec::with_capacity(cells.len());
        for cell in &cells {
            guards.push(Self::lock(cell)?);
        }

        let mut tx = LedgerTx {
            ledger: self,
            working: guards.iter().map(|g| (g.key(), (**g).clone())).collect(),
            events: Vec::new(),
        };

        // On error the working copies are dropped with `tx`; the guarded state is untouched.
        let value = f(&mut tx)?;

        let LedgerTx {
            mut working, events, ..
        } = tx;

        // Ids are assigned under the log lock so the log stays in id order.
        let mut log = self
            .movements
            .lock()
            .map_err(|_| InventoryError::Poisoned("movement log"))?;
        for guard in guards.iter_mut() {
            if let Some(updated) = working.remove(&guard.key()) {
                **guard = updated;
            }
        }
        let movements: Vec<StockMovement> = events
            .iter()
            .map(|e| e.movement(self.next_movement_id()))
            .collect();
        log.extend(movements.iter().cloned());
        drop(log);

        debug!(keys = keys.len(), movements = movements.len(), "ledger transaction committed");
        Ok(Committed { value, movements })
    }

    /// Add a batch for one key.
    pub fn replenish(
        &self,
        product_id: ProductId,
        branch_id: BranchId,
        expiry_date: Option<NaiveDate>,
        unit_cost: Money,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> Result<Replenishment, InventoryError> {
        let key = StockKey::new(product_id, branch_id);
        let committed = self.atomically(&[key], |tx| {
            tx.replenish(key, expiry_date, unit_cost, quantity, occurred_at)
        })?;
        let movement = single_movement(committed.movements)?;
        Ok(Replenishment {
            batch_id: committed.value,
            movement,
        })
    }

    /// Consume `quantity` from one key in FIFO order.
    pub fn consume_fifo(
        &self,
        product_id: ProductId,
        branch_id: BranchId,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> Result<ConsumptionRecord, InventoryError> {
        let key = StockKey::new(product_id, branch_id);
        let committed = self.atomically(&[key], |tx| tx.consume_fifo(key, quantity, occurred_at))?;
        let movement = single_movement(committed.movements)?;
        Ok(ConsumptionRecord {
            cogs: committed.value.cogs,
            draws: committed.value.draws,
            movement,
        })
    }

    /// Available quantity for one key (0 for a key never stocked).
    pub fn available(&self, key: StockKey) -> Result<i64, InventoryError> {
        let cells = self.existing_cells(|k| *k == key)?;
        let mut total = 0;
        for (_, cell) in &cells {
            total += Self::lock(cell)?.available();
        }
        Ok(total)
    }

    /// Available quantity of a product at one branch, or across all branches.
    pub fn available_for_product(
        &self,
        product_id: ProductId,
        branch_id: Option<BranchId>,
    ) -> Result<i64, InventoryError> {
        Ok(self.snapshot_where(|k| k.product_id == product_id && branch_id.is_none_or(|b| k.branch_id == b))?
            .available(product_id, branch_id))
    }

    /// Available quantity of a product per branch that ever stocked it.
    pub fn stock_by_branch(&self, product_id: ProductId) -> Result<BTreeMap<BranchId, i64>, InventoryError> {
        Ok(self
            .snapshot_where(|k| k.product_id == product_id)?
            .by_branch(product_id))
    }

    /// Quantity of a product in batches expiring on or before `cutoff`.
    pub fn expiring(
        &self,
        product_id: ProductId,
        branch_id: Option<BranchId>,
        cutoff: NaiveDate,
    ) -> Result<i64, InventoryError> {
        Ok(self
            .snapshot_where(|k| k.product_id == product_id)?
            .expiring(product_id, branch_id, cutoff))
    }

    /// Active batches expiring on or before `cutoff`, soonest first.
    pub fn expiring_batches(
        &self,
        cutoff: NaiveDate,
        branch_id: Option<BranchId>,
    ) -> Result<Vec<Batch>, InventoryError> {
        Ok(self.snapshot()?.expiring_batches(cutoff, branch_id))
    }

    /// All batches of one key (including exhausted ones), in receipt order.
    pub fn batches(&self, key: StockKey) -> Result<Vec<Batch>, InventoryError> {
        let mut out = Vec::new();
        for (_, cell) in self.existing_cells(|k| *k == key)? {
            out.extend(Self::lock(&cell)?.batches().iter().cloned());
        }
        Ok(out)
    }

    /// Movement log for a product, in commit order.
    pub fn movements_for(&self, product_id: ProductId) -> Result<Vec<StockMovement>, InventoryError> {
        let log = self
            .movements
            .lock()
            .map_err(|_| InventoryError::Poisoned("movement log"))?;
        Ok(log.iter().filter(|m| m.product_id == product_id).cloned().collect())
    }

    pub fn movement_count(&self) -> Result<usize, InventoryError> {
        Ok(self
            .movements
            .lock()
            .map_err(|_| InventoryError::Poisoned("movement log"))?
            .len())
    }

    /// Copy of every batch, taken key by key under each key's lock.
    pub fn snapshot(&self) -> Result<StockSnapshot, InventoryError> {
        self.snapshot_where(|_| true)
    }

    fn snapshot_where(&self, filter: impl Fn(&StockKey) -> bool) -> Result<StockSnapshot, InventoryError> {
        let mut batches = Vec::new();
        for (_, cell) in self.existing_cells(filter)? {
            batches.extend(Self::lock(&cell)?.batches().iter().cloned());
        }
        Ok(StockSnapshot::new(batches))
    }
}

fn single_movement(movements: Vec<StockMovement>) -> Result<StockMovement, InventoryError> {
    let mut iter = movements.into_iter();
    match (iter.next(), iter.next()) {
        (Some(m), None) => Ok(m),
        _ => Err(InventoryError::InvariantViolation(
            "expected exactly one movement per single-key mutation".to_string(),
        )),
    }
}
