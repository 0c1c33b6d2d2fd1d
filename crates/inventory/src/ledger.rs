use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{Aggregate, AggregateRoot, BatchId, DomainError, Money, MovementId};
use stockflow_events::Event;

use crate::batch::{Batch, StockKey};
use crate::movement::{MovementKind, StockMovement};

/// Aggregate root: all batches of one product at one branch.
///
/// Holds every batch ever received for the key, including exhausted ones.
/// Available stock is always derived from the batches, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLedger {
    key: StockKey,
    batches: Vec<Batch>,
    version: u64,
}

impl StockLedger {
    /// Create an empty ledger for `key` (no batches yet).
    pub fn empty(key: StockKey) -> Self {
        Self {
            key,
            batches: Vec::new(),
            version: 0,
        }
    }

    pub fn key(&self) -> StockKey {
        self.key
    }

    /// All batches in receipt order.
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Sum of remaining quantity over active batches.
    ///
    /// Receipts are rejected before the total can leave `i64`, so the
    /// saturation only matters for ledgers rebuilt from foreign events.
    pub fn available(&self) -> i64 {
        saturating_total(self.batches.iter().filter(|b| b.is_active()))
    }

    /// Remaining quantity in batches expiring on or before `cutoff`.
    pub fn expiring_by(&self, cutoff: NaiveDate) -> i64 {
        saturating_total(self.batches.iter().filter(|b| b.expires_by(cutoff)))
    }

    fn checked_available(&self) -> Option<i64> {
        self.batches
            .iter()
            .filter(|b| b.is_active())
            .try_fold(0i64, |acc, b| acc.checked_add(b.quantity))
    }

    /// Active batches in the order consumption draws from them.
    pub fn fifo_order(&self) -> Vec<&Batch> {
        let mut active: Vec<&Batch> = self.batches.iter().filter(|b| b.is_active()).collect();
        active.sort_by_key(|b| b.fifo_key());
        active
    }

    /// Walk the FIFO order and decide how much to take from each batch.
    ///
    /// Fails with `InsufficientStock` before planning anything if the active
    /// batches cannot cover `quantity`.
    pub fn plan_draws(&self, quantity: i64) -> Result<(Vec<BatchDraw>, Money), DomainError> {
        if quantity <= 0 {
            return Err(DomainError::invalid_line_quantity(self.key.product_id, quantity));
        }

        let available = self.available();
        if available < quantity {
            return Err(DomainError::insufficient_stock(
                self.key.product_id,
                self.key.branch_id,
                quantity,
                available,
            ));
        }

        let mut remaining = quantity;
        let mut cogs = Money::ZERO;
        let mut draws = Vec::new();

        for batch in self.fifo_order() {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(batch.quantity);
            let cost = batch
                .unit_cost
                .checked_times(take)
                .ok_or_else(|| DomainError::invariant("cogs overflow"))?;
            cogs = cogs
                .checked_add(cost)
                .ok_or_else(|| DomainError::invariant("cogs overflow"))?;
            draws.push(BatchDraw {
                batch_id: batch.id,
                quantity: take,
                unit_cost: batch.unit_cost,
                cost,
            });
            remaining -= take;
        }

        if remaining != 0 {
            return Err(DomainError::invariant("fifo walk ended with quantity left"));
        }

        Ok((draws, cogs))
    }
}

fn saturating_total<'a>(batches: impl Iterator<Item = &'a Batch>) -> i64 {
    batches.fold(0i64, |acc, b| acc.saturating_add(b.quantity))
}

impl AggregateRoot for StockLedger {
    type Id = StockKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ReceiveBatch (replenish).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveBatch {
    pub key: StockKey,
    pub batch_id: BatchId,
    pub expiry_date: Option<NaiveDate>,
    pub unit_cost: Money,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConsumeStock (FIFO draw).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeStock {
    pub key: StockKey,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    ReceiveBatch(ReceiveBatch),
    ConsumeStock(ConsumeStock),
}

/// Quantity taken from a single batch during a consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDraw {
    pub batch_id: BatchId,
    pub quantity: i64,
    pub unit_cost: Money,
    /// `quantity × unit_cost`.
    pub cost: Money,
}

/// Event: BatchReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReceived {
    pub key: StockKey,
    pub batch_id: BatchId,
    pub expiry_date: Option<NaiveDate>,
    pub unit_cost: Money,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockConsumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockConsumed {
    pub key: StockKey,
    pub quantity: i64,
    pub draws: Vec<BatchDraw>,
    pub cogs: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    BatchReceived(BatchReceived),
    StockConsumed(StockConsumed),
}

impl LedgerEvent {
    pub fn key(&self) -> StockKey {
        match self {
            LedgerEvent::BatchReceived(e) => e.key,
            LedgerEvent::StockConsumed(e) => e.key,
        }
    }

    /// The audit movement this mutation records.
    pub fn movement(&self, id: MovementId) -> StockMovement {
        let (kind, quantity) = match self {
            LedgerEvent::BatchReceived(e) => (MovementKind::In, e.quantity),
            LedgerEvent::StockConsumed(e) => (MovementKind::Out, e.quantity),
        };
        let key = self.key();
        StockMovement {
            id,
            product_id: key.product_id,
            branch_id: key.branch_id,
            kind,
            quantity,
            occurred_at: self.occurred_at(),
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::BatchReceived(_) => "inventory.batch.received",
            LedgerEvent::StockConsumed(_) => "inventory.stock.consumed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::BatchReceived(e) => e.occurred_at,
            LedgerEvent::StockConsumed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockLedger {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::BatchReceived(e) => {
                self.batches.push(Batch {
                    id: e.batch_id,
                    product_id: e.key.product_id,
                    branch_id: e.key.branch_id,
                    expiry_date: e.expiry_date,
                    unit_cost: e.unit_cost,
                    quantity: e.quantity,
                    created_at: e.occurred_at,
                });
            }
            LedgerEvent::StockConsumed(e) => {
                for draw in &e.draws {
                    if let Some(batch) = self.batches.iter_mut().find(|b| b.id == draw.batch_id) {
                        batch.quantity -= draw.quantity;
                    }
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LedgerCommand::ReceiveBatch(cmd) => self.handle_receive(cmd),
            LedgerCommand::ConsumeStock(cmd) => self.handle_consume(cmd),
        }
    }
}

impl StockLedger {
    fn ensure_key(&self, key: StockKey) -> Result<(), DomainError> {
        if self.key != key {
            return Err(DomainError::invariant(format!(
                "stock key mismatch: ledger {} got {}",
                self.key, key
            )));
        }
        Ok(())
    }

    fn handle_receive(&self, cmd: &ReceiveBatch) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_key(cmd.key)?;

        if cmd.quantity <= 0 {
            return Err(DomainError::invalid_line_quantity(cmd.key.product_id, cmd.quantity));
        }
        if self.batches.iter().any(|b| b.id == cmd.batch_id) {
            return Err(DomainError::conflict(format!("{} already received", cmd.batch_id)));
        }
        if self
            .checked_available()
            .and_then(|total| total.checked_add(cmd.quantity))
            .is_none()
        {
            return Err(DomainError::invariant(format!(
                "receiving {} units would overflow stock total for {}",
                cmd.quantity, self.key
            )));
        }

        Ok(vec![LedgerEvent::BatchReceived(BatchReceived {
            key: cmd.key,
            batch_id: cmd.batch_id,
            expiry_date: cmd.expiry_date,
            unit_cost: cmd.unit_cost,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_consume(&self, cmd: &ConsumeStock) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_key(cmd.key)?;

        let (draws, cogs) = self.plan_draws(cmd.quantity)?;

        Ok(vec![LedgerEvent::StockConsumed(StockConsumed {
            key: cmd.key,
            quantity: cmd.quantity,
            draws,
            cogs,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use stockflow_core::{BranchId, ProductId};

    fn test_key() -> StockKey {
        StockKey::new(ProductId::new(), BranchId::new())
    }

    fn test_time(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, minute, 0).unwrap()
    }

    fn receive(
        ledger: &mut StockLedger,
        id: u64,
        expiry: Option<NaiveDate>,
        unit_cost: Money,
        quantity: i64,
    ) {
        let cmd = LedgerCommand::ReceiveBatch(ReceiveBatch {
            key: ledger.key(),
            batch_id: BatchId::from_raw(id),
            expiry_date: expiry,
            unit_cost,
            quantity,
            occurred_at: test_time(id as u32 % 60),
        });
        ledger.execute(&cmd).unwrap();
    }

    fn consume(ledger: &StockLedger, quantity: i64) -> Result<Vec<LedgerEvent>, DomainError> {
        ledger.handle(&LedgerCommand::ConsumeStock(ConsumeStock {
            key: ledger.key(),
            quantity,
            occurred_at: test_time(59),
        }))
    }

    fn quantity_of(ledger: &StockLedger, id: u64) -> i64 {
        ledger
            .batches()
            .iter()
            .find(|b| b.id == BatchId::from_raw(id))
            .map(|b| b.quantity)
            .unwrap()
    }

    #[test]
    fn consumes_dated_batch_before_undated_one() {
        let mut ledger = StockLedger::empty(test_key());
        // Undated batch received first; the dated one must still go first.
        receive(&mut ledger, 1, None, Money::new(3, 0), 10);
        receive(&mut ledger, 2, NaiveDate::from_ymd_opt(2025, 1, 10), Money::new(2, 0), 5);

        let events = consume(&ledger, 7).unwrap();
        match &events[0] {
            LedgerEvent::StockConsumed(e) => {
                assert_eq!(e.cogs, Money::new(16, 0));
                assert_eq!(e.cogs.to_string(), "16.00");
                assert_eq!(e.draws.len(), 2);
                assert_eq!(e.draws[0].batch_id, BatchId::from_raw(2));
                assert_eq!(e.draws[0].quantity, 5);
                assert_eq!(e.draws[1].quantity, 2);
            }
            other => panic!("expected StockConsumed, got {other:?}"),
        }
        for e in &events {
            ledger.apply(e);
        }

        assert_eq!(quantity_of(&ledger, 2), 0);
        assert_eq!(quantity_of(&ledger, 1), 8);
        assert_eq!(ledger.available(), 8);
        // Exhausted batch stays as history.
        assert_eq!(ledger.batches().len(), 2);
        assert_eq!(ledger.version(), 3);
    }

    #[test]
    fn ties_on_expiry_and_time_break_by_batch_id() {
        let key = test_key();
        let mut ledger = StockLedger::empty(key);
        let expiry = NaiveDate::from_ymd_opt(2025, 6, 1);
        for (id, cost) in [(7u64, 5u64), (3, 1)] {
            ledger
                .execute(&LedgerCommand::ReceiveBatch(ReceiveBatch {
                    key,
                    batch_id: BatchId::from_raw(id),
                    expiry_date: expiry,
                    unit_cost: Money::new(cost, 0),
                    quantity: 2,
                    occurred_at: test_time(0),
                }))
                .unwrap();
        }

        let (draws, cogs) = ledger.plan_draws(3).unwrap();
        assert_eq!(draws[0].batch_id, BatchId::from_raw(3));
        assert_eq!(draws[1].batch_id, BatchId::from_raw(7));
        assert_eq!(cogs, Money::new(2 + 5, 0));
    }

    #[test]
    fn replenish_then_consume_same_quantity_empties_the_key() {
        let mut ledger = StockLedger::empty(test_key());
        receive(&mut ledger, 1, None, Money::from_minor(250), 4);

        let events = ledger
            .execute(&LedgerCommand::ConsumeStock(ConsumeStock {
                key: ledger.key(),
                quantity: 4,
                occurred_at: test_time(5),
            }))
            .unwrap();

        match &events[0] {
            LedgerEvent::StockConsumed(e) => assert_eq!(e.cogs, Money::from_minor(1000)),
            other => panic!("expected StockConsumed, got {other:?}"),
        }
        assert_eq!(ledger.available(), 0);
    }

    #[test]
    fn over_request_is_rejected_with_available_quantity() {
        let mut ledger = StockLedger::empty(test_key());
        receive(&mut ledger, 1, None, Money::new(1, 0), 3);
        let before = ledger.clone();

        let err = consume(&ledger, 5).unwrap_err();
        match err {
            DomainError::InsufficientStock {
                requested,
                available,
                product_id,
                ..
            } => {
                assert_eq!(requested, 5);
                assert_eq!(available, 3);
                assert_eq!(product_id, ledger.key().product_id);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(ledger, before);
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        let mut ledger = StockLedger::empty(test_key());
        receive(&mut ledger, 1, None, Money::new(1, 0), 3);

        assert!(matches!(
            consume(&ledger, 0).unwrap_err(),
            DomainError::InvalidQuantity { quantity: 0, .. }
        ));

        let err = ledger
            .handle(&LedgerCommand::ReceiveBatch(ReceiveBatch {
                key: ledger.key(),
                batch_id: BatchId::from_raw(2),
                expiry_date: None,
                unit_cost: Money::ZERO,
                quantity: -1,
                occurred_at: test_time(0),
            }))
            .unwrap_err();
        assert!(err.is_rejected_input());
    }

    #[test]
    fn duplicate_batch_id_is_a_conflict() {
        let mut ledger = StockLedger::empty(test_key());
        receive(&mut ledger, 1, None, Money::new(1, 0), 3);

        let err = ledger
            .handle(&LedgerCommand::ReceiveBatch(ReceiveBatch {
                key: ledger.key(),
                batch_id: BatchId::from_raw(1),
                expiry_date: None,
                unit_cost: Money::new(1, 0),
                quantity: 1,
                occurred_at: test_time(0),
            }))
            .unwrap_err();
        match err {
            DomainError::Conflict(msg) if msg.contains("batch-1") => {}
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn commands_for_another_key_are_rejected() {
        let ledger = StockLedger::empty(test_key());
        let err = ledger
            .handle(&LedgerCommand::ConsumeStock(ConsumeStock {
                key: test_key(),
                quantity: 1,
                occurred_at: test_time(0),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) if msg.contains("stock key mismatch") => {}
            other => panic!("expected invariant violation, got {other:?}"),
        }
    }

    #[test]
    fn receipt_that_would_overflow_the_total_is_rejected() {
        let mut ledger = StockLedger::empty(test_key());
        receive(&mut ledger, 1, None, Money::ZERO, i64::MAX);

        let err = ledger
            .handle(&LedgerCommand::ReceiveBatch(ReceiveBatch {
                key: ledger.key(),
                batch_id: BatchId::from_raw(2),
                expiry_date: None,
                unit_cost: Money::ZERO,
                quantity: i64::MAX,
                occurred_at: test_time(1),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) if msg.contains("overflow") => {}
            other => panic!("expected invariant violation, got {other:?}"),
        }

        assert_eq!(ledger.available(), i64::MAX);
        let (draws, _) = ledger.plan_draws(1).unwrap();
        assert_eq!(draws.len(), 1);
    }

    #[test]
    fn expiring_by_counts_only_dated_active_batches() {
        let mut ledger = StockLedger::empty(test_key());
        receive(&mut ledger, 1, NaiveDate::from_ymd_opt(2025, 1, 5), Money::new(1, 0), 4);
        receive(&mut ledger, 2, NaiveDate::from_ymd_opt(2025, 3, 1), Money::new(1, 0), 6);
        receive(&mut ledger, 3, None, Money::new(1, 0), 9);

        let cutoff = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert_eq!(ledger.expiring_by(cutoff), 4);
    }

    #[test]
    fn events_map_to_signed_movements() {
        let mut ledger = StockLedger::empty(test_key());
        receive(&mut ledger, 1, None, Money::new(1, 0), 3);
        let events = consume(&ledger, 2).unwrap();

        let movement = events[0].movement(MovementId::from_raw(10));
        assert_eq!(movement.kind, MovementKind::Out);
        assert_eq!(movement.quantity, 2);
        assert_eq!(movement.signed_quantity(), -2);
        assert_eq!(events[0].event_type(), "inventory.stock.consumed");
        assert_eq!(
            serde_json::to_value(movement.kind).unwrap(),
            serde_json::json!("OUT")
        );
    }

    fn batch_spec() -> impl Strategy<Value = (Option<u32>, u64, i64)> {
        (
            prop::option::of(0u32..90),
            0u64..10_000,
            1i64..50,
        )
    }

    fn ledger_from(specs: &[(Option<u32>, u64, i64)]) -> StockLedger {
        let mut ledger = StockLedger::empty(test_key());
        let base = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        for (i, (offset, cost, qty)) in specs.iter().enumerate() {
            let expiry = offset.map(|d| base + chrono::Days::new(u64::from(d)));
            receive(&mut ledger, i as u64 + 1, expiry, Money::from_minor(*cost), *qty);
        }
        ledger
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: a successful consumption removes exactly `qty` and its cogs is
        /// the sum of the per-batch draw costs.
        #[test]
        fn consumption_conserves_quantity_and_cost(
            specs in prop::collection::vec(batch_spec(), 1..8),
            pick in 1i64..400,
        ) {
            let mut ledger = ledger_from(&specs);
            let before = ledger.available();
            let qty = 1 + (pick - 1) % before;

            let events = ledger.execute(&LedgerCommand::ConsumeStock(ConsumeStock {
                key: ledger.key(),
                quantity: qty,
                occurred_at: test_time(59),
            })).unwrap();

            prop_assert_eq!(ledger.available(), before - qty);
            prop_assert!(ledger.batches().iter().all(|b| b.quantity >= 0));
            if let LedgerEvent::StockConsumed(e) = &events[0] {
                let drawn: i64 = e.draws.iter().map(|d| d.quantity).sum();
                let cost: Money = e.draws.iter().map(|d| d.cost).sum();
                prop_assert_eq!(drawn, qty);
                prop_assert_eq!(cost, e.cogs);
            } else {
                prop_assert!(false, "expected StockConsumed");
            }
        }

        /// Property: an over-request emits nothing and leaves every batch untouched.
        #[test]
        fn over_request_leaves_batches_unchanged(
            specs in prop::collection::vec(batch_spec(), 0..6),
            extra in 1i64..20,
        ) {
            let mut ledger = ledger_from(&specs);
            let before = ledger.clone();
            let qty = ledger.available() + extra;

            let result = ledger.execute(&LedgerCommand::ConsumeStock(ConsumeStock {
                key: ledger.key(),
                quantity: qty,
                occurred_at: test_time(59),
            }));

            let is_insufficient = matches!(result, Err(DomainError::InsufficientStock { .. }));
            prop_assert!(is_insufficient);
            prop_assert_eq!(ledger, before);
        }

        /// Property: draws follow expiry ascending, undated last.
        #[test]
        fn draws_follow_fifo_order(
            specs in prop::collection::vec(batch_spec(), 1..8),
        ) {
            let ledger = ledger_from(&specs);
            let (draws, _) = ledger.plan_draws(ledger.available()).unwrap();
            let keys: Vec<_> = draws
                .iter()
                .map(|d| {
                    ledger.batches().iter().find(|b| b.id == d.batch_id).unwrap().fifo_key()
                })
                .collect();
            prop_assert!(keys.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
