//! Sale and purchase transactions over the batch ledger.
//!
//! ```text
//! request
//!   ↓ validate (empty / non-positive quantity → rejected, nothing locked)
//!   ↓ resolve branch + products in the catalog (unknown → NotFound)
//!   ↓ BatchLedger::atomically(keys of every line)
//!   │     consume/replenish line by line on working copies
//!   │     any failure → whole request rolled back
//!   ↓ commit: sale stored, on-hand cache invalidated
//!   ↓ publish SaleRecorded (failure is logged, the sale stands)
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use stockflow_core::{BranchId, ProductId};
use stockflow_events::EventBus;
use stockflow_inventory::StockKey;
use stockflow_purchasing::{PurchaseReceipt, ReceivePurchase, ReceivePurchaseOrder};
use stockflow_sales::{RecordSale, Sale, SaleLine, SaleRecorded};

use crate::catalog::Catalog;
use crate::error::InventoryError;
use crate::ledger::{BatchLedger, ConsumptionRecord};
use crate::on_hand_cache::OnHandCache;
use crate::sales_store::InMemorySaleStore;

pub struct InventoryService<C, B>
where
    C: Catalog,
    B: EventBus<SaleRecorded>,
{
    catalog: C,
    ledger: Arc<BatchLedger>,
    sales: Arc<InMemorySaleStore>,
    on_hand: OnHandCache,
    bus: B,
}

impl<C, B> InventoryService<C, B>
where
    C: Catalog,
    B: EventBus<SaleRecorded>,
{
    pub fn new(catalog: C, ledger: Arc<BatchLedger>, sales: Arc<InMemorySaleStore>, bus: B) -> Self {
        Self {
            catalog,
            ledger,
            sales,
            on_hand: OnHandCache::new(),
            bus,
        }
    }

    pub fn ledger(&self) -> &Arc<BatchLedger> {
        &self.ledger
    }

    pub fn sales(&self) -> &Arc<InMemorySaleStore> {
        &self.sales
    }

    fn ensure_branch(&self, branch_id: BranchId) -> Result<(), InventoryError> {
        if self.catalog.has_branch(branch_id)? {
            Ok(())
        } else {
            Err(InventoryError::not_found("Branch", branch_id))
        }
    }

    fn ensure_products(&self, product_ids: impl IntoIterator<Item = ProductId>) -> Result<(), InventoryError> {
        for product_id in product_ids {
            if self.catalog.product(product_id)?.is_none() {
                return Err(InventoryError::not_found("Product", product_id));
            }
        }
        Ok(())
    }

    fn invalidate(&self, product_ids: impl IntoIterator<Item = ProductId>) -> Result<(), InventoryError> {
        for product_id in product_ids {
            self.on_hand.invalidate(product_id)?;
        }
        Ok(())
    }

    /// Record a multi-line sale. Either every line is drawn from stock or none is.
    pub fn record_sale(&self, request: RecordSale) -> Result<Sale, InventoryError> {
        request.validate()?;
        self.ensure_branch(request.branch_id)?;
        let product_ids = request.product_ids();
        self.ensure_products(product_ids.iter().copied())?;

        let branch_id = request.branch_id;
        let keys: Vec<StockKey> = product_ids.iter().map(|p| StockKey::new(*p, branch_id)).collect();

        let committed = self
            .ledger
            .atomically(&keys, |tx| {
                let mut lines = Vec::with_capacity(request.lines.len());
                for line in &request.lines {
                    let consumption =
                        tx.consume_fifo(StockKey::new(line.product_id, branch_id), line.quantity, request.occurred_at)?;
                    lines.push(SaleLine {
                        product_id: line.product_id,
                        quantity: line.quantity,
                        unit_price: line.unit_price,
                        cogs_amount: consumption.cogs,
                    });
                }
                // Reject an overflowing total here so the draws roll back.
                Sale::total_of(&lines)?;
                Ok(lines)
            })
            .inspect_err(|e| {
                if let InventoryError::InsufficientStock {
                    product_id,
                    requested,
                    available,
                    ..
                } = e
                {
                    warn!(
                        branch = %branch_id,
                        product = %product_id,
                        requested,
                        available,
                        "sale rejected: insufficient stock"
                    );
                }
            })?;

        // Ids are taken only for committed sales, so the sequence has no gaps.
        let sale = Sale::from_lines(self.sales.next_id(), branch_id, committed.value, request.occurred_at)?;
        self.sales.insert(sale.clone())?;
        self.invalidate(product_ids)?;

        info!(
            sale_id = %sale.id,
            branch = %branch_id,
            lines = sale.lines.len(),
            total = %sale.total_amount,
            cogs = %sale.total_cogs(),
            "sale recorded"
        );

        // The sale stands; SalesHistoryProjection::rebuild_from recovers it from the store.
        if let Err(e) = self.bus.publish(SaleRecorded { sale: sale.clone() }) {
            warn!(sale_id = %sale.id, error = ?e, "failed to publish sale");
        }
        Ok(sale)
    }

    /// Receive one delivered line as a new batch.
    pub fn receive_purchase(&self, command: ReceivePurchase) -> Result<PurchaseReceipt, InventoryError> {
        command.validate()?;
        let branch_id = command.branch_id;
        let occurred_at = command.occurred_at;
        let mut receipts = self.receive(branch_id, vec![command], occurred_at)?;
        receipts
            .pop()
            .ok_or_else(|| InventoryError::InvariantViolation("purchase produced no receipt".to_string()))
    }

    /// Receive every line of an order atomically, one batch per line.
    pub fn receive_purchase_order(&self, order: ReceivePurchaseOrder) -> Result<Vec<PurchaseReceipt>, InventoryError> {
        order.validate()?;
        self.receive(order.branch_id, order.receipts(), order.occurred_at)
    }

    fn receive(
        &self,
        branch_id: BranchId,
        lines: Vec<ReceivePurchase>,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<PurchaseReceipt>, InventoryError> {
        self.ensure_branch(branch_id)?;
        self.ensure_products(lines.iter().map(|l| l.product_id))?;

        let keys: Vec<StockKey> = lines.iter().map(|l| StockKey::new(l.product_id, branch_id)).collect();
        let committed = self.ledger.atomically(&keys, |tx| {
            lines
                .iter()
                .map(|line| {
                    let batch_id = tx.replenish(
                        StockKey::new(line.product_id, branch_id),
                        line.expiry_date,
                        line.unit_cost,
                        line.quantity,
                        occurred_at,
                    )?;
                    Ok(PurchaseReceipt {
                        batch_id,
                        product_id: line.product_id,
                        branch_id,
                        quantity: line.quantity,
                        unit_cost: line.unit_cost,
                        expiry_date: line.expiry_date,
                        received_at: occurred_at,
                    })
                })
                .collect::<Result<Vec<_>, InventoryError>>()
        })?;

        self.invalidate(lines.iter().map(|l| l.product_id))?;
        for receipt in &committed.value {
            info!(
                batch = %receipt.batch_id,
                product = %receipt.product_id,
                branch = %branch_id,
                quantity = receipt.quantity,
                unit_cost = %receipt.unit_cost,
                "purchase received"
            );
        }
        Ok(committed.value)
    }

    /// Single-key FIFO consumption outside a sale (write-offs, transfers out).
    pub fn consume_fifo(
        &self,
        product_id: ProductId,
        branch_id: BranchId,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> Result<ConsumptionRecord, InventoryError> {
        let record = self.ledger.consume_fifo(product_id, branch_id, quantity, occurred_at)?;
        self.on_hand.invalidate(product_id)?;
        Ok(record)
    }

    /// Total on-hand quantity across branches, served from the cache when fresh.
    pub fn on_hand(&self, product_id: ProductId) -> Result<i64, InventoryError> {
        self.on_hand
            .get_or_compute(product_id, || self.ledger.available_for_product(product_id, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use stockflow_core::{Money, SaleId};
    use stockflow_events::InMemoryEventBus;
    use stockflow_purchasing::PurchaseLine;
    use stockflow_sales::SaleLineRequest;

    use crate::catalog::{BranchRef, InMemoryCatalog, ProductRef};

    type Service = InventoryService<Arc<InMemoryCatalog>, Arc<InMemoryEventBus<SaleRecorded>>>;

    struct Fixture {
        service: Service,
        bus: Arc<InMemoryEventBus<SaleRecorded>>,
        branch: BranchId,
        milk: ProductId,
        bread: ProductId,
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, hour, 0, 0).unwrap()
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(InMemoryCatalog::new());
        let branch = BranchId::new();
        let (milk, bread) = (ProductId::new(), ProductId::new());
        catalog.add_branch(BranchRef::new(branch, "Central")).unwrap();
        catalog.add_product(ProductRef::new(milk, "Milk", "MLK")).unwrap();
        catalog.add_product(ProductRef::new(bread, "Bread", "BRD")).unwrap();
        let bus = Arc::new(InMemoryEventBus::new());
        let service = InventoryService::new(
            catalog,
            Arc::new(BatchLedger::new()),
            Arc::new(InMemorySaleStore::new()),
            bus.clone(),
        );
        Fixture {
            service,
            bus,
            branch,
            milk,
            bread,
        }
    }

    fn purchase(f: &Fixture, product_id: ProductId, quantity: i64, cost: u64, expiry: Option<NaiveDate>) -> PurchaseReceipt {
        f.service
            .receive_purchase(ReceivePurchase {
                product_id,
                branch_id: f.branch,
                quantity,
                unit_cost: Money::new(cost, 0),
                expiry_date: expiry,
                occurred_at: at(8),
            })
            .unwrap()
    }

    fn sale(f: &Fixture, lines: &[(ProductId, i64, u64)]) -> RecordSale {
        RecordSale {
            branch_id: f.branch,
            lines: lines
                .iter()
                .map(|(p, q, price)| SaleLineRequest {
                    product_id: *p,
                    quantity: *q,
                    unit_price: Money::new(*price, 0),
                })
                .collect(),
            occurred_at: at(12),
        }
    }

    #[test]
    fn sale_totals_and_cogs() {
        let f = fixture();
        purchase(&f, f.milk, 5, 2, NaiveDate::from_ymd_opt(2025, 1, 10));
        purchase(&f, f.milk, 10, 3, None);
        purchase(&f, f.bread, 4, 1, None);
        let sub = f.bus.subscribe();

        let recorded = f
            .service
            .record_sale(sale(&f, &[(f.milk, 7, 4), (f.bread, 2, 2)]))
            .unwrap();

        assert_eq!(recorded.id, SaleId::from_raw(1));
        assert_eq!(recorded.total_amount, Money::new(32, 0));
        assert_eq!(recorded.lines[0].cogs_amount, Money::new(16, 0));
        assert_eq!(recorded.lines[1].cogs_amount, Money::new(2, 0));
        assert_eq!(f.service.on_hand(f.milk).unwrap(), 8);
        assert_eq!(sub.drain(), vec![SaleRecorded { sale: recorded.clone() }]);
        assert_eq!(f.service.sales().get(recorded.id).unwrap(), Some(recorded));
    }

    #[test]
    fn failing_line_rolls_back_the_whole_sale() {
        let f = fixture();
        purchase(&f, f.milk, 5, 2, None);
        purchase(&f, f.bread, 1, 1, None);
        let sub = f.bus.subscribe();
        let movements = f.service.ledger().movement_count().unwrap();

        let err = f
            .service
            .record_sale(sale(&f, &[(f.milk, 3, 4), (f.bread, 2, 2)]))
            .unwrap_err();

        match err {
            InventoryError::InsufficientStock {
                product_id,
                requested,
                available,
                ..
            } => {
                assert_eq!(product_id, f.bread);
                assert_eq!((requested, available), (2, 1));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(f.service.on_hand(f.milk).unwrap(), 5);
        assert_eq!(f.service.ledger().movement_count().unwrap(), movements);
        assert_eq!(f.service.sales().len().unwrap(), 0);
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn rolled_back_sales_do_not_take_an_id() {
        let f = fixture();
        purchase(&f, f.milk, 2, 1, None);

        assert!(f.service.record_sale(sale(&f, &[(f.milk, 3, 1)])).is_err());
        assert!(f.service.record_sale(sale(&f, &[(f.milk, 5, 1)])).is_err());

        let first = f.service.record_sale(sale(&f, &[(f.milk, 1, 1)])).unwrap();
        let second = f.service.record_sale(sale(&f, &[(f.milk, 1, 1)])).unwrap();
        assert_eq!(first.id, SaleId::from_raw(1));
        assert_eq!(second.id, SaleId::from_raw(2));
    }

    #[test]
    fn requests_are_rejected_before_any_lookup() {
        let f = fixture();
        let err = f.service.record_sale(sale(&f, &[])).unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));

        let err = f.service.record_sale(sale(&f, &[(f.milk, 0, 1)])).unwrap_err();
        assert!(matches!(err, InventoryError::InvalidQuantity { quantity: 0, .. }));
    }

    #[test]
    fn unknown_references_are_not_found() {
        let f = fixture();
        let ghost = ProductId::new();
        let err = f.service.record_sale(sale(&f, &[(ghost, 1, 1)])).unwrap_err();
        assert!(matches!(err, InventoryError::NotFound { entity: "Product", .. }));

        let mut request = sale(&f, &[(f.milk, 1, 1)]);
        request.branch_id = BranchId::new();
        let err = f.service.record_sale(request).unwrap_err();
        assert!(matches!(err, InventoryError::NotFound { entity: "Branch", .. }));

        let err = f
            .service
            .receive_purchase(ReceivePurchase {
                product_id: ghost,
                branch_id: f.branch,
                quantity: 1,
                unit_cost: Money::ZERO,
                expiry_date: None,
                occurred_at: at(8),
            })
            .unwrap_err();
        assert!(matches!(err, InventoryError::NotFound { entity: "Product", .. }));
    }

    #[test]
    fn purchase_order_is_all_or_nothing() {
        let f = fixture();
        let order = |lines: Vec<PurchaseLine>| ReceivePurchaseOrder {
            branch_id: f.branch,
            lines,
            occurred_at: at(8),
        };
        let line = |product_id, quantity| PurchaseLine {
            product_id,
            quantity,
            unit_cost: Money::new(1, 50),
            expiry_date: None,
        };

        let err = f
            .service
            .receive_purchase_order(order(vec![line(f.milk, 3), line(ProductId::new(), 2)]))
            .unwrap_err();
        assert!(matches!(err, InventoryError::NotFound { .. }));
        assert_eq!(f.service.on_hand(f.milk).unwrap(), 0);

        let receipts = f
            .service
            .receive_purchase_order(order(vec![line(f.milk, 3), line(f.bread, 2)]))
            .unwrap();
        assert_eq!(receipts.len(), 2);
        assert_ne!(receipts[0].batch_id, receipts[1].batch_id);
        assert_eq!(receipts[0].total_cost(), Some(Money::new(4, 50)));
        assert_eq!(f.service.on_hand(f.milk).unwrap(), 3);
        assert_eq!(f.service.ledger().movements_for(f.bread).unwrap().len(), 1);
    }

    #[test]
    fn on_hand_cache_follows_writes() {
        let f = fixture();
        purchase(&f, f.milk, 4, 1, None);
        assert_eq!(f.service.on_hand(f.milk).unwrap(), 4);
        purchase(&f, f.milk, 6, 1, None);
        assert_eq!(f.service.on_hand(f.milk).unwrap(), 10);
        f.service.consume_fifo(f.milk, f.branch, 9, at(13)).unwrap();
        assert_eq!(f.service.on_hand(f.milk).unwrap(), 1);
    }
}
