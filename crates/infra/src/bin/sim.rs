//! Seeds a small store, replays a deterministic sales stream and prints the
//! recommendation report as JSON.
//!
//! Usage: `stockflow-sim [horizon_days]`

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use stockflow_ai::BranchScope;
use stockflow_core::{BranchId, Money, ProductId};
use stockflow_events::{EventBus, InMemoryEventBus};
use stockflow_infra::{
    BranchRef, InMemoryCatalog, InMemorySaleStore, InventoryError, InventoryService, ProductRef, RecommendationConfig,
    RecommendationQuery, RecommendationService, SalesHistoryProjection, BatchLedger,
};
use stockflow_purchasing::{PurchaseLine, ReceivePurchaseOrder};
use stockflow_sales::{RecordSale, SaleLineRequest, SaleRecorded};

const WINDOW_DAYS: u64 = 60;

struct SeedProduct {
    name: &'static str,
    sku: &'static str,
    price: Money,
    cost: Money,
    stock: i64,
    shelf_life_days: Option<u64>,
    /// Base units sold per day per branch.
    rate: i64,
}

const PRODUCTS: [SeedProduct; 4] = [
    SeedProduct {
        name: "Milk 1L",
        sku: "MLK-1L",
        price: Money::new(1, 20),
        cost: Money::new(0, 80),
        stock: 150,
        shelf_life_days: Some(75),
        rate: 3,
    },
    SeedProduct {
        name: "Bread",
        sku: "BRD-500",
        price: Money::new(0, 90),
        cost: Money::new(0, 40),
        stock: 60,
        shelf_life_days: Some(70),
        rate: 2,
    },
    SeedProduct {
        name: "Olive Oil",
        sku: "OIL-750",
        price: Money::new(8, 50),
        cost: Money::new(5, 0),
        stock: 200,
        shelf_life_days: Some(80),
        rate: 0,
    },
    SeedProduct {
        name: "Rice 5kg",
        sku: "RCE-5K",
        price: Money::new(6, 0),
        cost: Money::new(4, 10),
        stock: 40,
        shelf_life_days: None,
        rate: 1,
    },
];

fn day(start: NaiveDate, offset: u64) -> Result<NaiveDate> {
    start
        .checked_add_days(Days::new(offset))
        .with_context(|| format!("date out of range: {start} + {offset}"))
}

fn noon(date: NaiveDate) -> Result<DateTime<Utc>> {
    date.and_hms_opt(12, 0, 0)
        .map(|t| Utc.from_utc_datetime(&t))
        .context("invalid time of day")
}

fn main() -> Result<()> {
    stockflow_observability::init();

    let config = RecommendationConfig::from_env().context("loading recommendation config")?;
    let horizon_days = match std::env::args().nth(1) {
        Some(raw) => raw
            .parse::<i64>()
            .with_context(|| format!("horizon_days must be an integer, got {raw:?}"))?,
        None => 0,
    };

    let catalog = Arc::new(InMemoryCatalog::new());
    let ledger = Arc::new(BatchLedger::new());
    let bus: Arc<InMemoryEventBus<SaleRecorded>> = Arc::new(InMemoryEventBus::new());
    let history = Arc::new(SalesHistoryProjection::new());
    let subscription = bus.subscribe();
    let inventory = InventoryService::new(
        catalog.clone(),
        ledger.clone(),
        Arc::new(InMemorySaleStore::new()),
        bus.clone(),
    );

    let branches = [
        BranchId::from_uuid(Uuid::from_u128(0xb1)),
        BranchId::from_uuid(Uuid::from_u128(0xb2)),
    ];
    catalog.add_branch(BranchRef::new(branches[0], "Downtown"))?;
    catalog.add_branch(BranchRef::new(branches[1], "Harbour"))?;

    let product_ids: Vec<ProductId> = (0..PRODUCTS.len())
        .map(|i| ProductId::from_uuid(Uuid::from_u128(0x100 + i as u128)))
        .collect();
    for (id, seed) in product_ids.iter().zip(&PRODUCTS) {
        catalog.add_product(ProductRef::new(*id, seed.name, seed.sku))?;
    }

    let start = NaiveDate::from_ymd_opt(2025, 1, 1).context("invalid start date")?;
    let end = day(start, WINDOW_DAYS - 1)?;

    // The second branch gets a fifth of the stock, so cross-branch imbalance shows up.
    for (b, branch_id) in branches.iter().enumerate() {
        let mut lines = Vec::new();
        for (id, seed) in product_ids.iter().zip(&PRODUCTS) {
            let expiry_date = seed.shelf_life_days.map(|d| day(start, d)).transpose()?;
            lines.push(PurchaseLine {
                product_id: *id,
                quantity: if b == 0 { seed.stock } else { seed.stock / 5 },
                unit_cost: seed.cost,
                expiry_date,
            });
        }
        inventory.receive_purchase_order(ReceivePurchaseOrder {
            branch_id: *branch_id,
            lines,
            occurred_at: noon(start)?,
        })?;
    }

    let mut rejected = 0usize;
    for offset in 0..WINDOW_DAYS {
        let date = day(start, offset)?;
        for (b, branch_id) in branches.iter().enumerate() {
            let lines: Vec<SaleLineRequest> = product_ids
                .iter()
                .zip(&PRODUCTS)
                .enumerate()
                .filter_map(|(i, (id, seed))| {
                    let wobble = ((offset as i64) * 7 + (i as i64) * 3 + b as i64) % 4;
                    let quantity = (seed.rate + wobble - 1).max(0);
                    (seed.rate > 0 && quantity > 0).then(|| SaleLineRequest {
                        product_id: *id,
                        quantity,
                        unit_price: seed.price,
                    })
                })
                .collect();
            if lines.is_empty() {
                continue;
            }

            match inventory.record_sale(RecordSale {
                branch_id: *branch_id,
                lines,
                occurred_at: noon(date)?,
            }) {
                Ok(_) => {}
                Err(InventoryError::InsufficientStock { .. }) => rejected += 1,
                Err(e) => return Err(e).context("recording simulated sale"),
            }
        }
    }
    history.drain(&subscription)?;
    tracing::info!(rejected, "simulated sales replayed");

    let service = RecommendationService::new(catalog, ledger, history, config);
    let report = service.generate(
        RecommendationQuery::new(start, end, BranchScope::AllBranches).with_horizon_days(horizon_days),
    )?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
