use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use stockflow_core::{ProductId, SaleId};
use stockflow_sales::Sale;

use crate::error::InventoryError;

/// Append-only record of committed sales.
#[derive(Debug, Default)]
pub struct InMemorySaleStore {
    sales: RwLock<BTreeMap<SaleId, Sale>>,
    next_id: AtomicU64,
}

impl InMemorySaleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> SaleId {
        SaleId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn insert(&self, sale: Sale) -> Result<(), InventoryError> {
        let mut sales = self.sales.write().map_err(|_| InventoryError::Poisoned("sale store"))?;
        if sales.contains_key(&sale.id) {
            return Err(InventoryError::Conflict(format!("sale {} already recorded", sale.id)));
        }
        sales.insert(sale.id, sale);
        Ok(())
    }

    pub fn get(&self, id: SaleId) -> Result<Option<Sale>, InventoryError> {
        let sales = self.sales.read().map_err(|_| InventoryError::Poisoned("sale store"))?;
        Ok(sales.get(&id).cloned())
    }

    /// Sales containing a line for `product_id`, in id order.
    pub fn for_product(&self, product_id: ProductId) -> Result<Vec<Sale>, InventoryError> {
        let sales = self.sales.read().map_err(|_| InventoryError::Poisoned("sale store"))?;
        Ok(sales
            .values()
            .filter(|s| s.lines.iter().any(|l| l.product_id == product_id))
            .cloned()
            .collect())
    }

    /// Every committed sale, in id order.
    pub fn all(&self) -> Result<Vec<Sale>, InventoryError> {
        let sales = self.sales.read().map_err(|_| InventoryError::Poisoned("sale store"))?;
        Ok(sales.values().cloned().collect())
    }

    pub fn len(&self) -> Result<usize, InventoryError> {
        Ok(self.sales.read().map_err(|_| InventoryError::Poisoned("sale store"))?.len())
    }
}
