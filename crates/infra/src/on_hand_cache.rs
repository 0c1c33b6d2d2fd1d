use std::collections::HashMap;
use std::sync::RwLock;

use stockflow_core::ProductId;

use crate::error::InventoryError;

/// Cached total on-hand quantity per product.
///
/// Values are always recomputed from batches; writers invalidate the product after
/// commit, so a hit is never older than the last committed mutation. Every
/// invalidation bumps the product's generation, and a value computed across a
/// bump is returned to its caller but never stored.
#[derive(Debug, Default)]
pub struct OnHandCache {
    inner: RwLock<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    values: HashMap<ProductId, i64>,
    generations: HashMap<ProductId, u64>,
}

impl CacheState {
    fn generation(&self, product_id: ProductId) -> u64 {
        self.generations.get(&product_id).copied().unwrap_or(0)
    }
}

impl OnHandCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(
        &self,
        product_id: ProductId,
        compute: impl FnOnce() -> Result<i64, InventoryError>,
    ) -> Result<i64, InventoryError> {
        let generation = {
            let state = self.inner.read().map_err(|_| InventoryError::Poisoned("on-hand cache"))?;
            if let Some(v) = state.values.get(&product_id) {
                return Ok(*v);
            }
            state.generation(product_id)
        };

        let value = compute()?;

        let mut state = self.inner.write().map_err(|_| InventoryError::Poisoned("on-hand cache"))?;
        if state.generation(product_id) == generation {
            state.values.insert(product_id, value);
        } else {
            tracing::debug!(%product_id, "on-hand value invalidated during computation, not cached");
        }
        Ok(value)
    }

    pub fn invalidate(&self, product_id: ProductId) -> Result<(), InventoryError> {
        let mut state = self.inner.write().map_err(|_| InventoryError::Poisoned("on-hand cache"))?;
        state.values.remove(&product_id);
        let generation = state.generations.entry(product_id).or_insert(0);
        *generation = generation.wrapping_add(1);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|s| s.values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
