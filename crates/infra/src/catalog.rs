//! Product and branch catalog used to resolve sale and report references.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use stockflow_core::{BranchId, ProductId};

use crate::error::InventoryError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub category: Option<String>,
}

impl ProductRef {
    pub fn new(id: ProductId, name: impl Into<String>, sku: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            sku: sku.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    pub id: BranchId,
    pub name: String,
}

impl BranchRef {
    pub fn new(id: BranchId, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// Read access to products and branches.
pub trait Catalog: Send + Sync {
    fn product(&self, id: ProductId) -> Result<Option<ProductRef>, InventoryError>;
    fn has_branch(&self, id: BranchId) -> Result<bool, InventoryError>;
    /// Every product, in a stable order.
    fn products(&self) -> Result<Vec<ProductRef>, InventoryError>;
    fn branches(&self) -> Result<Vec<BranchRef>, InventoryError>;
}

impl<C> Catalog for Arc<C>
where
    C: Catalog + ?Sized,
{
    fn product(&self, id: ProductId) -> Result<Option<ProductRef>, InventoryError> {
        (**self).product(id)
    }

    fn has_branch(&self, id: BranchId) -> Result<bool, InventoryError> {
        (**self).has_branch(id)
    }

    fn products(&self) -> Result<Vec<ProductRef>, InventoryError> {
        (**self).products()
    }

    fn branches(&self) -> Result<Vec<BranchRef>, InventoryError> {
        (**self).branches()
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    products: BTreeMap<ProductId, ProductRef>,
    branches: BTreeMap<BranchId, BranchRef>,
}

/// In-memory catalog for tests, the simulator and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    inner: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a product.
    pub fn add_product(&self, product: ProductRef) -> Result<(), InventoryError> {
        let mut state = self.inner.write().map_err(|_| InventoryError::Poisoned("catalog"))?;
        state.products.insert(product.id, product);
        Ok(())
    }

    pub fn add_branch(&self, branch: BranchRef) -> Result<(), InventoryError> {
        let mut state = self.inner.write().map_err(|_| InventoryError::Poisoned("catalog"))?;
        state.branches.insert(branch.id, branch);
        Ok(())
    }
}

impl Catalog for InMemoryCatalog {
    fn product(&self, id: ProductId) -> Result<Option<ProductRef>, InventoryError> {
        let state = self.inner.read().map_err(|_| InventoryError::Poisoned("catalog"))?;
        Ok(state.products.get(&id).cloned())
    }

    fn has_branch(&self, id: BranchId) -> Result<bool, InventoryError> {
        let state = self.inner.read().map_err(|_| InventoryError::Poisoned("catalog"))?;
        Ok(state.branches.contains_key(&id))
    }

    fn products(&self) -> Result<Vec<ProductRef>, InventoryError> {
        let state = self.inner.read().map_err(|_| InventoryError::Poisoned("catalog"))?;
        Ok(state.products.values().cloned().collect())
    }

    fn branches(&self) -> Result<Vec<BranchRef>, InventoryError> {
        let state = self.inner.read().map_err(|_| InventoryError::Poisoned("catalog"))?;
        Ok(state.branches.values().cloned().collect())
    }
}
