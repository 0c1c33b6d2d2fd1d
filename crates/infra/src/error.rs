use thiserror::Error;

use stockflow_ai::AiError;
use stockflow_core::{BranchId, DomainError, ProductId};

use crate::projections::ProjectionError;

/// Error surface of the inventory and recommendation services.
///
/// Domain failures are carried over one-to-one; the rest are infrastructure
/// failures such as poisoned locks or rejected forecast input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InventoryError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid quantity {quantity}")]
    InvalidQuantity {
        product_id: Option<ProductId>,
        quantity: i64,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(
        "insufficient stock for product {product_id} at branch {branch_id} \
         (requested: {requested}, available: {available})"
    )]
    InsufficientStock {
        product_id: ProductId,
        branch_id: BranchId,
        requested: i64,
        available: i64,
    },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// A lock guarding shared state was poisoned by a panicking writer.
    #[error("{0} lock poisoned")]
    Poisoned(&'static str),

    #[error(transparent)]
    Forecast(#[from] AiError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl InventoryError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<DomainError> for InventoryError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => InventoryError::Validation(msg),
            DomainError::InvalidId(msg) => InventoryError::Validation(msg),
            DomainError::InvalidQuantity {
                product_id,
                quantity,
            } => InventoryError::InvalidQuantity {
                product_id,
                quantity,
            },
            DomainError::NotFound { entity, id } => InventoryError::NotFound { entity, id },
            DomainError::InsufficientStock {
                product_id,
                branch_id,
                requested,
                available,
            } => InventoryError::InsufficientStock {
                product_id,
                branch_id,
                requested,
                available,
            },
            DomainError::InvariantViolation(msg) => InventoryError::InvariantViolation(msg),
            DomainError::Conflict(msg) => InventoryError::Conflict(msg),
        }
    }
}
