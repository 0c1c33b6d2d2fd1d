//! Domain error model.

use thiserror::Error;

use crate::id::{BranchId, ProductId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// stock invariants, unknown references). Infrastructure concerns belong elsewhere.
///
/// None of these are retried automatically: stock and cost decisions must not be
/// silently repeated, so every variant is terminal for the request that raised it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input, empty request).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A quantity that must be strictly positive was zero or negative.
    #[error("invalid quantity {quantity}{}", product_suffix(.product_id))]
    InvalidQuantity {
        product_id: Option<ProductId>,
        quantity: i64,
    },

    /// A referenced entity (product, branch, ...) is unknown.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// FIFO selection cannot fully satisfy the requested quantity.
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

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A conflict occurred (e.g. duplicate id).
    #[error("conflict: {0}")]
    Conflict(String),
}

fn product_suffix(product_id: &Option<ProductId>) -> String {
    match product_id {
        Some(id) => format!(" for product {id}"),
        None => String::new(),
    }
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_quantity(quantity: i64) -> Self {
        Self::InvalidQuantity {
            product_id: None,
            quantity,
        }
    }

    pub fn invalid_line_quantity(product_id: ProductId, quantity: i64) -> Self {
        Self::InvalidQuantity {
            product_id: Some(product_id),
            quantity,
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn insufficient_stock(
        product_id: ProductId,
        branch_id: BranchId,
        requested: i64,
        available: i64,
    ) -> Self {
        Self::InsufficientStock {
            product_id,
            branch_id,
            requested,
            available,
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// True for failures caused by the shape of the request itself (checked before mutation).
    pub fn is_rejected_input(&self) -> bool {
        matches!(
            self,
            DomainError::Validation(_) | DomainError::InvalidQuantity { .. } | DomainError::InvalidId(_)
        )
    }
}
