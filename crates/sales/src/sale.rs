use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{BranchId, DomainError, DomainResult, Money, ProductId, SaleId};
use stockflow_events::Event;

/// One requested line of a sale: product, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Command: RecordSale.
///
/// Lines are processed in order. The whole sale commits or nothing does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSale {
    pub branch_id: BranchId,
    pub lines: Vec<SaleLineRequest>,
    pub occurred_at: DateTime<Utc>,
}

impl RecordSale {
    /// Shape checks that must pass before any stock is touched.
    pub fn validate(&self) -> DomainResult<()> {
        if self.lines.is_empty() {
            return Err(DomainError::validation("sale must have at least one line"));
        }
        for line in &self.lines {
            if line.quantity <= 0 {
                return Err(DomainError::invalid_line_quantity(line.product_id, line.quantity));
            }
        }
        Ok(())
    }

    /// Products in the sale, deduplicated, in first-seen order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            if !ids.contains(&line.product_id) {
                ids.push(line.product_id);
            }
        }
        ids
    }
}

/// A committed sale line. Immutable once the sale commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    /// Sum of `used quantity × unit cost` over the batches this line drew from.
    pub cogs_amount: Money,
}

impl SaleLine {
    /// `quantity × unit_price`, `None` on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_times(self.quantity)
    }
}

/// A committed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub branch_id: BranchId,
    pub total_amount: Money,
    pub lines: Vec<SaleLine>,
    pub occurred_at: DateTime<Utc>,
}

impl Sale {
    /// Build the sale record, accumulating line totals into `total_amount`.
    pub fn from_lines(
        id: SaleId,
        branch_id: BranchId,
        lines: Vec<SaleLine>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let total = Self::total_of(&lines)?;
        Ok(Self {
            id,
            branch_id,
            total_amount: total,
            lines,
            occurred_at,
        })
    }

    /// Sum of `quantity * unit_price` over `lines`; fails if it leaves `Money`'s range.
    pub fn total_of(lines: &[SaleLine]) -> DomainResult<Money> {
        lines.iter().try_fold(Money::ZERO, |total, line| {
            line.line_total()
                .and_then(|t| total.checked_add(t))
                .ok_or_else(|| DomainError::invariant("sale total overflow"))
        })
    }

    pub fn total_cogs(&self) -> Money {
        self.lines.iter().map(|l| l.cogs_amount).sum()
    }

    /// Revenue minus cost of goods sold, in minor units. Negative when sold below cost.
    pub fn gross_margin(&self) -> i128 {
        self.total_amount.signed_diff(self.total_cogs())
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// Event: SaleRecorded. Published after the sale and its stock draws commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecorded {
    pub sale: Sale,
}

impl Event for SaleRecorded {
    fn event_type(&self) -> &'static str {
        "sales.sale.recorded"
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.sale.occurred_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line(quantity: i64, price: u64, cogs: u64) -> SaleLine {
        SaleLine {
            product_id: ProductId::new(),
            quantity,
            unit_price: Money::from_minor(price),
            cogs_amount: Money::from_minor(cogs),
        }
    }

    fn request(quantities: &[i64]) -> RecordSale {
        RecordSale {
            branch_id: BranchId::new(),
            lines: quantities
                .iter()
                .map(|q| SaleLineRequest {
                    product_id: ProductId::new(),
                    quantity: *q,
                    unit_price: Money::new(1, 0),
                })
                .collect(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn empty_sale_is_rejected() {
        let err = request(&[]).validate().unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("at least one line") => {}
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn any_non_positive_line_rejects_the_sale() {
        let sale = request(&[2, 0, 5]);
        let err = sale.validate().unwrap_err();
        assert_eq!(
            err,
            DomainError::invalid_line_quantity(sale.lines[1].product_id, 0)
        );
        assert!(request(&[1, 3]).validate().is_ok());
    }

    #[test]
    fn product_ids_are_deduplicated_in_order() {
        let mut sale = request(&[1, 1]);
        let first = sale.lines[0].product_id;
        sale.lines.push(SaleLineRequest {
            product_id: first,
            quantity: 4,
            unit_price: Money::ZERO,
        });
        assert_eq!(sale.product_ids(), vec![first, sale.lines[1].product_id]);
    }

    #[test]
    fn totals_and_margin() {
        let sale = Sale::from_lines(
            SaleId::from_raw(1),
            BranchId::new(),
            vec![line(7, 400, 1600), line(1, 100, 250)],
            Utc::now(),
        )
        .unwrap();

        assert_eq!(sale.total_amount, Money::from_minor(2900));
        assert_eq!(sale.total_cogs(), Money::from_minor(1850));
        assert_eq!(sale.gross_margin(), 1050);
        assert_eq!(sale.total_quantity(), 8);

        let below_cost = Sale::from_lines(
            SaleId::from_raw(2),
            BranchId::new(),
            vec![line(1, 100, 300)],
            Utc::now(),
        )
        .unwrap();
        assert_eq!(below_cost.gross_margin(), -200);
    }

    #[test]
    fn overflowing_total_is_an_invariant_violation() {
        let err = Sale::from_lines(
            SaleId::from_raw(1),
            BranchId::new(),
            vec![line(2, u64::MAX, 0)],
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: the sale total equals the sum of quantity × unit price.
        #[test]
        fn total_is_sum_of_line_totals(
            lines in prop::collection::vec((1i64..100, 0u64..100_000), 1..10)
        ) {
            let sale_lines: Vec<SaleLine> = lines.iter().map(|(q, p)| line(*q, *p, 0)).collect();
            let expected: u64 = lines.iter().map(|(q, p)| *q as u64 * p).sum();

            let sale = Sale::from_lines(SaleId::from_raw(1), BranchId::new(), sale_lines, Utc::now()).unwrap();
            prop_assert_eq!(sale.total_amount.minor_units(), expected);
        }
    }
}
