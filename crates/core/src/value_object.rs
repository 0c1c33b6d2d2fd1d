//! Value objects: equality by value, not identity.
//!
//! Value objects have **no identity**; two value objects with the same values are equal.
//! `Money` is the one every ledger path shares: unit costs, unit prices, COGS and totals.

use core::iter::Sum;
use core::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one, create
/// a new one with the new values.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Non-negative monetary amount in the smallest currency unit (e.g. cents).
///
/// Integer minor units keep COGS attribution exact: `usedQty × unitCost` sums never
/// accumulate rounding error, whatever order batches are drawn in.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    /// Amount in minor units (cents).
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Convenience constructor from major + minor parts, e.g. `Money::new(2, 50)` = 2.50.
    pub const fn new(major: u64, minor: u64) -> Self {
        Self(major * 100 + minor)
    }

    pub const fn minor_units(&self) -> u64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `self × quantity`, `None` on overflow or a negative quantity.
    pub fn checked_times(self, quantity: i64) -> Option<Money> {
        let qty = u64::try_from(quantity).ok()?;
        self.0.checked_mul(qty).map(Money)
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Difference as a signed amount (margins can be negative).
    pub fn signed_diff(self, other: Money) -> i128 {
        self.0 as i128 - other.0 as i128
    }

    /// Lossy conversion for reporting.
    pub fn as_major_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}
