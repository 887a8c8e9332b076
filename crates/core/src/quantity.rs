//! Quantity value object: an amount paired with its unit of measure.

use serde::{Deserialize, Serialize};

use crate::error::{TraceError, TraceResult};

/// An amount with a unit (`{"amount": 50.0, "unit": "kg"}` on the wire).
///
/// Immutable once created; compared by value. The core never converts
/// between units; whether `kg` and `jar` are comparable is a collaborator
/// concern. The only thing enforced here is shape: a finite, non-negative
/// amount and a non-empty unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    amount: f64,
    unit: String,
}

impl Quantity {
    pub fn new(amount: f64, unit: impl Into<String>) -> TraceResult<Self> {
        let unit = unit.into();
        if !amount.is_finite() {
            return Err(TraceError::validation("quantity amount must be finite"));
        }
        if amount < 0.0 {
            return Err(TraceError::validation("quantity amount cannot be negative"));
        }
        if unit.trim().is_empty() {
            return Err(TraceError::validation("quantity unit cannot be empty"));
        }
        Ok(Self { amount, unit })
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn same_unit(&self, other: &Quantity) -> bool {
        self.unit == other.unit
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.amount, self.unit)
    }
}
