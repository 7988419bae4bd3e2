//! # Quantity Model
//!
//! This module defines how an ingredient amount is represented and combined.
//! A quantity is a non-negative amount paired with a free-text unit token
//! ("g", "dl", "stk", or "" for count-less items).
//!
//! ## Known limitation
//!
//! Units are compared by exact, case-sensitive string equality. There is no
//! conversion table: "g" and "gram", or "dl" and "l", never merge.
//!
//! ## Usage
//!
//! ```rust
//! use menu_planner::quantity::{MergeOutcome, Quantity};
//!
//! let onions = Quantity::new(200.0, "g");
//! let more = Quantity::new(300.0, "g");
//! assert_eq!(onions.try_merge(&more), MergeOutcome::Merged(Quantity::new(500.0, "g")));
//!
//! let doubled = onions.scale(2.0).unwrap();
//! assert_eq!(doubled.amount, 400.0);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::AggregationError;

/// An amount of something, measured in a free-text unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    /// Amount in `unit`; must be finite
    pub amount: f64,

    /// Unit token, matched exactly
    #[serde(default)]
    pub unit: String,
}

/// Result of trying to combine two quantities
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// Units matched and the amounts were summed
    Merged(Quantity),
    /// Units differ; nothing could be summed
    Conflict,
}

impl Quantity {
    /// Create a quantity from an amount and unit
    pub fn new(amount: f64, unit: &str) -> Self {
        Self {
            amount,
            unit: unit.to_string(),
        }
    }

    /// Multiply the amount by `factor`, keeping the unit
    ///
    /// Fails with [`AggregationError::InvalidScaleFactor`] when the factor is
    /// negative, infinite or NaN, or when the scaled amount overflows.
    pub fn scale(&self, factor: f64) -> Result<Quantity, AggregationError> {
        if !factor.is_finite() || factor < 0.0 {
            return Err(AggregationError::InvalidScaleFactor(factor));
        }
        let amount = self.amount * factor;
        if !amount.is_finite() {
            return Err(AggregationError::InvalidScaleFactor(factor));
        }
        Ok(Quantity {
            amount,
            unit: self.unit.clone(),
        })
    }

    /// True iff both units are the same string
    pub fn same_unit(&self, other: &Quantity) -> bool {
        self.unit == other.unit
    }

    /// Sum two quantities sharing a unit
    pub fn try_merge(&self, other: &Quantity) -> MergeOutcome {
        if self.same_unit(other) {
            MergeOutcome::Merged(Quantity {
                amount: self.amount + other.amount,
                unit: self.unit.clone(),
            })
        } else {
            MergeOutcome::Conflict
        }
    }

    /// Whether the amount carries any shopping signal
    pub fn is_positive(&self) -> bool {
        self.amount > 0.0
    }
}

/// Maximum decimals tried before tiny amounts switch to scientific notation
const MAX_DECIMALS: usize = 10;

fn fixed_trimmed(amount: f64, decimals: usize) -> String {
    let fixed = format!("{amount:.decimals$}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Format an amount with at most two decimals and no trailing zeros
///
/// `1000.0` renders as `1000`, `0.5` as `0.5` and `1.0 / 3.0` as `0.33`.
/// Positive amounts never render as `0`: `0.004` keeps its digits.
pub fn format_amount(amount: f64) -> String {
    let formatted = fixed_trimmed(amount, 2);
    if formatted != "0" || amount <= 0.0 {
        return formatted;
    }
    (3..=MAX_DECIMALS)
        .map(|decimals| fixed_trimmed(amount, decimals))
        .find(|formatted| formatted != "0")
        .unwrap_or_else(|| format!("{amount:.1e}"))
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.is_empty() {
            write!(f, "{}", format_amount(self.amount))
        } else {
            write!(f, "{} {}", format_amount(self.amount), self.unit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_multiplies_amount() {
        let qty = Quantity::new(250.0, "g");
        let scaled = qty.scale(1.5).unwrap();
        assert_eq!(scaled.amount, 375.0);
        assert_eq!(scaled.unit, "g");
        // original untouched
        assert_eq!(qty.amount, 250.0);
    }

    #[test]
    fn test_scale_rejects_non_finite_factor() {
        let qty = Quantity::new(1.0, "stk");
        assert!(matches!(
            qty.scale(f64::INFINITY),
            Err(AggregationError::InvalidScaleFactor(_))
        ));
        assert!(matches!(
            qty.scale(f64::NAN),
            Err(AggregationError::InvalidScaleFactor(_))
        ));
        assert!(matches!(
            qty.scale(-1.0),
            Err(AggregationError::InvalidScaleFactor(_))
        ));
    }

    #[test]
    fn test_scale_by_zero_is_allowed() {
        let scaled = Quantity::new(3.0, "dl").scale(0.0).unwrap();
        assert_eq!(scaled.amount, 0.0);
        assert!(!scaled.is_positive());
    }

    #[test]
    fn test_same_unit_is_case_sensitive() {
        let a = Quantity::new(1.0, "g");
        assert!(a.same_unit(&Quantity::new(5.0, "g")));
        assert!(!a.same_unit(&Quantity::new(5.0, "G")));
        assert!(!a.same_unit(&Quantity::new(5.0, "gram")));
    }

    #[test]
    fn test_try_merge_conflict() {
        let a = Quantity::new(1.0, "stk");
        let b = Quantity::new(2.0, "dl");
        assert_eq!(a.try_merge(&b), MergeOutcome::Conflict);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1000.0), "1000");
        assert_eq!(format_amount(0.5), "0.5");
        assert_eq!(format_amount(1.0 / 3.0), "0.33");
        assert_eq!(format_amount(2.10), "2.1");
        assert_eq!(format_amount(0.0), "0");
    }

    #[test]
    fn test_format_tiny_positive_amount_is_not_zero() {
        assert_eq!(format_amount(0.004), "0.004");
        assert_eq!(format_amount(0.0001), "0.0001");
        assert_eq!(format_amount(1e-12), "1.0e-12");
    }

    #[test]
    fn test_scale_rejects_overflow() {
        let qty = Quantity::new(1e308, "g");
        assert_eq!(qty.scale(4.0), Err(AggregationError::InvalidScaleFactor(4.0)));
    }

    #[test]
    fn test_display_without_unit() {
        assert_eq!(Quantity::new(3.0, "").to_string(), "3");
        assert_eq!(Quantity::new(1.25, "kg").to_string(), "1.25 kg");
    }
}
