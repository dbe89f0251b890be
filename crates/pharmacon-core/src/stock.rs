//! # Stock Rules
//!
//! Direction, unit conversion and movement values used by the stock
//! adjustment coordinator.
//!
//! ## Conversion
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Medicine "PARA-500"  base unit: tablet                                 │
//! │                                                                         │
//! │   unit      factor (base units per unit)                                │
//! │   tablet    1     (implicit, never stored)                              │
//! │   strip     10                                                          │
//! │   box       100                                                         │
//! │                                                                         │
//! │  Decrease 3 strip  ──►  delta = -(3 × 10) = -30 tablets                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The signed delta is applied at the storage boundary with one guarded
//! update, so nothing here reads or writes stored quantities.

use serde::{Deserialize, Serialize};

use crate::error::StockError;
use crate::types::{Medicine, Unit, UnitConversion};

// =============================================================================
// Direction
// =============================================================================

/// Whether a movement adds to or removes from stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockDirection {
    Increase,
    Decrease,
}

impl StockDirection {
    /// The opposite direction, used by compensations.
    pub fn inverse(self) -> Self {
        match self {
            StockDirection::Increase => StockDirection::Decrease,
            StockDirection::Decrease => StockDirection::Increase,
        }
    }

    /// `1.0` for increases, `-1.0` for decreases.
    pub fn sign(self) -> f64 {
        match self {
            StockDirection::Increase => 1.0,
            StockDirection::Decrease => -1.0,
        }
    }
}

// =============================================================================
// Movement
// =============================================================================

/// A quantity change of one medicine, expressed in a transaction unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub medicine_id: i64,
    pub unit_id: i64,
    pub quantity: f64,
    pub direction: StockDirection,
}

impl StockMovement {
    pub fn new(medicine_id: i64, unit_id: i64, quantity: f64, direction: StockDirection) -> Self {
        StockMovement {
            medicine_id,
            unit_id,
            quantity,
            direction,
        }
    }

    /// The movement that undoes this one.
    pub fn inverse(&self) -> Self {
        StockMovement {
            direction: self.direction.inverse(),
            ..self.clone()
        }
    }

    /// Signed change in base units for the given conversion factor.
    pub fn base_delta(&self, factor: f64) -> f64 {
        self.direction.sign() * to_base_quantity(self.quantity, factor)
    }
}

/// Converts a quantity in some unit to the medicine's base unit.
#[inline]
pub fn to_base_quantity(quantity: f64, factor: f64) -> f64 {
    quantity * factor
}

/// Resolves the base-unit factor of `unit` for `medicine`.
///
/// The base unit is always 1. Any other unit needs a stored conversion,
/// otherwise the movement cannot be expressed in stock terms.
pub fn resolve_factor(
    medicine: &Medicine,
    unit: &Unit,
    conversions: &[UnitConversion],
) -> Result<f64, StockError> {
    if unit.id == medicine.base_unit_id {
        return Ok(1.0);
    }

    conversions
        .iter()
        .find(|c| c.medicine_id == medicine.id && c.unit_id == unit.id)
        .map(|c| c.factor)
        .filter(|factor| factor.is_finite() && *factor > 0.0)
        .ok_or_else(|| StockError::UnitUnresolvable {
            medicine: medicine.barcode.clone(),
            unit: unit.name.clone(),
        })
}

/// Sums movements per (medicine, unit, direction) so one document touching
/// the same medicine twice adjusts it once per direction.
pub fn consolidate(movements: Vec<StockMovement>) -> Vec<StockMovement> {
    let mut merged: Vec<StockMovement> = Vec::with_capacity(movements.len());
    for movement in movements {
        match merged.iter_mut().find(|m| {
            m.medicine_id == movement.medicine_id
                && m.unit_id == movement.unit_id
                && m.direction == movement.direction
        }) {
            Some(existing) => existing.quantity += movement.quantity,
            None => merged.push(movement),
        }
    }
    merged
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn medicine() -> Medicine {
        Medicine {
            id: 7,
            barcode: "PARA-500".to_string(),
            name: "Paracetamol 500mg".to_string(),
            qty: 0.0,
            base_unit_id: 1,
            created_at: Utc::now(),
            last_modified: Utc::now(),
            last_modified_by_user_id: None,
        }
    }

    fn unit(id: i64, name: &str) -> Unit {
        Unit {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_base_unit_has_factor_one() {
        let factor = resolve_factor(&medicine(), &unit(1, "tablet"), &[]).unwrap();
        assert_eq!(factor, 1.0);
    }

    #[test]
    fn test_stored_conversion_is_used() {
        let conversions = vec![UnitConversion {
            medicine_id: 7,
            unit_id: 2,
            factor: 10.0,
        }];
        let factor = resolve_factor(&medicine(), &unit(2, "strip"), &conversions).unwrap();
        let movement = StockMovement::new(7, 2, 3.0, StockDirection::Decrease);
        assert_eq!(movement.base_delta(factor), -30.0);
    }

    #[test]
    fn test_missing_conversion_is_unresolvable() {
        let conversions = vec![UnitConversion {
            medicine_id: 99,
            unit_id: 2,
            factor: 10.0,
        }];
        let err = resolve_factor(&medicine(), &unit(2, "strip"), &conversions).unwrap_err();
        assert!(matches!(err, StockError::UnitUnresolvable { .. }));
    }

    #[test]
    fn test_inverse_round_trip_is_zero() {
        let movement = StockMovement::new(7, 1, 10.0, StockDirection::Increase);
        let net = movement.base_delta(1.0) + movement.inverse().base_delta(1.0);
        assert_eq!(net, 0.0);
        assert_eq!(movement.inverse().inverse(), movement);
    }

    #[test]
    fn test_consolidate_merges_same_line() {
        let merged = consolidate(vec![
            StockMovement::new(7, 1, 2.0, StockDirection::Decrease),
            StockMovement::new(8, 1, 1.0, StockDirection::Decrease),
            StockMovement::new(7, 1, 3.0, StockDirection::Decrease),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].quantity, 5.0);
    }
}
