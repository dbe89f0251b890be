//! # Stock Adjustment Coordinator
//!
//! Turns a [`StockMovement`] (quantity in some transaction unit) into one
//! guarded update of the medicine's base-unit quantity.
//!
//! ```text
//! movement ──► medicine + unit ──► factor ──► signed base delta
//!                                                   │
//!                      UPDATE ... WHERE qty + delta >= 0 RETURNING qty
//!                                                   │
//!                     applied ◄───────────┬─────────┴──────► rejected
//!                    (new qty)            │             Insufficient, qty unchanged
//! ```
//!
//! The read of medicine and conversions is only for resolving the factor;
//! the quantity itself is never read-modified-written here.

use tracing::{debug, info};

use pharmacon_core::stock::resolve_factor;
use pharmacon_core::validation::validate_quantity;
use pharmacon_core::{CoreError, StockError, StockMovement};
use pharmacon_db::{Database, StockUpdate};

use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct StockCoordinator {
    db: Database,
}

impl StockCoordinator {
    pub fn new(db: Database) -> Self {
        StockCoordinator { db }
    }

    /// Applies one movement and returns the new on-hand quantity.
    ///
    /// ## Errors
    /// * `NotFound` - medicine or unit missing
    /// * `StockError::UnitUnresolvable` - no conversion to the base unit
    /// * `StockError::Insufficient` - a decrease would go below zero
    pub async fn adjust(&self, movement: &StockMovement, actor: i64) -> Result<f64, ApiError> {
        validate_quantity("qty", movement.quantity)?;

        let medicine = self
            .db
            .medicines()
            .get_by_id(movement.medicine_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Medicine", movement.medicine_id.to_string()))?;

        let unit = self
            .db
            .units()
            .get_by_id(movement.unit_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Unit", movement.unit_id.to_string()))?;

        let conversions = self.db.medicines().conversions(medicine.id).await?;
        let factor = resolve_factor(&medicine, &unit, &conversions)?;
        let delta = movement.base_delta(factor);

        debug!(
            barcode = %medicine.barcode,
            unit = %unit.name,
            qty = movement.quantity,
            factor,
            delta,
            "Adjusting stock"
        );

        match self.db.medicines().apply_delta(medicine.id, delta, actor).await? {
            StockUpdate::Applied { qty } => {
                info!(barcode = %medicine.barcode, delta, qty, "Stock adjusted");
                Ok(qty)
            }
            StockUpdate::Rejected { available } => Err(StockError::Insufficient {
                medicine: medicine.barcode,
                available,
                requested: delta.abs(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use pharmacon_core::{Medicine, StockDirection, Unit};
    use pharmacon_db::DbConfig;

    async fn setup(qty: f64) -> (StockCoordinator, Database, Medicine, Unit, Unit) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tablet = db.units().get_or_create("tablet").await.unwrap();
        let strip = db.units().get_or_create("strip").await.unwrap();
        let medicine = db
            .medicines()
            .insert("PARA-500", "Paracetamol 500mg", qty, tablet.id, None)
            .await
            .unwrap();
        db.medicines().set_conversion(medicine.id, strip.id, 10.0).await.unwrap();
        (StockCoordinator::new(db.clone()), db, medicine, tablet, strip)
    }

    #[tokio::test]
    async fn test_decrease_below_zero_is_refused() {
        let (stock, db, medicine, tablet, _) = setup(5.0).await;
        let movement = StockMovement::new(medicine.id, tablet.id, 10.0, StockDirection::Decrease);

        let err = stock.adjust(&movement, 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::StockError);
        assert!(err.message.contains("available 5"));
        assert_eq!(db.medicines().quantity(medicine.id).await.unwrap(), Some(5.0));
    }

    #[tokio::test]
    async fn test_increase_then_decrease_restores_quantity() {
        let (stock, _db, medicine, tablet, _) = setup(20.0).await;
        let movement = StockMovement::new(medicine.id, tablet.id, 7.5, StockDirection::Increase);

        assert_eq!(stock.adjust(&movement, 1).await.unwrap(), 27.5);
        assert_eq!(stock.adjust(&movement.inverse(), 1).await.unwrap(), 20.0);
    }

    #[tokio::test]
    async fn test_conversion_factor_is_applied() {
        let (stock, _db, medicine, _, strip) = setup(100.0).await;
        let movement = StockMovement::new(medicine.id, strip.id, 3.0, StockDirection::Decrease);
        assert_eq!(stock.adjust(&movement, 1).await.unwrap(), 70.0);
    }

    #[tokio::test]
    async fn test_unknown_conversion_is_unresolvable() {
        let (stock, db, medicine, _, _) = setup(100.0).await;
        let bottle = db.units().get_or_create("bottle").await.unwrap();
        let movement = StockMovement::new(medicine.id, bottle.id, 1.0, StockDirection::Increase);

        let err = stock.adjust(&movement, 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::StockError);
        assert!(err.message.contains("bottle"));
    }

    #[tokio::test]
    async fn test_exact_stock_can_be_emptied() {
        let (stock, _db, medicine, tablet, _) = setup(4.0).await;
        let movement = StockMovement::new(medicine.id, tablet.id, 4.0, StockDirection::Decrease);
        assert_eq!(stock.adjust(&movement, 1).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_non_positive_quantity_is_invalid() {
        let (stock, _db, medicine, tablet, _) = setup(4.0).await;
        let movement = StockMovement::new(medicine.id, tablet.id, 0.0, StockDirection::Increase);
        let err = stock.adjust(&movement, 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_missing_medicine_is_not_found() {
        let (stock, _db, _, tablet, _) = setup(4.0).await;
        let movement = StockMovement::new(999, tablet.id, 1.0, StockDirection::Increase);
        let err = stock.adjust(&movement, 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
