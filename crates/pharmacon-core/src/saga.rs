//! # Document Saga
//!
//! State machine and undo log for multi-step document writes.
//!
//! Creating a production or invoice touches several stores with no
//! enclosing transaction: header row, stock, item rows, PDF file. Each
//! completed step records the [`Compensation`] that undoes it. On failure
//! the log is replayed newest-first.
//!
//! ## Stages
//! ```text
//! Started ──► [PriorStockReversed] ──► HeaderWritten ──► StockApplied
//!                                                            │
//!          Committed ◄── DocumentRendered ◄── ItemsWritten ◄─┘
//!
//! any forward stage ──failure──► RollingBack ──► RolledBack
//!                                           └──► Inconsistent
//! ```
//!
//! Forward stages only move forward; any of them may be skipped
//! (`StockApplied` when the caller did not ask for a stock update,
//! `PriorStockReversed` outside modification).
//!
//! This module performs no I/O. The server's saga runner executes the
//! compensations and reports how many failed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::stock::StockMovement;
use crate::types::{DocumentKind, DocumentSnapshot};

// =============================================================================
// Stage
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStage {
    Started,
    /// Modification only: the old document's stock effect was undone.
    PriorStockReversed,
    HeaderWritten,
    StockApplied,
    ItemsWritten,
    DocumentRendered,
    Committed,
    RollingBack,
    RolledBack,
    /// A compensation failed. Needs manual reconciliation.
    Inconsistent,
}

impl SagaStage {
    /// Position along the forward path, `None` for rollback stages.
    fn rank(self) -> Option<u8> {
        match self {
            SagaStage::Started => Some(0),
            SagaStage::PriorStockReversed => Some(1),
            SagaStage::HeaderWritten => Some(2),
            SagaStage::StockApplied => Some(3),
            SagaStage::ItemsWritten => Some(4),
            SagaStage::DocumentRendered => Some(5),
            SagaStage::Committed => Some(6),
            SagaStage::RollingBack | SagaStage::RolledBack | SagaStage::Inconsistent => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SagaStage::Committed | SagaStage::RolledBack | SagaStage::Inconsistent
        )
    }
}

// =============================================================================
// Compensation
// =============================================================================

/// One recorded undo action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Compensation {
    /// Apply this movement (already inverted) to stock.
    ReverseStock(StockMovement),

    /// Hard-delete a header and its items.
    DeleteDocument { kind: DocumentKind, id: i64 },

    /// Rewrite a header and its items from a prior copy.
    RestoreDocument(Box<DocumentSnapshot>),

    /// Clear the soft-delete marker of a header.
    UndeleteDocument { kind: DocumentKind, id: i64 },

    /// Remove a rendered file.
    RemoveFile { path: String },
}

impl fmt::Display for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compensation::ReverseStock(m) => write!(
                f,
                "{:?} medicine {} by {} (unit {})",
                m.direction, m.medicine_id, m.quantity, m.unit_id
            ),
            Compensation::DeleteDocument { kind, id } => write!(f, "delete {} {}", kind, id),
            Compensation::RestoreDocument(snapshot) => {
                write!(f, "restore {} {}", snapshot.kind(), snapshot.id())
            }
            Compensation::UndeleteDocument { kind, id } => write!(f, "undelete {} {}", kind, id),
            Compensation::RemoveFile { path } => write!(f, "remove file {}", path),
        }
    }
}

// =============================================================================
// Saga
// =============================================================================

/// Progress and undo log of one document write.
#[derive(Debug, Clone)]
pub struct Saga {
    kind: DocumentKind,
    /// Human-facing document number, used in logs.
    reference: String,
    stage: SagaStage,
    undo_log: Vec<Compensation>,
}

impl Saga {
    pub fn new(kind: DocumentKind, reference: impl Into<String>) -> Self {
        Saga {
            kind,
            reference: reference.into(),
            stage: SagaStage::Started,
            undo_log: Vec::new(),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn stage(&self) -> SagaStage {
        self.stage
    }

    /// Compensations that a rollback would run, oldest first.
    pub fn pending(&self) -> &[Compensation] {
        &self.undo_log
    }

    /// Marks a forward stage as reached.
    ///
    /// ## Errors
    /// `InvalidTransition` when `next` is not strictly after the current
    /// stage, is a rollback stage, or the saga already finished.
    pub fn advance(&mut self, next: SagaStage) -> CoreResult<()> {
        let ordered = match (self.stage.rank(), next.rank()) {
            (Some(current), Some(target)) => target > current,
            _ => false,
        };
        if !ordered || self.stage.is_terminal() {
            return Err(CoreError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        self.stage = next;
        Ok(())
    }

    /// Records how to undo a step that just completed.
    pub fn record(&mut self, compensation: Compensation) {
        self.undo_log.push(compensation);
    }

    /// Finishes successfully. The undo log is discarded.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.advance(SagaStage::Committed)?;
        self.undo_log.clear();
        Ok(())
    }

    /// Enters `RollingBack` and hands out the undo log newest-first.
    ///
    /// ## Errors
    /// `InvalidTransition` if the saga already committed or settled.
    pub fn begin_rollback(&mut self) -> CoreResult<Vec<Compensation>> {
        if self.stage.is_terminal() || self.stage == SagaStage::RollingBack {
            return Err(CoreError::InvalidTransition {
                from: self.stage,
                to: SagaStage::RollingBack,
            });
        }
        self.stage = SagaStage::RollingBack;
        let mut steps = std::mem::take(&mut self.undo_log);
        steps.reverse();
        Ok(steps)
    }

    /// Lands a rollback: clean if no compensation failed.
    pub fn settle(&mut self, failed_compensations: usize) -> CoreResult<SagaStage> {
        if self.stage != SagaStage::RollingBack {
            let to = if failed_compensations == 0 {
                SagaStage::RolledBack
            } else {
                SagaStage::Inconsistent
            };
            return Err(CoreError::InvalidTransition {
                from: self.stage,
                to,
            });
        }
        self.stage = if failed_compensations == 0 {
            SagaStage::RolledBack
        } else {
            SagaStage::Inconsistent
        };
        Ok(self.stage)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::StockDirection;

    fn movement() -> StockMovement {
        StockMovement::new(1, 1, 10.0, StockDirection::Decrease)
    }

    #[test]
    fn test_forward_path_with_skips() {
        let mut saga = Saga::new(DocumentKind::Production, "42");
        saga.advance(SagaStage::HeaderWritten).unwrap();
        // No stock update requested: StockApplied skipped
        saga.advance(SagaStage::ItemsWritten).unwrap();
        saga.advance(SagaStage::DocumentRendered).unwrap();
        saga.commit().unwrap();
        assert_eq!(saga.stage(), SagaStage::Committed);
        assert!(saga.pending().is_empty());
    }

    #[test]
    fn test_backwards_transition_rejected() {
        let mut saga = Saga::new(DocumentKind::Invoice, "INV-1");
        saga.advance(SagaStage::StockApplied).unwrap();
        let err = saga.advance(SagaStage::HeaderWritten).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        assert!(saga.advance(SagaStage::StockApplied).is_err());
        assert!(saga.advance(SagaStage::RolledBack).is_err());
    }

    #[test]
    fn test_rollback_replays_newest_first() {
        let mut saga = Saga::new(DocumentKind::Production, "42");
        saga.record(Compensation::DeleteDocument {
            kind: DocumentKind::Production,
            id: 5,
        });
        saga.advance(SagaStage::HeaderWritten).unwrap();
        saga.record(Compensation::ReverseStock(movement()));
        saga.advance(SagaStage::StockApplied).unwrap();
        saga.record(Compensation::RemoveFile {
            path: "/tmp/42.pdf".to_string(),
        });

        let steps = saga.begin_rollback().unwrap();
        assert_eq!(saga.stage(), SagaStage::RollingBack);
        assert!(matches!(steps[0], Compensation::RemoveFile { .. }));
        assert!(matches!(steps[1], Compensation::ReverseStock(_)));
        assert!(matches!(steps[2], Compensation::DeleteDocument { id: 5, .. }));

        assert_eq!(saga.settle(0).unwrap(), SagaStage::RolledBack);
    }

    #[test]
    fn test_failed_compensation_is_inconsistent() {
        let mut saga = Saga::new(DocumentKind::PurchaseInvoice, "PO-7");
        saga.record(Compensation::UndeleteDocument {
            kind: DocumentKind::PurchaseInvoice,
            id: 2,
        });
        saga.begin_rollback().unwrap();
        assert_eq!(saga.settle(1).unwrap(), SagaStage::Inconsistent);
        assert!(saga.stage().is_terminal());
    }

    #[test]
    fn test_no_rollback_after_commit() {
        let mut saga = Saga::new(DocumentKind::Production, "1");
        saga.commit().unwrap();
        assert!(saga.begin_rollback().is_err());
        assert!(saga.settle(0).is_err());
    }

    #[test]
    fn test_compensation_display() {
        let c = Compensation::ReverseStock(movement());
        assert_eq!(c.to_string(), "Decrease medicine 1 by 10 (unit 1)");
        let c = Compensation::DeleteDocument {
            kind: DocumentKind::Invoice,
            id: 9,
        };
        assert_eq!(c.to_string(), "delete invoice 9");
    }
}
