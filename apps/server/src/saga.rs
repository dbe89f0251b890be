//! # Saga Runner
//!
//! Executes the I/O side of a [`Saga`]: applies stock movements and
//! renders files while recording how to undo them, and replays the undo
//! log when a later step fails.
//!
//! ```text
//! step ok ──► saga.record(undo) ──► saga.advance(stage)
//!
//! step failed ──► rollback:
//!     for undo in log (newest first):
//!         run it; on failure log error! and keep going
//!     all ok  ──► RolledBack,   respond with the original error
//!     any bad ──► Inconsistent, respond 500 naming the original error
//! ```
//!
//! Steps are not wrapped in a database transaction; the undo log is the
//! only thing that brings the stores back in step.

use std::sync::Arc;

use tracing::{error, info, warn};

use pharmacon_core::stock::consolidate;
use pharmacon_core::{Compensation, DocumentKind, DocumentSnapshot, Saga, SagaStage, StockMovement};
use pharmacon_db::Database;

use crate::document::{remove_blocking, render_blocking, DocumentRenderer, PrintableDocument};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::stock::StockCoordinator;

#[derive(Clone)]
pub struct SagaRunner {
    db: Database,
    stock: StockCoordinator,
    documents: Arc<dyn DocumentRenderer>,
}

impl SagaRunner {
    pub fn new(state: &AppState) -> Self {
        SagaRunner {
            db: state.db.clone(),
            stock: state.stock.clone(),
            documents: state.documents.clone(),
        }
    }

    /// Applies movements one by one, recording the inverse of each.
    ///
    /// Lines touching the same medicine and unit are merged first so a
    /// shortfall is reported against the document's full demand.
    pub async fn apply_movements(
        &self,
        saga: &mut Saga,
        movements: &[StockMovement],
        actor: i64,
    ) -> ApiResult<()> {
        for movement in consolidate(movements.to_vec()) {
            self.stock.adjust(&movement, actor).await?;
            saga.record(Compensation::ReverseStock(movement.inverse()));
        }
        Ok(())
    }

    /// Renders a document and records its removal.
    pub async fn render(&self, saga: &mut Saga, document: &PrintableDocument) -> ApiResult<String> {
        let path = render_blocking(self.documents.clone(), document.clone()).await?;
        saga.record(Compensation::RemoveFile { path: path.clone() });
        Ok(path)
    }

    /// Replays the undo log after `cause` and returns the error to send.
    pub async fn rollback(&self, saga: &mut Saga, cause: ApiError, actor: i64) -> ApiError {
        let steps = match saga.begin_rollback() {
            Ok(steps) => steps,
            Err(e) => {
                error!(
                    kind = %saga.kind(),
                    reference = saga.reference(),
                    error = %e,
                    "rollback requested on a finished saga"
                );
                return cause;
            }
        };

        warn!(
            kind = %saga.kind(),
            reference = saga.reference(),
            steps = steps.len(),
            cause = %cause.message,
            "Rolling back"
        );

        let mut failed = 0;
        for step in &steps {
            if let Err(e) = self.compensate(step, actor).await {
                failed += 1;
                error!(
                    kind = %saga.kind(),
                    reference = saga.reference(),
                    action = %step,
                    error = %e.message,
                    "compensation failed, manual reconciliation required"
                );
            }
        }

        match saga.settle(failed) {
            Ok(SagaStage::RolledBack) => {
                info!(kind = %saga.kind(), reference = saga.reference(), "Rolled back cleanly");
                cause
            }
            Ok(_) => ApiError::inconsistent(&cause),
            Err(e) => {
                error!(kind = %saga.kind(), reference = saga.reference(), error = %e, "rollback did not settle");
                ApiError::inconsistent(&cause)
            }
        }
    }

    async fn compensate(&self, step: &Compensation, actor: i64) -> ApiResult<()> {
        match step {
            Compensation::ReverseStock(movement) => {
                self.stock.adjust(movement, actor).await?;
            }
            Compensation::DeleteDocument { kind, id } => match kind {
                DocumentKind::Production => self.db.productions().hard_delete(*id).await?,
                DocumentKind::Invoice => self.db.invoices().hard_delete(*id).await?,
                DocumentKind::PurchaseInvoice => self.db.purchase_invoices().hard_delete(*id).await?,
            },
            Compensation::RestoreDocument(snapshot) => match snapshot.as_ref() {
                DocumentSnapshot::Production(record) => self.db.productions().restore(record).await?,
                DocumentSnapshot::Invoice(record) => self.db.invoices().restore(record).await?,
                DocumentSnapshot::PurchaseInvoice(record) => {
                    self.db.purchase_invoices().restore(record).await?
                }
            },
            Compensation::UndeleteDocument { kind, id } => match kind {
                DocumentKind::Production => self.db.productions().undelete(*id).await?,
                DocumentKind::Invoice => self.db.invoices().undelete(*id).await?,
                DocumentKind::PurchaseInvoice => self.db.purchase_invoices().undelete(*id).await?,
            },
            Compensation::RemoveFile { path } => remove_blocking(self.documents.clone(), path.clone()).await?,
        }
        Ok(())
    }
}
