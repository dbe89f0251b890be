//! The saga shared by all three stock documents.
//!
//! Each document kind implements [`StockDocument`] over its repository and
//! draft types. The functions here drive the create, modify and delete
//! flows for any such kind. Resolving payloads and laying out the printed
//! copy stay with the kind.

use async_trait::async_trait;
use tracing::{info, warn};

use pharmacon_core::{
    Compensation, CoreError, DocumentKind, DocumentSnapshot, Saga, SagaStage, StockMovement, User,
    ValidationError,
};
use pharmacon_db::{Database, DbError, DbResult};

use crate::document::{remove_blocking, PrintableDocument};
use crate::error::ApiResult;
use crate::saga::SagaRunner;
use crate::state::AppState;

/// Storage and stock behavior of one document kind.
#[async_trait]
pub(crate) trait StockDocument: Send + Sync + 'static {
    const KIND: DocumentKind;
    /// Field named when a live document already uses the number.
    const NUMBER_FIELD: &'static str;

    type Draft: Send + Sync;
    type Record: Clone + Send + Sync;

    fn draft_number(draft: &Self::Draft) -> String;
    fn draft_updates_stock(draft: &Self::Draft) -> bool;
    fn draft_movements(draft: &Self::Draft) -> Vec<StockMovement>;

    fn record_id(record: &Self::Record) -> i64;
    fn record_number(record: &Self::Record) -> String;
    fn record_pdf(record: &Self::Record) -> Option<&str>;
    /// Movements the stored document actually applied.
    fn record_movements(record: &Self::Record) -> Vec<StockMovement>;
    fn snapshot(record: &Self::Record) -> DocumentSnapshot;

    async fn number_in_use(db: &Database, draft: &Self::Draft, excluding: Option<i64>) -> DbResult<bool>;
    async fn insert(db: &Database, draft: &Self::Draft, actor: i64) -> DbResult<i64>;
    async fn update_header(db: &Database, id: i64, draft: &Self::Draft, actor: i64) -> DbResult<()>;
    async fn insert_items(db: &Database, id: i64, draft: &Self::Draft) -> DbResult<()>;
    async fn replace_items(db: &Database, id: i64, draft: &Self::Draft) -> DbResult<()>;
    async fn set_pdf_url(db: &Database, id: i64, path: &str) -> DbResult<()>;
    async fn soft_delete(db: &Database, id: i64, actor: i64) -> DbResult<()>;
    async fn get_record(db: &Database, id: i64) -> DbResult<Option<Self::Record>>;
}

pub(crate) async fn load<D: StockDocument>(state: &AppState, id: i64) -> ApiResult<D::Record> {
    Ok(D::get_record(&state.db, id)
        .await?
        .ok_or_else(|| CoreError::not_found(D::KIND.title(), id.to_string()))?)
}

async fn ensure_number_free<D: StockDocument>(
    state: &AppState,
    draft: &D::Draft,
    excluding: Option<i64>,
) -> ApiResult<()> {
    if D::number_in_use(&state.db, draft, excluding).await? {
        return Err(ValidationError::Duplicate {
            field: D::NUMBER_FIELD.to_string(),
            value: D::draft_number(draft),
        }
        .into());
    }
    Ok(())
}

async fn reread<D: StockDocument>(state: &AppState, id: i64) -> ApiResult<D::Record> {
    Ok(D::get_record(&state.db, id)
        .await?
        .ok_or_else(|| DbError::not_found(D::KIND.title(), id))?)
}

fn reversal<D: StockDocument>(record: &D::Record) -> Vec<StockMovement> {
    D::record_movements(record).iter().map(StockMovement::inverse).collect()
}

// =============================================================================
// Create
// =============================================================================

pub(crate) async fn create<D: StockDocument>(
    state: &AppState,
    draft: &D::Draft,
    document: &PrintableDocument,
    user: &User,
) -> ApiResult<D::Record> {
    ensure_number_free::<D>(state, draft, None).await?;

    let runner = SagaRunner::new(state);
    let mut saga = Saga::new(D::KIND, D::draft_number(draft));

    match write_new::<D>(state, &runner, &mut saga, draft, document, user.id).await {
        Ok(record) => {
            saga.commit()?;
            info!(kind = D::KIND.as_str(), number = %D::record_number(&record), user = %user.name, "Document created");
            Ok(record)
        }
        Err(cause) => Err(runner.rollback(&mut saga, cause, user.id).await),
    }
}

async fn write_new<D: StockDocument>(
    state: &AppState,
    runner: &SagaRunner,
    saga: &mut Saga,
    draft: &D::Draft,
    document: &PrintableDocument,
    actor: i64,
) -> ApiResult<D::Record> {
    let id = D::insert(&state.db, draft, actor)
        .await
        .map_err(|e| e.on_duplicate(D::NUMBER_FIELD, D::draft_number(draft)))?;
    saga.record(Compensation::DeleteDocument { kind: D::KIND, id });
    saga.advance(SagaStage::HeaderWritten)?;

    if D::draft_updates_stock(draft) {
        runner.apply_movements(saga, &D::draft_movements(draft), actor).await?;
        saga.advance(SagaStage::StockApplied)?;
    }

    D::insert_items(&state.db, id, draft).await?;
    saga.advance(SagaStage::ItemsWritten)?;

    let path = runner.render(saga, document).await?;
    D::set_pdf_url(&state.db, id, &path).await?;
    saga.advance(SagaStage::DocumentRendered)?;

    reread::<D>(state, id).await
}

// =============================================================================
// Modify
// =============================================================================

/// Replaces `old` with `draft`. The stock `old` applied is given back
/// before the new lines are taken, so a document can be edited up to the
/// stock it already holds.
pub(crate) async fn modify<D: StockDocument>(
    state: &AppState,
    old: &D::Record,
    draft: &D::Draft,
    document: &PrintableDocument,
    user: &User,
) -> ApiResult<D::Record> {
    ensure_number_free::<D>(state, draft, Some(D::record_id(old))).await?;

    let runner = SagaRunner::new(state);
    let mut saga = Saga::new(D::KIND, D::record_number(old));

    match write_modified::<D>(state, &runner, &mut saga, old, draft, document, user.id).await {
        Ok(record) => {
            saga.commit()?;
            if let Some(old_pdf) = D::record_pdf(old) {
                if let Err(e) = remove_blocking(state.documents.clone(), old_pdf.to_string()).await {
                    warn!(path = %old_pdf, error = %e, "Failed to remove superseded document");
                }
            }
            info!(kind = D::KIND.as_str(), number = %D::record_number(&record), user = %user.name, "Document modified");
            Ok(record)
        }
        Err(cause) => Err(runner.rollback(&mut saga, cause, user.id).await),
    }
}

async fn write_modified<D: StockDocument>(
    state: &AppState,
    runner: &SagaRunner,
    saga: &mut Saga,
    old: &D::Record,
    draft: &D::Draft,
    document: &PrintableDocument,
    actor: i64,
) -> ApiResult<D::Record> {
    let id = D::record_id(old);

    let prior = reversal::<D>(old);
    if !prior.is_empty() {
        runner.apply_movements(saga, &prior, actor).await?;
        saga.advance(SagaStage::PriorStockReversed)?;
    }

    saga.record(Compensation::RestoreDocument(Box::new(D::snapshot(old))));
    D::update_header(&state.db, id, draft, actor)
        .await
        .map_err(|e| e.on_duplicate(D::NUMBER_FIELD, D::draft_number(draft)))?;
    saga.advance(SagaStage::HeaderWritten)?;

    if D::draft_updates_stock(draft) {
        runner.apply_movements(saga, &D::draft_movements(draft), actor).await?;
        saga.advance(SagaStage::StockApplied)?;
    }

    D::replace_items(&state.db, id, draft).await?;
    saga.advance(SagaStage::ItemsWritten)?;

    let path = runner.render(saga, document).await?;
    D::set_pdf_url(&state.db, id, &path).await?;
    saga.advance(SagaStage::DocumentRendered)?;

    reread::<D>(state, id).await
}

// =============================================================================
// Delete
// =============================================================================

pub(crate) async fn delete<D: StockDocument>(state: &AppState, id: i64, user: &User) -> ApiResult<()> {
    let record = load::<D>(state, id).await?;
    let runner = SagaRunner::new(state);
    let mut saga = Saga::new(D::KIND, D::record_number(&record));

    match write_deleted::<D>(state, &runner, &mut saga, &record, user.id).await {
        Ok(()) => {
            saga.commit()?;
            info!(kind = D::KIND.as_str(), number = %D::record_number(&record), user = %user.name, "Document deleted");
            Ok(())
        }
        Err(cause) => Err(runner.rollback(&mut saga, cause, user.id).await),
    }
}

async fn write_deleted<D: StockDocument>(
    state: &AppState,
    runner: &SagaRunner,
    saga: &mut Saga,
    record: &D::Record,
    actor: i64,
) -> ApiResult<()> {
    let id = D::record_id(record);
    D::soft_delete(&state.db, id, actor).await?;
    saga.record(Compensation::UndeleteDocument { kind: D::KIND, id });
    saga.advance(SagaStage::HeaderWritten)?;

    let undo = reversal::<D>(record);
    if !undo.is_empty() {
        runner.apply_movements(saga, &undo, actor).await?;
        saga.advance(SagaStage::StockApplied)?;
    }
    Ok(())
}
