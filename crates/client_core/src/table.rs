//! Table Reconciliation Controller.
//!
//! Owns the displayed row collection. Every mutation goes to the gateway
//! first and is followed by a full `list()`; the fetched snapshot replaces
//! local rows wholesale. Failed operations leave the rows untouched.

use std::{collections::HashSet, sync::Arc};

use shared::domain::{Duty, DutyDraft, DutyField, DutyKey};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, MutexGuard, RwLock};
use tracing::{info, warn};

use crate::{
    config::Settings,
    editing::{CellValidationError, CommitTrigger, RowEditSession},
    form::{AddRowForm, ValidationErrors},
    gateway::{DutyGateway, GatewayError, HttpDutyGateway},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOperation {
    Refresh,
    Add,
    Delete,
    Save,
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),
    #[error("{0}")]
    Cell(#[from] CellValidationError),
    #[error(transparent)]
    Remote(#[from] GatewayError),
    #[error("remote list contains duplicate key {0}")]
    DuplicateKey(DutyKey),
}

impl TableError {
    /// Local, field-scoped errors that never reached the network.
    pub fn is_validation(&self) -> bool {
        matches!(self, TableError::Validation(_) | TableError::Cell(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableEvent {
    RowsReplaced(Vec<Duty>),
    OperationFailed {
        operation: TableOperation,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Cancelled,
    Deleted(Vec<Duty>),
}

/// Synchronous yes/no gate shown before a row is deleted.
pub trait ConfirmDelete {
    fn confirm(&self, row: Option<&Duty>, key: &DutyKey) -> bool;
}

impl<F> ConfirmDelete for F
where
    F: Fn(Option<&Duty>, &DutyKey) -> bool,
{
    fn confirm(&self, row: Option<&Duty>, key: &DutyKey) -> bool {
        self(row, key)
    }
}

pub struct TableController {
    gateway: Arc<dyn DutyGateway>,
    rows: RwLock<Vec<Duty>>,
    last_error: RwLock<Option<String>>,
    mutation_lock: Option<Mutex<()>>,
    events: broadcast::Sender<TableEvent>,
}

impl TableController {
    pub fn new(gateway: Arc<dyn DutyGateway>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            gateway,
            rows: RwLock::new(Vec::new()),
            last_error: RwLock::new(None),
            mutation_lock: None,
            events,
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let gateway = HttpDutyGateway::new(settings)?;
        Ok(Self::new(Arc::new(gateway)).with_serialized_mutations(settings.serialize_mutations))
    }

    /// When enabled, each mutation holds a table-wide lock until its
    /// refresh completes. Otherwise overlapping mutations race and the
    /// refresh that resolves last wins.
    pub fn with_serialized_mutations(mut self, enabled: bool) -> Self {
        self.mutation_lock = enabled.then(|| Mutex::new(()));
        self
    }

    pub async fn rows(&self) -> Vec<Duty> {
        self.rows.read().await.clone()
    }

    pub async fn row(&self, key: &DutyKey) -> Option<Duty> {
        self.rows
            .read()
            .await
            .iter()
            .find(|row| &row.key == key)
            .cloned()
    }

    /// Message of the last failed remote operation, cleared by the next
    /// successful one.
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TableEvent> {
        self.events.subscribe()
    }

    pub async fn refresh(&self) -> Result<Vec<Duty>, TableError> {
        let result = self.fetch_and_replace().await;
        self.finish(TableOperation::Refresh, result).await
    }

    /// Validates the form, creates the row remotely and refreshes. The form
    /// is cleared only when the whole sequence succeeds.
    pub async fn add_row(&self, form: &mut AddRowForm) -> Result<Vec<Duty>, TableError> {
        let draft = form.draft()?;
        let _guard = self.lock_mutations().await;
        let result = self.create_and_refresh(&draft).await;
        let rows = self.finish(TableOperation::Add, result).await?;
        form.clear();
        Ok(rows)
    }

    pub async fn request_delete(
        &self,
        key: &DutyKey,
        gate: &dyn ConfirmDelete,
    ) -> Result<DeleteOutcome, TableError> {
        let row = self.row(key).await;
        if !gate.confirm(row.as_ref(), key) {
            info!(%key, "duty delete cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }
        self.delete_row(key).await.map(DeleteOutcome::Deleted)
    }

    /// Deletes remotely then refreshes. Keys missing locally are still sent.
    /// Only reachable through `request_delete`, after the gate agreed.
    pub(crate) async fn delete_row(&self, key: &DutyKey) -> Result<Vec<Duty>, TableError> {
        let _guard = self.lock_mutations().await;
        let result = self.delete_and_refresh(key).await;
        self.finish(TableOperation::Delete, result).await
    }

    pub async fn save_row(&self, record: Duty) -> Result<Vec<Duty>, TableError> {
        let _guard = self.lock_mutations().await;
        let result = self.update_and_refresh(&record).await;
        self.finish(TableOperation::Save, result).await
    }

    /// Commits one cell of `session` and saves the merged row. Returns
    /// `Ok(None)` when the cell was not being edited.
    pub async fn commit_cell(
        &self,
        session: &mut RowEditSession,
        field: DutyField,
        trigger: CommitTrigger,
    ) -> Result<Option<Vec<Duty>>, TableError> {
        let Some(record) = session.commit(field, trigger)? else {
            return Ok(None);
        };
        let key = record.key.clone();
        let rows = self.save_row(record).await?;
        if let Some(refreshed) = rows.iter().find(|row| row.key == key) {
            session.sync(refreshed.clone());
        }
        Ok(Some(rows))
    }

    async fn lock_mutations(&self) -> Option<MutexGuard<'_, ()>> {
        match &self.mutation_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }

    async fn create_and_refresh(&self, draft: &DutyDraft) -> Result<Vec<Duty>, TableError> {
        let created = self.gateway.create(draft).await?;
        info!(key = %created.key, "duty created");
        self.fetch_and_replace().await
    }

    async fn delete_and_refresh(&self, key: &DutyKey) -> Result<Vec<Duty>, TableError> {
        self.gateway.delete(key).await?;
        info!(%key, "duty deleted");
        self.fetch_and_replace().await
    }

    async fn update_and_refresh(&self, record: &Duty) -> Result<Vec<Duty>, TableError> {
        self.gateway.update(&record.key, record).await?;
        info!(key = %record.key, "duty updated");
        self.fetch_and_replace().await
    }

    async fn fetch_and_replace(&self) -> Result<Vec<Duty>, TableError> {
        let fetched = self.gateway.list().await?;
        ensure_unique_keys(&fetched)?;
        *self.rows.write().await = fetched.clone();
        info!(rows = fetched.len(), "duty table replaced from remote snapshot");
        Ok(fetched)
    }

    async fn finish(
        &self,
        operation: TableOperation,
        result: Result<Vec<Duty>, TableError>,
    ) -> Result<Vec<Duty>, TableError> {
        match &result {
            Ok(rows) => {
                *self.last_error.write().await = None;
                let _ = self.events.send(TableEvent::RowsReplaced(rows.clone()));
            }
            Err(error) => {
                let message = error.to_string();
                warn!(?operation, %message, "duty table operation failed");
                *self.last_error.write().await = Some(message.clone());
                let _ = self
                    .events
                    .send(TableEvent::OperationFailed { operation, message });
            }
        }
        result
    }
}

fn ensure_unique_keys(rows: &[Duty]) -> Result<(), TableError> {
    let mut seen = HashSet::with_capacity(rows.len());
    for row in rows {
        if !seen.insert(&row.key) {
            return Err(TableError::DuplicateKey(row.key.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/table_tests.rs"]
mod tests;
