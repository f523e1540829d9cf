//! Row Editing Controller: per-cell view/edit state for one table row.

use shared::domain::{Duty, DutyField, DutyKey, DutyUpdate};
use thiserror::Error;

use crate::form::ValidationRule;

/// What ended the edit. Both run the same commit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitTrigger {
    Enter,
    Blur,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellState {
    Viewing,
    Editing {
        pending: String,
        error: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CellValidationError {
    pub field: DutyField,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct CellEditor {
    field: DutyField,
    state: CellState,
    rule: ValidationRule,
}

impl CellEditor {
    fn new(field: DutyField) -> Self {
        Self {
            field,
            state: CellState::Viewing,
            rule: ValidationRule::required(format!("{} is required.", field.title())),
        }
    }

    pub fn field(&self) -> DutyField {
        self.field
    }

    pub fn state(&self) -> &CellState {
        &self.state
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, CellState::Editing { .. })
    }

    pub fn pending(&self) -> Option<&str> {
        match &self.state {
            CellState::Editing { pending, .. } => Some(pending),
            CellState::Viewing => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            CellState::Editing { error, .. } => error.as_deref(),
            CellState::Viewing => None,
        }
    }
}

/// Edit handle for a single row, passed explicitly to whatever renders it.
#[derive(Debug, Clone)]
pub struct RowEditSession {
    record: Duty,
    cells: Vec<CellEditor>,
    focused: Option<DutyField>,
}

impl RowEditSession {
    pub fn new(record: Duty) -> Self {
        Self {
            record,
            cells: DutyField::EDITABLE.into_iter().map(CellEditor::new).collect(),
            focused: None,
        }
    }

    pub fn record(&self) -> &Duty {
        &self.record
    }

    pub fn key(&self) -> &DutyKey {
        &self.record.key
    }

    pub fn cell(&self, field: DutyField) -> &CellEditor {
        // `cells` holds every editable field in `DutyField::EDITABLE` order.
        &self.cells[field_index(field)]
    }

    fn cell_mut(&mut self, field: DutyField) -> &mut CellEditor {
        &mut self.cells[field_index(field)]
    }

    /// The cell whose input should hold keyboard focus.
    pub fn focused(&self) -> Option<DutyField> {
        self.focused
    }

    /// Click on a cell: enters editing seeded from the record, or leaves
    /// editing without saving when the cell is already open.
    pub fn open(&mut self, field: DutyField) {
        if self.cell(field).is_editing() {
            self.cancel(field);
            return;
        }
        let pending = self.record.field(field).to_string();
        self.cell_mut(field).state = CellState::Editing {
            pending,
            error: None,
        };
        self.focused = Some(field);
    }

    /// Replaces the pending value and drops any message from an earlier
    /// failed commit. Returns false when the cell is not being edited.
    pub fn input(&mut self, field: DutyField, value: impl Into<String>) -> bool {
        match &mut self.cell_mut(field).state {
            CellState::Editing { pending, error } => {
                *pending = value.into();
                *error = None;
                true
            }
            CellState::Viewing => false,
        }
    }

    /// Validates the pending value. On success the cell closes and the
    /// merged record is returned for saving; on failure the cell stays open
    /// with the message attached. A cell that is not editing yields `None`.
    pub fn commit(
        &mut self,
        field: DutyField,
        trigger: CommitTrigger,
    ) -> Result<Option<Duty>, CellValidationError> {
        let cell = self.cell_mut(field);
        let CellState::Editing { pending, error } = &mut cell.state else {
            return Ok(None);
        };

        if !cell.rule.accepts(pending) {
            let message = cell.rule.message.clone();
            *error = Some(message.clone());
            tracing::debug!(%field, ?trigger, "cell commit rejected");
            return Err(CellValidationError { field, message });
        }

        let update = DutyUpdate::for_field(field, std::mem::take(pending));
        cell.state = CellState::Viewing;
        if self.focused == Some(field) {
            self.focused = None;
        }
        Ok(Some(self.record.apply(update)))
    }

    pub fn cancel(&mut self, field: DutyField) {
        self.cell_mut(field).state = CellState::Viewing;
        if self.focused == Some(field) {
            self.focused = None;
        }
    }

    /// Adopts a refreshed copy of the row. Open cells keep their pending
    /// input.
    pub fn sync(&mut self, record: Duty) {
        self.record = record;
    }
}

fn field_index(field: DutyField) -> usize {
    match field {
        DutyField::Id => 0,
        DutyField::Name => 1,
    }
}

#[cfg(test)]
#[path = "tests/editing_tests.rs"]
mod tests;
