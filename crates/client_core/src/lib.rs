//! Client core for the duty table: remote gateway, per-row cell editing,
//! the add-row form and the controller that reconciles local rows with the
//! remote collection.

pub mod config;
pub mod editing;
pub mod form;
pub mod gateway;
pub mod table;

pub use config::{load_settings, Settings};
pub use editing::{CellState, CellValidationError, CommitTrigger, RowEditSession};
pub use form::{AddRowForm, FieldSpec, ValidationErrors, ValidationRule};
pub use gateway::{DutyGateway, GatewayError, HttpDutyGateway, RemoteFailureKind};
pub use table::{
    ConfirmDelete, DeleteOutcome, TableController, TableError, TableEvent, TableOperation,
};
