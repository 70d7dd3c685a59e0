use thiserror::Error;

use crate::bundle::BundleMergeReport;
use crate::recipe::Phase;

/// Errors from repository operations (used by trait definitions in avops-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    /// A foreign key or other integrity constraint blocked the write.
    #[error("constraint violated: {0}")]
    Constraint(String),
}

/// Errors from the workflow definition store.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Empty or duplicate name, missing or invalid trigger value.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown agent/recipe, or a delete blocked by dependents.
    #[error("referential error: {0}")]
    Referential(String),

    #[error("workflow not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

/// Errors from the catalog (agents and recipes).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("filesystem error: {0}")]
    FileSystem(String),

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

/// A recipe failed to load or to run.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// `phase` is None when the recipe failed before any phase ran.
    #[error("{}", recipe_message(.phase, .message))]
    Recipe {
        phase: Option<Phase>,
        message: String,
    },
}

fn recipe_message(phase: &Option<Phase>, message: &str) -> String {
    match phase {
        Some(phase) => format!("recipe failed in {phase}: {message}"),
        None => format!("recipe failed: {message}"),
    }
}

impl ExecutionError {
    pub fn before_phases(message: impl Into<String>) -> Self {
        ExecutionError::Recipe {
            phase: None,
            message: message.into(),
        }
    }

    pub fn in_phase(phase: Phase, message: impl Into<String>) -> Self {
        ExecutionError::Recipe {
            phase: Some(phase),
            message: message.into(),
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        match self {
            ExecutionError::Recipe { phase, .. } => *phase,
        }
    }
}

/// Errors from the run ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A write violated the start/finish/terminal invariants or the store
    /// rejected it.
    #[error("ledger persistence error: {0}")]
    Persistence(String),

    #[error("run not found: {0}")]
    NotFound(String),
}

/// Errors surfaced by `run_now` and `tick`.
///
/// Execution failures reach the caller only after the ledger has sealed the
/// run as failed.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors from bundle export/import.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("archive error: {0}")]
    Archive(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    /// Reading the stores failed before anything was written.
    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),

    /// A store write failed mid-import. `report` holds what was applied
    /// before the failure.
    #[error("bundle persistence error: {message}")]
    Persistence {
        message: String,
        report: Box<BundleMergeReport>,
    },
}
