//! Workflow repository trait definition.
//!
//! Stores workflow definitions. The infrastructure layer (avops-infra)
//! implements this trait with SQLite persistence.

use avops_types::error::RepositoryError;
use avops_types::id::WorkflowId;
use avops_types::workflow::{ScheduleUpdate, WorkflowDefinition};
use chrono::{DateTime, Utc};

/// Repository trait for workflow definitions.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait WorkflowRepository: Send + Sync {
    /// Insert a new definition. A case-insensitive name clash is a `Conflict`.
    fn create(
        &self,
        def: &WorkflowDefinition,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get(
        &self,
        id: &WorkflowId,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowDefinition>, RepositoryError>> + Send;

    /// Case-insensitive lookup by name.
    fn find_by_name(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowDefinition>, RepositoryError>> + Send;

    /// All definitions in creation order.
    fn list(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowDefinition>, RepositoryError>> + Send;

    /// Enabled interval workflows whose `next_run_at` is at or before `now`.
    fn list_due(
        &self,
        now: &DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowDefinition>, RepositoryError>> + Send;

    /// Replace every mutable column of an existing definition.
    fn update(
        &self,
        def: &WorkflowDefinition,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Write only the scheduler-owned columns. Concurrent writers race and
    /// the last write wins.
    fn record_schedule(
        &self,
        id: &WorkflowId,
        update: &ScheduleUpdate,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete by id. Returns `true` if it existed. Fails with
    /// `RepositoryError::Constraint` when runs still reference the workflow.
    fn delete(
        &self,
        id: &WorkflowId,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
