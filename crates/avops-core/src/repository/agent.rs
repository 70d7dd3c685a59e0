//! Agent repository trait definition.

use avops_types::agent::Agent;
use avops_types::error::RepositoryError;
use avops_types::id::AgentId;

/// Repository trait for the agent catalog.
///
/// Names are unique case-insensitively; implementations reject a duplicate
/// insert with `RepositoryError::Conflict`.
pub trait AgentRepository: Send + Sync {
    fn create(
        &self,
        agent: &Agent,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get(
        &self,
        id: &AgentId,
    ) -> impl std::future::Future<Output = Result<Option<Agent>, RepositoryError>> + Send;

    /// Case-insensitive lookup by name.
    fn find_by_name(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<Agent>, RepositoryError>> + Send;

    /// All agents ordered by name.
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<Agent>, RepositoryError>> + Send;

    /// Replace the mutable fields (name, domain, config) of an existing agent.
    fn update(
        &self,
        agent: &Agent,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete by id. Returns `true` if it existed.
    fn delete(
        &self,
        id: &AgentId,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
