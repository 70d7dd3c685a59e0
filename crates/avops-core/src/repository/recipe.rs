//! Recipe repository trait definition.

use avops_types::error::RepositoryError;
use avops_types::id::RecipeId;
use avops_types::recipe::Recipe;

/// Repository trait for registered recipes. Same naming rules as agents.
pub trait RecipeRepository: Send + Sync {
    fn create(
        &self,
        recipe: &Recipe,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get(
        &self,
        id: &RecipeId,
    ) -> impl std::future::Future<Output = Result<Option<Recipe>, RepositoryError>> + Send;

    /// Case-insensitive lookup by name.
    fn find_by_name(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<Recipe>, RepositoryError>> + Send;

    /// All recipes ordered by name.
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<Recipe>, RepositoryError>> + Send;

    /// Replace name, inline text and stored path of an existing recipe.
    fn update(
        &self,
        recipe: &Recipe,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn delete(
        &self,
        id: &RecipeId,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
