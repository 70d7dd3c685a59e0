//! Recipe content: locating, parsing and stubbing recipe YAML.

use std::path::{Path, PathBuf};

use avops_types::error::ExecutionError;
use avops_types::recipe::{Recipe, RecipeDocument};

use crate::service::fs::FileSystem;

/// Parse recipe YAML into a typed document.
pub fn parse_recipe_document(yaml: &str) -> Result<RecipeDocument, serde_yaml_ng::Error> {
    serde_yaml_ng::from_str(yaml)
}

/// Absolute location of a stored recipe path. Relative paths are resolved
/// against the recipes directory.
pub fn recipe_file_path(recipes_dir: &Path, stored: &str) -> PathBuf {
    let stored = Path::new(stored);
    if stored.is_absolute() {
        stored.to_path_buf()
    } else {
        recipes_dir.join(stored)
    }
}

/// Resolve a recipe's YAML text: inline text first, then the stored file.
pub async fn load_recipe_text<F: FileSystem>(
    recipe: &Recipe,
    files: &F,
    recipes_dir: &Path,
) -> Result<String, ExecutionError> {
    if let Some(text) = recipe.yaml_text.as_deref().filter(|t| !t.trim().is_empty()) {
        return Ok(text.to_string());
    }

    match recipe.yaml_path.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(stored) => {
            let path = recipe_file_path(recipes_dir, stored);
            files.read_file(&path).await.map_err(|e| {
                ExecutionError::before_phases(format!(
                    "cannot read recipe '{}' from {}: {e}",
                    recipe.name,
                    path.display()
                ))
            })
        }
        None => Err(ExecutionError::before_phases(format!(
            "recipe '{}' has no YAML content",
            recipe.name
        ))),
    }
}

/// Load and parse a recipe in one go.
pub async fn load_recipe_document<F: FileSystem>(
    recipe: &Recipe,
    files: &F,
    recipes_dir: &Path,
) -> Result<RecipeDocument, ExecutionError> {
    let text = load_recipe_text(recipe, files, recipes_dir).await?;
    parse_recipe_document(&text).map_err(|e| {
        ExecutionError::before_phases(format!("recipe '{}' is not valid YAML: {e}", recipe.name))
    })
}

/// Minimal recipe YAML used when an exported recipe has no readable source.
pub fn stub_recipe_yaml(name: &str) -> String {
    format!(
        "# Missing source; stub for recipe '{name}'\n\
         api_version: v1\n\
         name: {}\n\
         intake: []\n\
         plan: []\n\
         act: []\n\
         verify: []\n",
        yaml_quote(name)
    )
}

fn yaml_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if c.is_control() => out.push(' '),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryFileSystem;
    use avops_types::id::RecipeId;
    use avops_types::recipe::Phase;
    use chrono::Utc;

    fn recipe(yaml_text: Option<&str>, yaml_path: Option<&str>) -> Recipe {
        Recipe {
            id: RecipeId::new(),
            name: "Room Health".to_string(),
            yaml_text: yaml_text.map(String::from),
            yaml_path: yaml_path.map(String::from),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_stub_parses_with_empty_phases() {
        let yaml = stub_recipe_yaml("Weird: \"name\"");
        assert!(yaml.starts_with("# Missing source"));
        let doc = parse_recipe_document(&yaml).unwrap();
        assert_eq!(doc.name, "Weird: \"name\"");
        assert_eq!(doc.api_version.as_deref(), Some("v1"));
        for phase in Phase::ALL {
            assert!(doc.steps(phase).is_empty());
        }
    }

    #[tokio::test]
    async fn test_inline_text_wins_over_file() {
        let files = MemoryFileSystem::default();
        files.insert("/recipes/room.yaml", "name: from-file");
        let r = recipe(Some("name: inline"), Some("room.yaml"));
        let text = load_recipe_text(&r, &files, Path::new("/recipes")).await.unwrap();
        assert_eq!(text, "name: inline");
    }

    #[tokio::test]
    async fn test_relative_path_resolves_under_recipes_dir() {
        let files = MemoryFileSystem::default();
        files.insert("/recipes/room.yaml", "name: from-file\nplan: [a]");
        let r = recipe(Some("   "), Some("room.yaml"));
        let doc = load_recipe_document(&r, &files, Path::new("/recipes")).await.unwrap();
        assert_eq!(doc.name, "from-file");
        assert_eq!(doc.plan.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_content_fails_before_phases() {
        let files = MemoryFileSystem::default();
        let err = load_recipe_text(&recipe(None, None), &files, Path::new("/recipes"))
            .await
            .unwrap_err();
        assert_eq!(err.phase(), None);

        let err = load_recipe_text(&recipe(None, Some("gone.yaml")), &files, Path::new("/recipes"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("gone.yaml"));
    }

    #[tokio::test]
    async fn test_invalid_yaml_is_execution_error() {
        let files = MemoryFileSystem::default();
        let r = recipe(Some("intake: [unclosed"), None);
        let err = load_recipe_document(&r, &files, Path::new("/recipes"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not valid YAML"));
    }
}
