//! Bundle records and merge reports.
//!
//! A bundle carries agents, recipes and workflows by human-readable name so
//! it stays meaningful in a different store. These are the decoded member
//! shapes; the archive codec lives in infra.

use serde::{Deserialize, Deserializer, Serialize};

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub const BUNDLE_VERSION: u32 = 1;

/// Entity kinds a bundle can carry, in import order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleEntity {
    Agents,
    Recipes,
    Workflows,
}

impl BundleEntity {
    pub const ALL: [BundleEntity; 3] = [
        BundleEntity::Agents,
        BundleEntity::Recipes,
        BundleEntity::Workflows,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BundleEntity::Agents => "agents",
            BundleEntity::Recipes => "recipes",
            BundleEntity::Workflows => "workflows",
        }
    }

    /// Name of the JSON member holding this entity's records.
    pub fn member_name(&self) -> &'static str {
        match self {
            BundleEntity::Agents => "agents.json",
            BundleEntity::Recipes => "recipes.json",
            BundleEntity::Workflows => "workflows.json",
        }
    }

    pub fn all() -> BTreeSet<BundleEntity> {
        Self::ALL.into_iter().collect()
    }
}

impl fmt::Display for BundleEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BundleEntity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "agents" | "agent" => Ok(BundleEntity::Agents),
            "recipes" | "recipe" => Ok(BundleEntity::Recipes),
            "workflows" | "workflow" => Ok(BundleEntity::Workflows),
            other => Err(format!("unknown bundle entity: '{other}'")),
        }
    }
}

/// Duplicate-name resolution strategy applied per record on import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    #[default]
    Skip,
    Overwrite,
    Rename,
}

impl MergePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergePolicy::Skip => "skip",
            MergePolicy::Overwrite => "overwrite",
            MergePolicy::Rename => "rename",
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(MergePolicy::Skip),
            "overwrite" => Ok(MergePolicy::Overwrite),
            "rename" => Ok(MergePolicy::Rename),
            other => Err(format!("unknown merge policy: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Archive members
// ---------------------------------------------------------------------------

/// `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    #[serde(alias = "bundleVersion")]
    pub bundle_version: u32,
    /// UTC ISO-8601.
    #[serde(alias = "generatedAt")]
    pub generated_at: String,
    #[serde(default)]
    pub includes: BundleIncludes,
}

/// Member file name per entity, or None when the entity was not exported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleIncludes {
    #[serde(default)]
    pub agents: Option<String>,
    #[serde(default)]
    pub recipes: Option<String>,
    #[serde(default)]
    pub workflows: Option<String>,
}

/// One row of `agents.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default, alias = "configJson")]
    pub config_json: serde_json::Value,
}

/// One row of `recipes.json`: an index entry pointing at a YAML member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIndexEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub file: String,
}

/// One row of `workflows.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_enabled", deserialize_with = "lenient_bool")]
    pub enabled: bool,
    #[serde(default, alias = "trigger_type")]
    pub trigger: String,
    #[serde(
        default,
        alias = "intervalMinutes",
        alias = "trigger_value",
        deserialize_with = "lenient_minutes"
    )]
    pub interval_minutes: Option<i64>,
    #[serde(default, alias = "agentName", alias = "agent_ref")]
    pub agent_name: String,
    #[serde(default, alias = "recipeName", alias = "recipe_ref")]
    pub recipe_name: String,
}

fn default_enabled() -> bool {
    true
}

/// Older bundles wrote `enabled` as 0/1 or left it null.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        serde_json::Value::String(s) => {
            !matches!(s.trim().to_ascii_lowercase().as_str(), "" | "0" | "false" | "no")
        }
        serde_json::Value::Null => true,
        _ => true,
    })
}

/// Accepts numbers and numeric strings; anything else is treated as absent.
fn lenient_minutes<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// A recipe as carried in a bundle: its name plus the YAML text.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeBundleItem {
    pub name: String,
    /// Member path inside the archive (e.g. `recipes/room-health.yaml`).
    pub file: String,
    pub yaml: String,
}

/// Decoded, format-independent bundle content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BundleContents {
    pub manifest: Option<BundleManifest>,
    pub agents: Vec<AgentRecord>,
    pub recipes: Vec<RecipeBundleItem>,
    pub workflows: Vec<WorkflowRecord>,
    /// Diagnostics collected while decoding (unreadable members, bad rows).
    pub messages: Vec<String>,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub agents: u32,
    pub recipes: u32,
    pub workflows: u32,
}

impl EntityCounts {
    pub fn get(&self, entity: BundleEntity) -> u32 {
        match entity {
            BundleEntity::Agents => self.agents,
            BundleEntity::Recipes => self.recipes,
            BundleEntity::Workflows => self.workflows,
        }
    }

    pub fn bump(&mut self, entity: BundleEntity) {
        match entity {
            BundleEntity::Agents => self.agents += 1,
            BundleEntity::Recipes => self.recipes += 1,
            BundleEntity::Workflows => self.workflows += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.agents + self.recipes + self.workflows
    }
}

/// Created/updated/skipped accounting for one import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleMergeReport {
    pub dry_run: bool,
    pub merge: MergePolicy,
    pub created: EntityCounts,
    pub updated: EntityCounts,
    pub skipped: EntityCounts,
    pub messages: Vec<String>,
}

impl BundleMergeReport {
    pub fn new(merge: MergePolicy, dry_run: bool) -> Self {
        Self {
            dry_run,
            merge,
            ..Default::default()
        }
    }
}

/// Per-entity exported counts plus degradation notes (stubbed recipes,
/// unresolved workflow references).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportReport {
    pub exported: EntityCounts,
    pub messages: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_policy_parse() {
        assert_eq!("Rename".parse::<MergePolicy>().unwrap(), MergePolicy::Rename);
        assert!("merge".parse::<MergePolicy>().is_err());
        assert_eq!(MergePolicy::default(), MergePolicy::Skip);
    }

    #[test]
    fn test_entity_order_is_import_order() {
        let order: Vec<_> = BundleEntity::all().into_iter().collect();
        assert_eq!(order, BundleEntity::ALL.to_vec());
    }

    #[test]
    fn test_workflow_record_aliases() {
        let row: WorkflowRecord = serde_json::from_str(
            r#"{"name":"Sweep","trigger_type":"interval","trigger_value":"15","agent_ref":"Ops","recipe_ref":"Health"}"#,
        )
        .unwrap();
        assert_eq!(row.trigger, "interval");
        assert_eq!(row.interval_minutes, Some(15));
        assert_eq!(row.agent_name, "Ops");
        assert_eq!(row.recipe_name, "Health");
        assert!(row.enabled);
    }

    #[test]
    fn test_workflow_record_camel_case_and_int_enabled() {
        let row: WorkflowRecord = serde_json::from_str(
            r#"{"name":"Sweep","enabled":0,"trigger":"manual","intervalMinutes":null,"agentName":"Ops","recipeName":"Health"}"#,
        )
        .unwrap();
        assert!(!row.enabled);
        assert_eq!(row.interval_minutes, None);
        assert_eq!(row.agent_name, "Ops");
    }

    #[test]
    fn test_manifest_accepts_camel_case() {
        let m: BundleManifest = serde_json::from_str(
            r#"{"bundleVersion":1,"generatedAt":"2026-01-01T00:00:00Z","includes":{"agents":"agents.json"}}"#,
        )
        .unwrap();
        assert_eq!(m.bundle_version, BUNDLE_VERSION);
        assert_eq!(m.includes.agents.as_deref(), Some("agents.json"));
        assert_eq!(m.includes.recipes, None);
    }

    #[test]
    fn test_counts_bump() {
        let mut counts = EntityCounts::default();
        counts.bump(BundleEntity::Recipes);
        counts.bump(BundleEntity::Recipes);
        assert_eq!(counts.get(BundleEntity::Recipes), 2);
        assert_eq!(counts.total(), 2);
    }
}
