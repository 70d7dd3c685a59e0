//! Recipe catalog entries and the recipe YAML document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::id::RecipeId;

/// A registered recipe.
///
/// The YAML content lives either inline (`yaml_text`) or in a file under the
/// recipes directory (`yaml_path`, relative to that directory). Inline text
/// wins when both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    pub yaml_text: Option<String>,
    pub yaml_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// The four fixed recipe phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Intake,
    Plan,
    Act,
    Verify,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Intake, Phase::Plan, Phase::Act, Phase::Verify];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Intake => "intake",
            Phase::Plan => "plan",
            Phase::Act => "act",
            Phase::Verify => "verify",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "intake" => Ok(Phase::Intake),
            "plan" => Ok(Phase::Plan),
            "act" => Ok(Phase::Act),
            "verify" => Ok(Phase::Verify),
            other => Err(format!("unknown phase: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Recipe document (YAML)
// ---------------------------------------------------------------------------

/// Parsed recipe YAML.
///
/// Only the lengths of the four phase arrays drive execution; the remaining
/// fields are carried for display and export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeDocument {
    #[serde(
        default,
        rename = "api_version",
        alias = "apiVersion",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_version: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardrails: Option<Guardrails>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub success_metrics: Vec<SuccessMetric>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub intake: Vec<serde_yaml_ng::Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub plan: Vec<serde_yaml_ng::Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub act: Vec<serde_yaml_ng::Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub verify: Vec<serde_yaml_ng::Value>,
}

impl RecipeDocument {
    /// Declared steps for one phase (possibly empty).
    pub fn steps(&self, phase: Phase) -> &[serde_yaml_ng::Value] {
        match phase {
            Phase::Intake => &self.intake,
            Phase::Plan => &self.plan,
            Phase::Act => &self.act,
            Phase::Verify => &self.verify,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guardrails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_minutes: Option<u32>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub rollback_actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessMetric {
    pub metric: String,
    #[serde(default)]
    pub target: serde_yaml_ng::Value,
}

/// A phase key written with no value (`intake:`) parses as YAML null.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        let names: Vec<_> = Phase::ALL.iter().map(Phase::as_str).collect();
        assert_eq!(names, ["intake", "plan", "act", "verify"]);
    }

    #[test]
    fn test_phase_from_str() {
        assert_eq!("VERIFY".parse::<Phase>().unwrap(), Phase::Verify);
        assert!("deploy".parse::<Phase>().is_err());
    }

    #[test]
    fn test_document_full_schema() {
        let yaml = r#"
api_version: v1
name: Room Health
description: Daily sweep
guardrails:
  timeoutMinutes: 15
  rollbackActions: ["reboot codec"]
successMetrics:
  - metric: rooms_online
    target: 0.98
intake:
  - capture ticket
plan:
  - pick rooms
  - order checks
act: []
verify:
  - confirm
"#;
        let doc: RecipeDocument = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(doc.api_version.as_deref(), Some("v1"));
        assert_eq!(doc.name, "Room Health");
        assert_eq!(doc.guardrails.as_ref().unwrap().timeout_minutes, Some(15));
        assert_eq!(doc.success_metrics[0].metric, "rooms_online");
        assert_eq!(doc.steps(Phase::Intake).len(), 1);
        assert_eq!(doc.steps(Phase::Plan).len(), 2);
        assert!(doc.steps(Phase::Act).is_empty());
        assert_eq!(doc.steps(Phase::Verify).len(), 1);
    }

    #[test]
    fn test_document_missing_and_null_phases() {
        let doc: RecipeDocument = serde_yaml_ng::from_str("name: bare\nintake:\n").unwrap();
        assert!(doc.intake.is_empty());
        assert!(doc.verify.is_empty());
        assert!(doc.guardrails.is_none());
    }
}
