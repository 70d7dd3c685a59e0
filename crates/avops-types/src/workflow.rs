//! Workflow definition types.
//!
//! A workflow binds one agent to one recipe plus a trigger. The scheduler
//! owns `status`, `last_run_at` and `next_run_at`; users own everything else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::id::{AgentId, RecipeId, WorkflowId};

/// How a workflow (or a single run) was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    #[default]
    Manual,
    Interval,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Manual => "manual",
            TriggerType::Interval => "interval",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(TriggerType::Manual),
            "interval" => Ok(TriggerType::Interval),
            other => Err(format!("unknown trigger type: '{other}'")),
        }
    }
}

/// Derived health of a workflow, based on how recently it last succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Green,
    #[default]
    Yellow,
    Red,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Green => "green",
            HealthStatus::Yellow => "yellow",
            HealthStatus::Red => "red",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "green" => Ok(HealthStatus::Green),
            "yellow" => Ok(HealthStatus::Yellow),
            "red" => Ok(HealthStatus::Red),
            other => Err(format!("unknown health status: '{other}'")),
        }
    }
}

/// A stored workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    /// Unique, case-insensitive, whitespace-normalized name.
    pub name: String,
    pub agent_id: AgentId,
    pub recipe_id: RecipeId,
    pub trigger_type: TriggerType,
    /// Interval in minutes. Required (and positive) for interval triggers.
    pub trigger_value: Option<u32>,
    pub enabled: bool,
    pub status: HealthStatus,
    pub last_run_at: Option<DateTime<Utc>>,
    /// Only set while the workflow is interval-triggered and enabled.
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// Interval in minutes when this workflow is scheduled, else None.
    pub fn schedule_minutes(&self) -> Option<u32> {
        match self.trigger_type {
            TriggerType::Interval if self.enabled => self.trigger_value,
            _ => None,
        }
    }
}

/// Request to create a new workflow.
#[derive(Debug, Clone)]
pub struct CreateWorkflowRequest {
    pub name: String,
    pub agent_id: AgentId,
    pub recipe_id: RecipeId,
    pub trigger_type: TriggerType,
    pub trigger_value: Option<u32>,
}

/// Partial update. Only `Some` fields are applied.
#[derive(Debug, Clone, Default)]
pub struct UpdateWorkflowRequest {
    pub name: Option<String>,
    pub agent_id: Option<AgentId>,
    pub recipe_id: Option<RecipeId>,
    pub trigger_type: Option<TriggerType>,
    pub trigger_value: Option<u32>,
    pub enabled: Option<bool>,
}

impl UpdateWorkflowRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.agent_id.is_none()
            && self.recipe_id.is_none()
            && self.trigger_type.is_none()
            && self.trigger_value.is_none()
            && self.enabled.is_none()
    }
}

/// The columns the scheduler writes after every run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleUpdate {
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub status: HealthStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(trigger_type: TriggerType, enabled: bool) -> WorkflowDefinition {
        let now = Utc::now();
        WorkflowDefinition {
            id: WorkflowId::new(),
            name: "Nightly Sweep".to_string(),
            agent_id: AgentId::new(),
            recipe_id: RecipeId::new(),
            trigger_type,
            trigger_value: Some(30),
            enabled,
            status: HealthStatus::Yellow,
            last_run_at: None,
            next_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_trigger_type_roundtrip() {
        for t in [TriggerType::Manual, TriggerType::Interval] {
            assert_eq!(t.as_str().parse::<TriggerType>().unwrap(), t);
        }
        assert!("cron".parse::<TriggerType>().is_err());
    }

    #[test]
    fn test_health_status_serde_lowercase() {
        let json = serde_json::to_string(&HealthStatus::Red).unwrap();
        assert_eq!(json, "\"red\"");
    }

    #[test]
    fn test_schedule_minutes() {
        assert_eq!(sample(TriggerType::Interval, true).schedule_minutes(), Some(30));
        assert_eq!(sample(TriggerType::Interval, false).schedule_minutes(), None);
        assert_eq!(sample(TriggerType::Manual, true).schedule_minutes(), None);
    }

    #[test]
    fn test_update_request_is_empty() {
        assert!(UpdateWorkflowRequest::default().is_empty());
        let req = UpdateWorkflowRequest {
            enabled: Some(false),
            ..Default::default()
        };
        assert!(!req.is_empty());
    }
}
