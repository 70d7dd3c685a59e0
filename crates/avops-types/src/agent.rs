use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::AgentId;

/// An agent in the catalog. Workflows bind one agent to one recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    /// Unique, case-insensitive display name.
    pub name: String,
    /// Operational domain (e.g. "av", "it", "facilities").
    pub domain: String,
    /// Free-form agent configuration, always a JSON object.
    pub config_json: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Request to register a new agent.
#[derive(Debug, Clone, Default)]
pub struct CreateAgentRequest {
    pub name: String,
    pub domain: String,
    pub config_json: Option<serde_json::Value>,
}
