//! Governance metadata attached to every catalog tool.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cost {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSensitivity {
    Public,
    Proprietary,
    Confidential,
    Sensitive,
}

/// Risk classification of a single tool, derived either from static catalog
/// entries or from MCP tool annotations (see `relay_mcp::governance_map`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Governance {
    pub requires_hitl: bool,
    pub cost: Cost,
    pub data_sensitivity: DataSensitivity,
}

impl Governance {
    pub const fn new(requires_hitl: bool, cost: Cost, data_sensitivity: DataSensitivity) -> Self {
        Self {
            requires_hitl,
            cost,
            data_sensitivity,
        }
    }

    /// The conservative default for any tool the catalog knows nothing about.
    pub const fn unknown() -> Self {
        Self::new(true, Cost::Medium, DataSensitivity::Proprietary)
    }
}

impl Default for Governance {
    fn default() -> Self {
        Self::unknown()
    }
}
