//! Governance derivation from MCP tool annotations (spec §4.4).
//!
//! Structurally modeled on `astrid-mcp::capabilities::convert`'s
//! annotation-to-policy mapping.

use relay_core::governance::{Cost, DataSensitivity, Governance};
use serde::{Deserialize, Serialize};

use crate::config::TrustLevel;

/// Manual per-field governance patch from config (spec §4.4: overrides take
/// precedence over annotations/trust-level bias **field-by-field**, so an
/// operator setting only `requires_hitl` must not clobber `cost` or
/// `data_sensitivity` back to some override default).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceOverride {
    #[serde(default)]
    pub requires_hitl: Option<bool>,
    #[serde(default)]
    pub cost: Option<Cost>,
    #[serde(default)]
    pub data_sensitivity: Option<DataSensitivity>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolAnnotations {
    pub destructive_hint: bool,
    pub read_only_hint: bool,
    pub open_world_hint: bool,
}

/// Applies the spec §4.4 annotation table, then the per-server `trust_level`
/// bias, in that order. Callers apply `governance_overrides` afterward,
/// field-by-field, taking final precedence.
pub fn derive_governance(annotations: ToolAnnotations, trust_level: TrustLevel) -> Governance {
    let mut governance = Governance::new(false, Cost::Low, DataSensitivity::Public);

    if annotations.destructive_hint {
        governance.requires_hitl = true;
        governance.cost = governance.cost.max(Cost::Medium);
    }
    if annotations.read_only_hint {
        governance.requires_hitl = false;
        governance.cost = Cost::Low;
        governance.data_sensitivity = DataSensitivity::Public;
    }
    if annotations.open_world_hint {
        governance.data_sensitivity = governance.data_sensitivity.max(DataSensitivity::Proprietary);
    }

    match trust_level {
        TrustLevel::Trusted => {
            if !annotations.destructive_hint {
                governance.requires_hitl = false;
            }
        }
        TrustLevel::Sandboxed => {}
        TrustLevel::Untrusted => {
            governance.requires_hitl = true;
        }
    }

    governance
}

/// Applies manual `governance_overrides` from config, field-by-field, taking
/// final precedence over both annotations and trust-level bias. Fields left
/// `None` in the override fall through to `base` unchanged.
pub fn apply_overrides(base: Governance, overrides: Option<&GovernanceOverride>) -> Governance {
    let Some(o) = overrides else {
        return base;
    };
    Governance {
        requires_hitl: o.requires_hitl.unwrap_or(base.requires_hitl),
        cost: o.cost.unwrap_or(base.cost),
        data_sensitivity: o.data_sensitivity.unwrap_or(base.data_sensitivity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destructive_tool_requires_hitl_with_at_least_medium_cost() {
        let g = derive_governance(
            ToolAnnotations {
                destructive_hint: true,
                ..Default::default()
            },
            TrustLevel::Sandboxed,
        );
        assert!(g.requires_hitl);
        assert!(g.cost >= Cost::Medium);
    }

    #[test]
    fn read_only_tool_is_low_risk() {
        let g = derive_governance(
            ToolAnnotations {
                read_only_hint: true,
                ..Default::default()
            },
            TrustLevel::Sandboxed,
        );
        assert!(!g.requires_hitl);
        assert_eq!(g.cost, Cost::Low);
        assert_eq!(g.data_sensitivity, DataSensitivity::Public);
    }

    #[test]
    fn trusted_server_suppresses_hitl_for_non_destructive_tools() {
        let g = derive_governance(ToolAnnotations::default(), TrustLevel::Trusted);
        assert!(!g.requires_hitl);
    }

    #[test]
    fn untrusted_server_forces_hitl_regardless_of_hints() {
        let g = derive_governance(
            ToolAnnotations {
                read_only_hint: true,
                ..Default::default()
            },
            TrustLevel::Untrusted,
        );
        assert!(g.requires_hitl);
    }

    #[test]
    fn trusted_cannot_suppress_hitl_for_destructive_tools() {
        let g = derive_governance(
            ToolAnnotations {
                destructive_hint: true,
                ..Default::default()
            },
            TrustLevel::Trusted,
        );
        assert!(g.requires_hitl);
    }

    #[test]
    fn override_takes_final_precedence() {
        let base = derive_governance(ToolAnnotations::default(), TrustLevel::Trusted);
        let overridden = GovernanceOverride {
            requires_hitl: Some(true),
            cost: Some(Cost::High),
            data_sensitivity: Some(DataSensitivity::Sensitive),
        };
        let result = apply_overrides(base, Some(&overridden));
        assert_eq!(result, Governance::new(true, Cost::High, DataSensitivity::Sensitive));
    }

    #[test]
    fn override_only_touches_the_fields_it_sets() {
        let base = Governance::new(false, Cost::Low, DataSensitivity::Public);
        let overridden = GovernanceOverride {
            requires_hitl: Some(true),
            cost: None,
            data_sensitivity: None,
        };
        let result = apply_overrides(base, Some(&overridden));
        assert!(result.requires_hitl);
        assert_eq!(result.cost, Cost::Low);
        assert_eq!(result.data_sensitivity, DataSensitivity::Public);
    }
}
