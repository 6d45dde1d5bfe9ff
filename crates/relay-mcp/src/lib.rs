//! MCP Client and Plugin Registry (C6, C8; spec §4.4, §4.6).

pub mod client;
pub mod config;
pub mod error;
pub mod governance_map;
pub mod registry;
pub mod www_authenticate;

pub use client::{McpClient, Session, ToolCallOutcome, ToolInfo};
pub use config::{McpServerConfig, OAuthConfig, Transport, TrustLevel};
pub use error::{AuthRequiredError, McpError, McpResult, aggregate_auth_required, auth_required};
pub use governance_map::{GovernanceOverride, ToolAnnotations, apply_overrides, derive_governance};
pub use registry::PluginRegistry;
pub use www_authenticate::{WwwAuthenticateChallenge, build_www_authenticate_header, parse_www_authenticate_header};
