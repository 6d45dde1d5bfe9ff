//! Environment-sourced settings, named after spec §6.4's `TA_*` variables.

use std::env;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("required setting {0} is not set")]
    Missing(&'static str),

    #[error("setting {name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// The `_MODULE`/`_CLASS` env var pairs in the source select a backend by
/// Python reflection (spec §9 "plugin discovery by reflection"). Here that
/// collapses to choosing among compiled-in implementations; the original
/// module/class strings are kept only as an opaque passthrough for operators
/// migrating a config file from the source system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    InMemory,
    External { module: String, class: String },
}

impl BackendKind {
    fn from_env(module_var: &'static str, class_var: &'static str) -> Self {
        match (env::var(module_var), env::var(class_var)) {
            (Ok(module), Ok(class)) => Self::External { module, class },
            _ => Self::InMemory,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub service_config_path: Option<String>,
    pub default_api_key: Option<String>,
    pub redis_url: Option<String>,
    pub persistence_backend: BackendKind,
    pub auth_storage_backend: BackendKind,
    pub mcp_discovery_backend: BackendKind,
    pub plugin_catalog_backend: BackendKind,
    pub oauth_redirect_uri: Option<String>,
    pub oauth_client_name: String,
    pub mcp_oauth_strict_https: bool,
    pub mcp_request_timeout: Duration,
    pub sse_read_timeout: Duration,
    pub oauth_flow_state_ttl: Duration,
    pub oauth_discovery_cache_ttl: Duration,
}

impl Settings {
    /// Reads settings from the process environment. Unlike the teacher's
    /// `astrid-config::loader::load`, there is no file layering here — the
    /// spec's C1 scope is "typed access to environment-sourced settings."
    pub fn from_env() -> Result<Self, SettingsError> {
        let strict_https = match env::var("TA_MCP_OAUTH_STRICT_HTTPS_VALIDATION") {
            Ok(value) => parse_bool("TA_MCP_OAUTH_STRICT_HTTPS_VALIDATION", &value)?,
            Err(_) => true,
        };

        if env::var("TA_OAUTH_REDIRECT_URI").is_err() {
            warn!(
                "TA_OAUTH_REDIRECT_URI is unset; the OAuth broker cannot initiate flows until it is configured"
            );
        }

        Ok(Self {
            service_config_path: env::var("TA_SERVICE_CONFIG").ok(),
            default_api_key: env::var("TA_API_KEY").ok(),
            redis_url: env::var("TA_REDIS_URL").ok(),
            persistence_backend: BackendKind::from_env(
                "TA_PERSISTENCE_MODULE",
                "TA_PERSISTENCE_CLASS",
            ),
            auth_storage_backend: BackendKind::from_env(
                "TA_AUTH_STORAGE_MANAGER_MODULE",
                "TA_AUTH_STORAGE_MANAGER_CLASS",
            ),
            mcp_discovery_backend: BackendKind::from_env(
                "TA_MCP_DISCOVERY_MODULE",
                "TA_MCP_DISCOVERY_CLASS",
            ),
            plugin_catalog_backend: BackendKind::from_env(
                "TA_PLUGIN_CATALOG_MODULE",
                "TA_PLUGIN_CATALOG_CLASS",
            ),
            oauth_redirect_uri: env::var("TA_OAUTH_REDIRECT_URI").ok(),
            oauth_client_name: env::var("TA_OAUTH_CLIENT_NAME")
                .unwrap_or_else(|_| "relay-agents".to_string()),
            mcp_oauth_strict_https: strict_https,
            mcp_request_timeout: Duration::from_secs(30),
            sse_read_timeout: Duration::from_secs(300),
            oauth_flow_state_ttl: Duration::from_secs(300),
            oauth_discovery_cache_ttl: Duration::from_secs(3600),
        })
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, SettingsError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(SettingsError::Invalid {
            name,
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}
