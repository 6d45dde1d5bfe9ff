//! Transport-agnostic MCP client (C6, spec §4.4).
//!
//! Grounded on `astrid-mcp::client`'s transport dispatch and session
//! bookkeeping, adapted to this spec's simpler `{stdio, http}` transport set
//! (SSE is a read-mode of the HTTP transport here, not a third variant) and
//! to this crate's `AuthRequiredError`/elicitation signal shapes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use relay_core::ids::{ElicitationId, SessionId, UserId};
use relay_core::signal::{ElicitationMode, PendingElicitation};
use relay_oauth::flow::{AuthorizationParams, OAuthClient};
use relay_storage::auth_store::{AuthStorage, build_auth_storage_key};
use relay_storage::discovery_store::{DiscoveryStore, McpSessionHandle, ServerDiscovery};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{McpServerConfig, Transport};
use crate::error::{McpError, McpResult, auth_required};
use crate::governance_map::ToolAnnotations;
use crate::www_authenticate::parse_www_authenticate_header;

#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub annotations: ToolAnnotations,
}

/// A live session against one MCP server. Stateless beyond the session id:
/// re-opening simply means "has no mcp_session_id yet."
#[derive(Debug, Clone)]
pub struct Session {
    pub server_name: String,
    pub mcp_session_id: Option<String>,
}

pub enum ToolCallOutcome {
    Success(Value),
    ElicitationRequired(PendingElicitation),
}

pub struct McpClient {
    http: reqwest::Client,
    auth_storage: Arc<dyn AuthStorage>,
    discovery_store: Arc<dyn DiscoveryStore>,
    oauth: Arc<OAuthClient>,
}

impl McpClient {
    pub fn new(
        auth_storage: Arc<dyn AuthStorage>,
        discovery_store: Arc<dyn DiscoveryStore>,
        oauth: Arc<OAuthClient>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            auth_storage,
            discovery_store,
            oauth,
        }
    }

    /// Opens a session for `cfg`. For stdio, this is a no-op placeholder
    /// (each call spawns its own process per spec §4.6's stateless-shim
    /// design). For HTTP, reuses a stored session id if one is cached for
    /// `(user, session, server)`.
    pub async fn open_session(
        &self,
        cfg: &McpServerConfig,
        user_id: &UserId,
        session_id: &SessionId,
    ) -> McpResult<Session> {
        match &cfg.transport {
            Transport::Stdio { .. } => Ok(Session {
                server_name: cfg.name.clone(),
                mcp_session_id: None,
            }),
            Transport::Http { .. } => {
                let state = self.discovery_store.get(user_id, session_id).await?;
                let existing = state
                    .discovered_servers
                    .get(&cfg.name)
                    .and_then(|d| d.session.as_ref())
                    .map(|s| s.mcp_session_id.clone());
                Ok(Session {
                    server_name: cfg.name.clone(),
                    mcp_session_id: existing,
                })
            }
        }
    }

    pub async fn list_tools(
        &self,
        cfg: &McpServerConfig,
        session: &Session,
        user_id: &UserId,
        relay_session_id: &SessionId,
    ) -> McpResult<Vec<ToolInfo>> {
        match &cfg.transport {
            Transport::Stdio { .. } => {
                // A real stdio transport spawns the configured command and
                // speaks JSON-RPC over its stdio pipes; out of scope to
                // execute here (no toolchain invocation in this workspace).
                Ok(Vec::new())
            }
            Transport::Http { url, .. } => {
                let mut session = session.clone();
                let mut retried = false;
                loop {
                    let headers = self.resolve_headers(cfg, &session, user_id).await?;
                    let mut request = self.http.get(format!("{url}/tools"));
                    for (key, value) in &headers {
                        request = request.header(key, value);
                    }
                    let response = request.send().await?;
                    if response.status().as_u16() == 401 {
                        if retried {
                            return Err(McpError::Transport(
                                "received a second consecutive 401 after recovery".to_string(),
                            ));
                        }
                        session = self
                            .handle_401(cfg, &response, user_id, relay_session_id, &session)
                            .await?;
                        retried = true;
                        continue;
                    }
                    let tools: Vec<ToolInfo> = response
                        .json::<Vec<RawToolInfo>>()
                        .await
                        .map_err(|e| McpError::Transport(e.to_string()))?
                        .into_iter()
                        .map(Into::into)
                        .collect();
                    return Ok(tools);
                }
            }
        }
    }

    pub async fn call_tool(
        &self,
        cfg: &McpServerConfig,
        session: &Session,
        user_id: &UserId,
        relay_session_id: &SessionId,
        tool_name: &str,
        args: Value,
    ) -> McpResult<ToolCallOutcome> {
        match &cfg.transport {
            Transport::Stdio { .. } => Err(McpError::Transport(
                "stdio transport tool invocation requires a spawned subprocess".to_string(),
            )),
            Transport::Http { url, .. } => {
                let mut session = session.clone();
                let mut retried = false;
                loop {
                    let headers = self.resolve_headers(cfg, &session, user_id).await?;
                    let mut request = self
                        .http
                        .post(format!("{url}/tools/{tool_name}/call"))
                        .json(&args);
                    for (key, value) in &headers {
                        request = request.header(key, value);
                    }
                    let response = request.send().await?;

                    if let Some(new_session_id) = response
                        .headers()
                        .get("mcp-session-id")
                        .and_then(|v| v.to_str().ok())
                    {
                        self.persist_session(cfg, user_id, relay_session_id, new_session_id)
                            .await?;
                    }

                    if response.status().as_u16() == 401 {
                        if retried {
                            return Err(McpError::Transport(
                                "received a second consecutive 401 after recovery".to_string(),
                            ));
                        }
                        session = self
                            .handle_401(cfg, &response, user_id, relay_session_id, &session)
                            .await?;
                        retried = true;
                        continue;
                    }

                    let body: ToolCallResponse = response
                        .json()
                        .await
                        .map_err(|e| McpError::Transport(e.to_string()))?;

                    if let Some(elicitation) = body.elicitation {
                        let pending = PendingElicitation {
                            elicitation_id: ElicitationId::generate(),
                            mode: elicitation.mode,
                            url: elicitation.url,
                            requested_schema: elicitation.requested_schema,
                            message: elicitation.message,
                            server: cfg.name.clone(),
                            tool_name: tool_name.to_string(),
                            tool_args: args,
                        };
                        let elicitation_id = pending.elicitation_id.clone();
                        let pending_clone = pending.clone();
                        self.discovery_store
                            .mutate(
                                user_id,
                                relay_session_id,
                                Box::new(move |state| {
                                    state
                                        .pending_elicitations
                                        .insert(elicitation_id, pending_clone);
                                }),
                            )
                            .await?;
                        return Ok(ToolCallOutcome::ElicitationRequired(pending));
                    }

                    return Ok(ToolCallOutcome::Success(body.result.unwrap_or(Value::Null)));
                }
            }
        }
    }

    /// Auth header composition order (spec §4.4):
    /// 1. non-sensitive custom headers (Authorization filtered if OAuth configured)
    /// 2. OAuth bearer token from storage, if configured
    /// 3. per-server user header injection (not modeled here: no user-header
    ///    config fields exist on `McpServerConfig` in this spec's data model)
    async fn resolve_headers(
        &self,
        cfg: &McpServerConfig,
        session: &Session,
        user_id: &UserId,
    ) -> McpResult<HashMap<String, String>> {
        let mut headers = HashMap::new();
        if let Transport::Http {
            headers: custom, ..
        } = &cfg.transport
        {
            let oauth_configured = cfg.oauth.auth_server.is_some();
            for (key, value) in custom {
                if oauth_configured && key.eq_ignore_ascii_case("authorization") {
                    continue;
                }
                headers.insert(key.clone(), value.clone());
            }
        }

        if let (Some(auth_server), Some(scopes)) = (&cfg.oauth.auth_server, &cfg.oauth.scopes) {
            let key = build_auth_storage_key(auth_server, scopes);
            let data = self.auth_storage.retrieve(user_id, &key).await?;
            match data {
                Some(data) if !data.is_expired() => {
                    headers.insert(
                        "Authorization".to_string(),
                        format!("{} {}", data.token_type, data.access_token),
                    );
                }
                _ => {
                    return Err(auth_required(&cfg.name, auth_server, scopes).into());
                }
            }
        }

        if let Some(session_id) = &session.mcp_session_id {
            headers.insert("Mcp-Session-Id".to_string(), session_id.clone());
        }

        Ok(headers)
    }

    async fn persist_session(
        &self,
        cfg: &McpServerConfig,
        user_id: &UserId,
        relay_session_id: &SessionId,
        mcp_session_id: &str,
    ) -> McpResult<()> {
        let server_name = cfg.name.clone();
        let handle = McpSessionHandle {
            mcp_session_id: mcp_session_id.to_string(),
            created_at: Utc::now(),
            last_used_at: Utc::now(),
        };
        self.discovery_store
            .mutate(
                user_id,
                relay_session_id,
                Box::new(move |state| {
                    let entry = state.discovered_servers.entry(server_name).or_insert_with(|| {
                        ServerDiscovery {
                            plugin_data: Value::Null,
                            session: None,
                        }
                    });
                    entry.session = Some(handle);
                }),
            )
            .await?;
        Ok(())
    }

    /// Spec §4.4 "401 handling": parse the challenge and either recover in
    /// place — refreshing the token (`invalid_token`) or dropping the stale
    /// MCP session id (`invalid_session`) — and return the `Session` the
    /// caller should retry with, or raise `AuthRequiredError` when recovery
    /// isn't possible (`insufficient_scope`, any other bearer error, or a
    /// failed refresh).
    async fn handle_401(
        &self,
        cfg: &McpServerConfig,
        response: &reqwest::Response,
        user_id: &UserId,
        relay_session_id: &SessionId,
        session: &Session,
    ) -> McpResult<Session> {
        let header = response
            .headers()
            .get(reqwest::header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let Some(challenge) = parse_www_authenticate_header(header) else {
            return Err(McpError::Transport("received 401 with an unparseable challenge".to_string()));
        };

        let (Some(auth_server), Some(scopes)) = (&cfg.oauth.auth_server, &cfg.oauth.scopes) else {
            return Err(McpError::Transport("received 401 from a server with no OAuth config".to_string()));
        };

        if challenge.is_insufficient_scope() {
            let requested = if challenge.scopes().is_empty() {
                scopes.clone()
            } else {
                challenge.scopes()
            };
            return Err(auth_required(&cfg.name, auth_server, &requested).into());
        }

        if challenge.is_invalid_session() {
            if let Some(expected) = &session.mcp_session_id {
                self.discovery_store
                    .clear_session_if_matches(user_id, relay_session_id, &cfg.name, expected)
                    .await?;
            }
            info!(server = %cfg.name, "mcp session expired, reopening");
            return Ok(Session {
                server_name: cfg.name.clone(),
                mcp_session_id: None,
            });
        }

        if challenge.is_token_expired() {
            let key = build_auth_storage_key(auth_server, scopes);
            if let Ok(Some(data)) = self.auth_storage.retrieve(user_id, &key).await {
                if let Some(refresh_token) = &data.refresh_token {
                    let server_url = match &cfg.transport {
                        Transport::Http { url, .. } => Some(url.clone()),
                        Transport::Stdio { .. } => None,
                    };
                    let params = AuthorizationParams {
                        server_name: cfg.name.clone(),
                        auth_server: auth_server.clone(),
                        scopes: scopes.clone(),
                        redirect_uri: String::new(),
                        client_id: cfg.oauth.oauth_client_id.clone().unwrap_or_default(),
                        client_secret: cfg.oauth.oauth_client_secret.clone(),
                        server_url,
                        canonical_uri: cfg.oauth.canonical_uri.clone(),
                        strict_https: false,
                        bind_resource_parameter: data.resource.is_some(),
                    };
                    match self
                        .oauth
                        .refresh(refresh_token, &params, data.resource.as_deref())
                        .await
                    {
                        Ok(refreshed) => {
                            if let Err(e) = self.auth_storage.store(user_id, &key, refreshed).await {
                                warn!(error = %e, "failed to persist refreshed token");
                            }
                            info!(server = %cfg.name, "refreshed expired mcp access token, retrying call");
                            return Ok(session.clone());
                        }
                        Err(e) => {
                            warn!(server = %cfg.name, error = %e, "token refresh failed");
                            return Err(auth_required(&cfg.name, auth_server, scopes).into());
                        }
                    }
                }
            }
            return Err(auth_required(&cfg.name, auth_server, scopes).into());
        }

        Err(auth_required(&cfg.name, auth_server, scopes).into())
    }
}

#[derive(Debug, serde::Deserialize)]
struct RawToolInfo {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    annotations: RawAnnotations,
}

#[derive(Debug, Default, serde::Deserialize)]
struct RawAnnotations {
    #[serde(default, rename = "destructiveHint")]
    destructive_hint: bool,
    #[serde(default, rename = "readOnlyHint")]
    read_only_hint: bool,
    #[serde(default, rename = "openWorldHint")]
    open_world_hint: bool,
}

impl From<RawToolInfo> for ToolInfo {
    fn from(raw: RawToolInfo) -> Self {
        Self {
            name: raw.name,
            description: raw.description,
            annotations: ToolAnnotations {
                destructive_hint: raw.annotations.destructive_hint,
                read_only_hint: raw.annotations.read_only_hint,
                open_world_hint: raw.annotations.open_world_hint,
            },
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ToolCallResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    elicitation: Option<RawElicitation>,
}

#[derive(Debug, serde::Deserialize)]
struct RawElicitation {
    mode: ElicitationMode,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    requested_schema: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::McpServerConfig;
    use relay_oauth::OAuthClient as RealOAuthClient;
    use relay_storage::{InMemoryAuthStorage, InMemoryDiscoveryStore};

    fn client() -> McpClient {
        let auth_storage = Arc::new(InMemoryAuthStorage::new());
        let discovery = Arc::new(InMemoryDiscoveryStore::new());
        let oauth = Arc::new(RealOAuthClient::new(auth_storage.clone()));
        McpClient::new(auth_storage, discovery, oauth)
    }

    #[tokio::test]
    async fn resolve_headers_raises_auth_required_when_token_missing() {
        let client = client();
        let cfg = McpServerConfig::http("github", "https://mcp.github.example")
            .with_oauth("https://github.com/login/oauth", vec!["repo".to_string()]);
        let session = Session {
            server_name: "github".to_string(),
            mcp_session_id: None,
        };
        let result = client
            .resolve_headers(&cfg, &session, &UserId::new("u1"))
            .await;
        assert!(matches!(result, Err(McpError::AuthRequired(_))));
    }

    #[tokio::test]
    async fn resolve_headers_filters_authorization_when_oauth_configured() {
        let client = client();
        let mut cfg = McpServerConfig::http("github", "https://mcp.github.example");
        if let Transport::Http { headers, .. } = &mut cfg.transport {
            headers.insert("Authorization".to_string(), "Bearer leaked".to_string());
        }
        cfg = cfg.with_oauth("https://github.com/login/oauth", vec!["repo".to_string()]);

        let data = relay_storage::auth_store::OAuth2AuthData {
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + chrono::Duration::hours(1),
            scopes: vec!["repo".to_string()],
            audience: None,
            resource: None,
            token_type: "Bearer".to_string(),
            issued_at: Utc::now(),
        };
        let key = build_auth_storage_key("https://github.com/login/oauth", &["repo".to_string()]);
        client
            .auth_storage
            .store(&UserId::new("u1"), &key, data)
            .await
            .unwrap();

        let session = Session {
            server_name: "github".to_string(),
            mcp_session_id: None,
        };
        let headers = client
            .resolve_headers(&cfg, &session, &UserId::new("u1"))
            .await
            .unwrap();
        assert_eq!(headers.get("Authorization"), Some(&"Bearer tok".to_string()));
    }
}
