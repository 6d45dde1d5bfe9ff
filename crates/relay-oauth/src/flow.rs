//! Authorization-code + PKCE flow (spec §4.5).
//!
//! Grounded on `original_source/.../auth/oauth_client.py` (`OAuthClient`):
//! `build_authorization_url`, `exchange_code_for_tokens`,
//! `refresh_access_token`, `initiate_authorization_flow`, `handle_callback`.

use chrono::{Duration, Utc};
use relay_core::ids::UserId;
use relay_crypto::pkce;
use relay_storage::auth_store::{AuthStorage, OAuth2AuthData, build_auth_storage_key};
use serde::Deserialize;
use tracing::info;

use crate::discovery::DiscoveryCache;
use crate::error::{OAuthError, OAuthResult};
use crate::resource::{canonical_resource_uri, is_https_or_local_exception};
use crate::state::{OAuthFlowState, OAuthStateManager};

/// Everything the broker needs about one MCP server to run a flow against it.
/// Deliberately independent of `relay_mcp::McpServerConfig` so this crate has
/// no dependency on `relay-mcp` (which itself depends on this crate for
/// refresh/challenge handling — see DESIGN.md dependency notes).
#[derive(Debug, Clone)]
pub struct AuthorizationParams {
    pub server_name: String,
    pub auth_server: String,
    pub scopes: Vec<String>,
    pub redirect_uri: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    /// The MCP server's own transport URL (HTTP transport only — stdio
    /// servers have none). Normalized into the resource/audience binding
    /// when `canonical_uri` isn't set explicitly; never the OAuth callback
    /// URL, which identifies this broker, not the server the token is for.
    pub server_url: Option<String>,
    /// Explicit `canonical_uri` override, else derived from `server_url`.
    pub canonical_uri: Option<String>,
    pub strict_https: bool,
    /// Whether to include `resource=` on the authorize URL (spec §4.5 step 6).
    pub bind_resource_parameter: bool,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: i64,
    refresh_token: Option<String>,
    scope: Option<String>,
    aud: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

pub struct OAuthClient {
    http: reqwest::Client,
    state_manager: OAuthStateManager,
    discovery: DiscoveryCache,
    auth_storage: std::sync::Arc<dyn AuthStorage>,
}

impl OAuthClient {
    pub fn new(auth_storage: std::sync::Arc<dyn AuthStorage>) -> Self {
        Self {
            http: reqwest::Client::new(),
            state_manager: OAuthStateManager::new(),
            discovery: DiscoveryCache::default(),
            auth_storage,
        }
    }

    pub fn state_manager(&self) -> &OAuthStateManager {
        &self.state_manager
    }

    pub fn discovery(&self) -> &DiscoveryCache {
        &self.discovery
    }

    /// Spec §4.5 "Initiation": returns the authorize URL the caller should
    /// redirect the user to.
    pub async fn initiate_authorization_flow(
        &self,
        params: &AuthorizationParams,
        user_id: &UserId,
    ) -> OAuthResult<String> {
        if params.strict_https
            && (!is_https_or_local_exception(&params.auth_server)
                || !is_https_or_local_exception(&params.redirect_uri))
        {
            return Err(OAuthError::InsecureEndpoint);
        }

        let resource = params
            .canonical_uri
            .clone()
            .or_else(|| params.server_url.as_deref().and_then(canonical_resource_uri));

        let verifier = pkce::generate_code_verifier();
        let challenge = pkce::generate_code_challenge(&verifier);
        let state = pkce::generate_code_verifier(); // same primitive: 32 random bytes, base64url

        self.state_manager.store(OAuthFlowState {
            state: state.clone(),
            verifier,
            user_id: user_id.clone(),
            server_name: params.server_name.clone(),
            resource: resource.clone(),
            scopes: params.scopes.clone(),
            created_at: Utc::now(),
        });

        let authorization_endpoint = match self.discovery.auth_server_metadata(&params.auth_server).await {
            Some(meta) => meta.authorization_endpoint,
            None => format!("{}/authorize", params.auth_server.trim_end_matches('/')),
        };

        let mut prm_discovered = false;
        if let Some(resource) = &resource {
            prm_discovered = self
                .discovery
                .protected_resource_metadata(resource)
                .await
                .is_some();
        }

        let mut url = url::Url::parse(&authorization_endpoint)
            .map_err(|e| OAuthError::TokenExchange(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &params.client_id)
                .append_pair("redirect_uri", &params.redirect_uri)
                .append_pair("scope", &params.scopes.join(" "))
                .append_pair("state", &state)
                .append_pair("code_challenge", &challenge)
                .append_pair("code_challenge_method", "S256");
            if let Some(resource) = &resource {
                if params.bind_resource_parameter || prm_discovered {
                    query.append_pair("resource", resource);
                }
            }
        }

        Ok(url.to_string())
    }

    /// Spec §4.5 "Callback".
    pub async fn handle_callback(
        &self,
        code: &str,
        state: &str,
        user_id: &UserId,
        params: &AuthorizationParams,
    ) -> OAuthResult<OAuth2AuthData> {
        let Some(flow) = self.state_manager.retrieve(state, user_id) else {
            return Err(OAuthError::FlowStateMissing);
        };

        let token_endpoint = match self.discovery.auth_server_metadata(&params.auth_server).await {
            Some(meta) => meta.token_endpoint,
            None => format!("{}/token", params.auth_server.trim_end_matches('/')),
        };

        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", params.redirect_uri.clone()),
            ("code_verifier", flow.verifier.clone()),
            ("client_id", params.client_id.clone()),
        ];
        if let Some(resource) = &flow.resource {
            form.push(("resource", resource.clone()));
        }
        if let Some(secret) = &params.client_secret {
            form.push(("client_secret", secret.clone()));
        }

        let response = self.http.post(&token_endpoint).form(&form).send().await?;
        if !response.status().is_success() {
            self.state_manager.delete(state);
            return Err(OAuthError::TokenExchange(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }
        let token: TokenResponse = response.json().await?;

        let granted_scopes = match &token.scope {
            Some(scope_str) => scope_str.split_whitespace().map(str::to_string).collect(),
            None => flow.scopes.clone(),
        };
        let offending: Vec<String> = granted_scopes
            .iter()
            .filter(|s| !flow.scopes.contains(s))
            .cloned()
            .collect();
        if !offending.is_empty() {
            // Rejected scopes must not be stored (spec §7 invariant).
            self.state_manager.delete(state);
            return Err(OAuthError::UnauthorizedScopes(offending));
        }

        let auth_data = OAuth2AuthData {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            scopes: granted_scopes,
            audience: token.aud,
            resource: flow.resource.clone(),
            token_type: token.token_type,
            issued_at: Utc::now(),
        };

        let key = build_auth_storage_key(&params.auth_server, &params.scopes);
        // Store happens-before delete: per spec §7, if the token is stored
        // the flow state must be deleted before the callback returns.
        self.auth_storage.store(user_id, &key, auth_data.clone()).await?;
        self.state_manager.delete(state);

        info!(server = %params.server_name, user_id = %user_id, "oauth callback completed");
        Ok(auth_data)
    }

    /// Identical to initial exchange except `grant_type=refresh_token`.
    /// OAuth 2.1 rotation: a returned refresh token replaces the stored one.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        params: &AuthorizationParams,
        resource: Option<&str>,
    ) -> OAuthResult<OAuth2AuthData> {
        let token_endpoint = match self.discovery.auth_server_metadata(&params.auth_server).await {
            Some(meta) => meta.token_endpoint,
            None => format!("{}/token", params.auth_server.trim_end_matches('/')),
        };

        let mut form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.to_string()),
            ("client_id", params.client_id.clone()),
        ];
        if let Some(resource) = resource {
            form.push(("resource", resource.to_string()));
        }
        if let Some(secret) = &params.client_secret {
            form.push(("client_secret", secret.clone()));
        }

        let response = self.http.post(&token_endpoint).form(&form).send().await?;
        if !response.status().is_success() {
            return Err(OAuthError::Refresh(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }
        let token: TokenResponse = response.json().await?;
        let scopes = match &token.scope {
            Some(scope_str) => scope_str.split_whitespace().map(str::to_string).collect(),
            None => params.scopes.clone(),
        };

        Ok(OAuth2AuthData {
            access_token: token.access_token,
            refresh_token: token.refresh_token.or_else(|| Some(refresh_token.to_string())),
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            scopes,
            audience: token.aud,
            resource: resource.map(str::to_string),
            token_type: token.token_type,
            issued_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_storage::InMemoryAuthStorage;
    use std::sync::Arc;

    fn params() -> AuthorizationParams {
        AuthorizationParams {
            server_name: "github".to_string(),
            auth_server: "https://github.com/login/oauth".to_string(),
            scopes: vec!["repo".to_string()],
            redirect_uri: "https://relay.example/oauth/github/callback".to_string(),
            client_id: "client-1".to_string(),
            client_secret: None,
            server_url: Some("https://mcp.github.example".to_string()),
            canonical_uri: None,
            strict_https: true,
            bind_resource_parameter: true,
        }
    }

    #[tokio::test]
    async fn initiate_flow_embeds_pkce_s256_and_state() {
        let storage = Arc::new(InMemoryAuthStorage::new());
        let client = OAuthClient::new(storage);
        let user = UserId::new("u1");
        let url = client
            .initiate_authorization_flow(&params(), &user)
            .await
            .unwrap();
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("response_type=code"));
    }

    #[tokio::test]
    async fn two_concurrent_initiations_yield_distinct_state_and_verifier() {
        let storage = Arc::new(InMemoryAuthStorage::new());
        let client = OAuthClient::new(storage);
        let user = UserId::new("u1");
        let url1 = client.initiate_authorization_flow(&params(), &user).await.unwrap();
        let url2 = client.initiate_authorization_flow(&params(), &user).await.unwrap();
        assert_ne!(url1, url2);
    }

    #[tokio::test]
    async fn the_bound_resource_is_the_mcp_server_url_not_the_callback_url() {
        let storage = Arc::new(InMemoryAuthStorage::new());
        let client = OAuthClient::new(storage);
        let url = client
            .initiate_authorization_flow(&params(), &UserId::new("u1"))
            .await
            .unwrap();
        assert!(url.contains("resource=https%3A%2F%2Fmcp.github.example"));
        assert!(!url.contains("relay.example"));
    }

    #[tokio::test]
    async fn insecure_endpoint_rejected_under_strict_https() {
        let storage = Arc::new(InMemoryAuthStorage::new());
        let client = OAuthClient::new(storage);
        let mut p = params();
        p.auth_server = "http://auth.example.com".to_string();
        let result = client
            .initiate_authorization_flow(&p, &UserId::new("u1"))
            .await;
        assert!(matches!(result, Err(OAuthError::InsecureEndpoint)));
    }

    #[tokio::test]
    async fn callback_with_unknown_state_is_rejected() {
        let storage = Arc::new(InMemoryAuthStorage::new());
        let client = OAuthClient::new(storage);
        let result = client
            .handle_callback("code", "nonexistent-state", &UserId::new("u1"), &params())
            .await;
        assert!(matches!(result, Err(OAuthError::FlowStateMissing)));
    }
}
