//! `GET /oauth/{server}/authorize` and `GET /oauth/{server}/callback`
//! (spec §4.5, §6.1): the redirect-based half of the OAuth Broker that a
//! human in a browser, rather than an MCP server, drives directly.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect};
use relay_core::ids::UserId;
use relay_mcp::{McpServerConfig, Transport};
use relay_oauth::AuthorizationParams;
use serde::Deserialize;

use crate::app::AppState;
use crate::error::ApiError;

fn authorization_params(state: &AppState, server: &McpServerConfig) -> Result<AuthorizationParams, ApiError> {
    let auth_server = server
        .oauth
        .auth_server
        .clone()
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, format!("server {} has no oauth configuration", server.name)))?;
    let scopes = server.oauth.scopes.clone().unwrap_or_default();
    let client_id = server
        .oauth
        .oauth_client_id
        .clone()
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, format!("server {} has no oauth_client_id", server.name)))?;
    let redirect_base = state
        .oauth_redirect_uri
        .clone()
        .ok_or_else(|| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "no oauth_redirect_uri configured"))?;

    let server_url = match &server.transport {
        Transport::Http { url, .. } => Some(url.clone()),
        Transport::Stdio { .. } => None,
    };

    Ok(AuthorizationParams {
        server_name: server.name.clone(),
        auth_server,
        scopes,
        redirect_uri: format!("{redirect_base}/oauth/{}/callback", server.name),
        client_id,
        client_secret: server.oauth.oauth_client_secret.clone(),
        server_url,
        canonical_uri: server.oauth.canonical_uri.clone(),
        strict_https: true,
        bind_resource_parameter: true,
    })
}

fn find_server<'a>(state: &'a AppState, name: &str) -> Result<&'a McpServerConfig, ApiError> {
    state
        .mcp_servers
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("no configured mcp server named {name}")))
}

async fn authorize_request(state: &AppState, headers: &HeaderMap) -> Result<UserId, ApiError> {
    let header = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    Ok(state.authorizer.authorize_request(header).await?)
}

pub async fn authorize(
    State(state): State<Arc<AppState>>,
    Path(server): Path<String>,
    headers: HeaderMap,
) -> Result<Redirect, ApiError> {
    let user_id = authorize_request(&state, &headers).await?;
    let server_config = find_server(&state, &server)?;
    let params = authorization_params(&state, server_config)?;

    let url = state.oauth.initiate_authorization_flow(&params, &user_id).await?;
    Ok(Redirect::to(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: String,
    state: String,
}

pub async fn callback(
    State(state): State<Arc<AppState>>,
    Path(server): Path<String>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = authorize_request(&state, &headers).await?;
    let server_config = find_server(&state, &server)?;
    let params = authorization_params(&state, server_config)?;

    state.oauth.handle_callback(&query.code, &query.state, &user_id, &params).await?;

    Ok(Html(format!("<html><body><p>Authorization complete for {server}. You may close this window.</p></body></html>")))
}
