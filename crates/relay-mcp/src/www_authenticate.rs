//! `WWW-Authenticate` Bearer challenge parsing and building (RFC 6750/9728).
//!
//! Grounded on `original_source/.../auth/oauth_error_handler.py`:
//! `parse_www_authenticate_header` / `build_www_authenticate_header` /
//! `WWWAuthenticateChallenge`.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WwwAuthenticateChallenge {
    pub realm: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub error_uri: Option<String>,
    pub scope: Option<String>,
    pub resource_metadata: Option<String>,
}

impl WwwAuthenticateChallenge {
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn is_token_expired(&self) -> bool {
        self.error.as_deref() == Some("invalid_token")
    }

    pub fn is_insufficient_scope(&self) -> bool {
        self.error.as_deref() == Some("insufficient_scope")
    }

    /// The MCP server no longer recognizes the session id the client sent
    /// (spec §4.4 session affinity) — not a token problem, handled by
    /// clearing the stored session id and reopening.
    pub fn is_invalid_session(&self) -> bool {
        self.error.as_deref() == Some("invalid_session")
    }

    /// Any error besides `invalid_token`/`invalid_session` should drive the
    /// client straight to re-authorization rather than attempting a token
    /// refresh or session reopen first.
    pub fn requires_reauth(&self) -> bool {
        self.is_insufficient_scope()
            || (self.error.is_some() && !self.is_token_expired() && !self.is_invalid_session())
    }
}

fn param_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(\w+)=(?:"([^"]*)"|([^\s,]+))"#).unwrap())
}

/// Parses the value of a `WWW-Authenticate` header, expecting a `Bearer`
/// challenge. Returns `None` if the scheme isn't Bearer. Unknown fields are
/// ignored (spec §8.8).
pub fn parse_www_authenticate_header(header: &str) -> Option<WwwAuthenticateChallenge> {
    let trimmed = header.trim();
    if !trimmed.to_ascii_lowercase().starts_with("bearer") {
        return None;
    }
    let params_part = trimmed[6..].trim_start();

    let mut challenge = WwwAuthenticateChallenge::default();
    for capture in param_regex().captures_iter(params_part) {
        let key = &capture[1];
        let value = capture
            .get(2)
            .map(|m| m.as_str())
            .or_else(|| capture.get(3).map(|m| m.as_str()))
            .unwrap_or_default()
            .to_string();
        match key {
            "realm" => challenge.realm = Some(value),
            "error" => challenge.error = Some(value),
            "error_description" => challenge.error_description = Some(value),
            "error_uri" => challenge.error_uri = Some(value),
            "scope" => challenge.scope = Some(value),
            "resource_metadata" => challenge.resource_metadata = Some(value),
            _ => {}
        }
    }
    Some(challenge)
}

/// Builds a `WWW-Authenticate` header value from challenge fields — the
/// inverse of `parse_www_authenticate_header`, used in tests for the
/// round-trip property (spec §8.8).
pub fn build_www_authenticate_header(challenge: &WwwAuthenticateChallenge) -> String {
    let mut params = Vec::new();
    if let Some(realm) = &challenge.realm {
        params.push(format!(r#"realm="{realm}""#));
    }
    if let Some(error) = &challenge.error {
        params.push(format!(r#"error="{error}""#));
    }
    if let Some(desc) = &challenge.error_description {
        params.push(format!(r#"error_description="{desc}""#));
    }
    if let Some(uri) = &challenge.error_uri {
        params.push(format!(r#"error_uri="{uri}""#));
    }
    if let Some(scope) = &challenge.scope {
        params.push(format!(r#"scope="{scope}""#));
    }
    if let Some(meta) = &challenge.resource_metadata {
        params.push(format!(r#"resource_metadata="{meta}""#));
    }
    format!("Bearer {}", params.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_invalid_token_challenge() {
        let header = r#"Bearer realm="mcp", error="invalid_token", error_description="token expired""#;
        let challenge = parse_www_authenticate_header(header).unwrap();
        assert_eq!(challenge.realm.as_deref(), Some("mcp"));
        assert!(challenge.is_token_expired());
        assert!(!challenge.requires_reauth());
    }

    #[test]
    fn parses_insufficient_scope_challenge() {
        let header = r#"Bearer error="insufficient_scope", scope="repo admin""#;
        let challenge = parse_www_authenticate_header(header).unwrap();
        assert_eq!(challenge.scopes(), vec!["repo", "admin"]);
        assert!(challenge.is_insufficient_scope());
        assert!(challenge.requires_reauth());
    }

    #[test]
    fn non_bearer_scheme_returns_none() {
        assert!(parse_www_authenticate_header("Basic realm=\"x\"").is_none());
    }

    #[test]
    fn parse_build_round_trip() {
        let original = WwwAuthenticateChallenge {
            realm: Some("mcp".to_string()),
            error: Some("insufficient_scope".to_string()),
            error_description: Some("need more scope".to_string()),
            error_uri: None,
            scope: Some("repo".to_string()),
            resource_metadata: Some("https://example.com/.well-known/oauth-protected-resource".to_string()),
        };
        let header = build_www_authenticate_header(&original);
        let parsed = parse_www_authenticate_header(&header).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let header = r#"Bearer error="invalid_token", unknown_field="whatever""#;
        let challenge = parse_www_authenticate_header(header).unwrap();
        assert!(challenge.is_token_expired());
    }

    #[test]
    fn parses_invalid_session_challenge() {
        let header = r#"Bearer error="invalid_session""#;
        let challenge = parse_www_authenticate_header(header).unwrap();
        assert!(challenge.is_invalid_session());
        assert!(!challenge.requires_reauth());
    }
}
