//! Auth Storage (C2, spec §4.2).
//!
//! Grounded on `original_source/.../auth/oauth_client.py`'s use of a
//! composite `auth_server|sorted-scopes` key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use relay_core::ids::UserId;
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;

/// Stored OAuth credentials for one `(user, composite_key)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuth2AuthData {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub scopes: Vec<String>,
    pub audience: Option<String>,
    pub resource: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub issued_at: DateTime<Utc>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuth2AuthData {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// True iff not expired AND (`resource` absent or matches) AND
    /// (`audience` absent or matches).
    pub fn is_valid_for_resource(&self, uri: &str) -> bool {
        if self.is_expired() {
            return false;
        }
        if let Some(resource) = &self.resource {
            if resource != uri {
                return false;
            }
        }
        if let Some(audience) = &self.audience {
            if audience != uri {
                return false;
            }
        }
        true
    }
}

/// Deterministic composite key: `auth_server`, or `auth_server|sorted-scopes`
/// when scopes are non-empty. Distinct scope sets yield distinct keys;
/// permutations of the same set yield the same key (spec §8.4).
pub fn build_auth_storage_key(auth_server: &str, scopes: &[String]) -> String {
    if scopes.is_empty() {
        return auth_server.to_string();
    }
    let mut sorted: Vec<&str> = scopes.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    format!("{auth_server}|{}", sorted.join("|"))
}

#[async_trait]
pub trait AuthStorage: Send + Sync {
    async fn store(
        &self,
        user_id: &UserId,
        composite_key: &str,
        data: OAuth2AuthData,
    ) -> StorageResult<()>;

    async fn retrieve(
        &self,
        user_id: &UserId,
        composite_key: &str,
    ) -> StorageResult<Option<OAuth2AuthData>>;

    async fn delete(&self, user_id: &UserId, composite_key: &str) -> StorageResult<()>;

    async fn clear_user_data(&self, user_id: &UserId) -> StorageResult<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryAuthStorage {
    entries: DashMap<(UserId, String), OAuth2AuthData>,
}

impl InMemoryAuthStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthStorage for InMemoryAuthStorage {
    async fn store(
        &self,
        user_id: &UserId,
        composite_key: &str,
        data: OAuth2AuthData,
    ) -> StorageResult<()> {
        self.entries
            .insert((user_id.clone(), composite_key.to_string()), data);
        Ok(())
    }

    async fn retrieve(
        &self,
        user_id: &UserId,
        composite_key: &str,
    ) -> StorageResult<Option<OAuth2AuthData>> {
        Ok(self
            .entries
            .get(&(user_id.clone(), composite_key.to_string()))
            .map(|entry| entry.clone()))
    }

    async fn delete(&self, user_id: &UserId, composite_key: &str) -> StorageResult<()> {
        self.entries
            .remove(&(user_id.clone(), composite_key.to_string()));
        Ok(())
    }

    async fn clear_user_data(&self, user_id: &UserId) -> StorageResult<()> {
        self.entries.retain(|(uid, _), _| uid != user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scopes_use_bare_auth_server() {
        assert_eq!(build_auth_storage_key("https://x", &[]), "https://x");
    }

    #[test]
    fn key_is_independent_of_scope_order() {
        let a = build_auth_storage_key(
            "https://x",
            &["repo".to_string(), "read:org".to_string()],
        );
        let b = build_auth_storage_key(
            "https://x",
            &["read:org".to_string(), "repo".to_string()],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_scope_sets_yield_distinct_keys() {
        let a = build_auth_storage_key("https://x", &["repo".to_string()]);
        let b = build_auth_storage_key("https://x", &["admin".to_string()]);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn store_then_retrieve_round_trips() {
        let store = InMemoryAuthStorage::new();
        let user = UserId::new("u1");
        let data = OAuth2AuthData {
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + chrono::Duration::hours(1),
            scopes: vec!["repo".to_string()],
            audience: None,
            resource: Some("https://mcp.example/a".to_string()),
            token_type: "Bearer".to_string(),
            issued_at: Utc::now(),
        };
        store.store(&user, "key", data.clone()).await.unwrap();
        let got = store.retrieve(&user, "key").await.unwrap().unwrap();
        assert_eq!(got.access_token, "tok");
        assert!(got.is_valid_for_resource("https://mcp.example/a"));
        assert!(!got.is_valid_for_resource("https://mcp.example/b"));
    }

    #[tokio::test]
    async fn mismatched_audience_is_invalid_even_when_resource_matches() {
        let data = OAuth2AuthData {
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + chrono::Duration::hours(1),
            scopes: vec![],
            audience: Some("https://mcp.example/other".to_string()),
            resource: Some("https://mcp.example/a".to_string()),
            token_type: "Bearer".to_string(),
            issued_at: Utc::now(),
        };
        assert!(!data.is_valid_for_resource("https://mcp.example/a"));
    }

    #[tokio::test]
    async fn expired_token_is_never_valid() {
        let data = OAuth2AuthData {
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: Utc::now() - chrono::Duration::seconds(1),
            scopes: vec![],
            audience: None,
            resource: None,
            token_type: "Bearer".to_string(),
            issued_at: Utc::now(),
        };
        assert!(!data.is_valid_for_resource("https://anything"));
    }
}
