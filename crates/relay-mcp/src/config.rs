//! `McpServerConfig` (spec §3), grounded directly on `astrid-mcp::config`.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{McpError, McpResult};
use crate::governance_map::GovernanceOverride;

const SHELL_METACHARACTERS: [char; 4] = [';', '&', '|', '$'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Transport {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    Http {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(with = "duration_secs", default = "default_timeout")]
        timeout: Duration,
        #[serde(with = "duration_secs", default = "default_sse_read_timeout")]
        sse_read_timeout: Duration,
        #[serde(default = "default_true")]
        verify_ssl: bool,
    },
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_sse_read_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_true() -> bool {
    true
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    Trusted,
    Sandboxed,
    Untrusted,
}

impl Default for TrustLevel {
    fn default() -> Self {
        Self::Untrusted
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub auth_server: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<String>,
    pub canonical_uri: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    pub transport: Transport,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub trust_level: TrustLevel,
    #[serde(default)]
    pub governance_overrides: HashMap<String, GovernanceOverride>,
}

impl McpServerConfig {
    pub fn stdio(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: Transport::Stdio {
                command: command.into(),
                args: Vec::new(),
                env: HashMap::new(),
            },
            oauth: OAuthConfig::default(),
            trust_level: TrustLevel::default(),
            governance_overrides: HashMap::new(),
        }
    }

    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: Transport::Http {
                url: url.into(),
                headers: HashMap::new(),
                timeout: default_timeout(),
                sse_read_timeout: default_sse_read_timeout(),
                verify_ssl: true,
            },
            oauth: OAuthConfig::default(),
            trust_level: TrustLevel::default(),
            governance_overrides: HashMap::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        if let Transport::Stdio { args: a, .. } = &mut self.transport {
            *a = args;
        }
        self
    }

    pub fn with_oauth(mut self, auth_server: impl Into<String>, scopes: Vec<String>) -> Self {
        self.oauth.auth_server = Some(auth_server.into());
        self.oauth.scopes = Some(scopes);
        self
    }

    pub fn trusted(mut self) -> Self {
        self.trust_level = TrustLevel::Trusted;
        self
    }

    /// Validates the invariants named in spec §3: no shell metacharacters in
    /// a stdio command, `http(s)://`-prefixed URL for HTTP transport, and
    /// `auth_server`/`scopes` must be provided together.
    pub fn validate(&self) -> McpResult<()> {
        match &self.transport {
            Transport::Stdio { command, .. } => {
                if command.chars().any(|c| SHELL_METACHARACTERS.contains(&c)) {
                    return Err(McpError::InvalidConfig(format!(
                        "stdio command for {} contains a shell metacharacter",
                        self.name
                    )));
                }
            }
            Transport::Http { url, .. } => {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(McpError::InvalidConfig(format!(
                        "http transport url for {} must start with http:// or https://",
                        self.name
                    )));
                }
            }
        }

        if self.oauth.auth_server.is_some() != self.oauth.scopes.is_some() {
            return Err(McpError::InvalidConfig(format!(
                "server {}: auth_server and scopes must both be set or both be absent",
                self.name
            )));
        }

        Ok(())
    }
}
