//! Content hashing for MCP server binary pinning (`McpServerConfig::binary_hash`).
//!
//! Grounded on `astrid-crypto::ContentHash` as used from
//! `astrid-mcp::config::ServerConfig::verify_binary`.

use std::fmt;

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn hash(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, expected_hex: &str) -> bool {
        self.0.eq_ignore_ascii_case(expected_hex)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
