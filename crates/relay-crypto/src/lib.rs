//! PKCE key material (spec §4.5) and MCP server binary content-hashing
//! (spec §3 `McpServerConfig`).

pub mod hash;
pub mod pkce;

pub use hash::ContentHash;
pub use pkce::{generate_code_challenge, generate_code_verifier, validate_code_verifier, verify_challenge};
