use relay_mcp::AuthRequiredError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    /// Aggregated across every configured MCP server that needs user OAuth
    /// before this kernel can be built (spec §4.9 step 3).
    #[error("{} mcp server(s) require authorization", .0.len())]
    AuthRequired(Vec<AuthRequiredError>),

    #[error("unknown local plugin: {0}")]
    UnknownLocalPlugin(String),
}

pub type KernelResult<T> = Result<T, KernelError>;
