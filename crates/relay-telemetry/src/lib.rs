//! Logging setup, grounded near-verbatim on `astrid-telemetry::lib` (it was
//! already minimal in the teacher).

use relay_core::ids::{RequestId, SessionId, TaskId};
use tracing::Span;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub default_directive: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_directive: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Installs a global `tracing` subscriber. Idempotent-by-convention: callers
/// invoke this once from `main`.
pub fn setup_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.format {
        LogFormat::Pretty => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

/// Opens a tracing span carrying the ids that every log line within one turn
/// should be tagged with.
pub struct RequestContext {
    pub span: Span,
}

impl RequestContext {
    pub fn new(task_id: &TaskId, session_id: &SessionId, request_id: &RequestId) -> Self {
        let span = tracing::info_span!(
            "turn",
            task_id = %task_id,
            session_id = %session_id,
            request_id = %request_id,
        );
        Self { span }
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}
