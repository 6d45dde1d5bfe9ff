//! HTTP Surface (C14, spec §6.1): routes `invoke`/`invoke/stream`/`resume`/
//! `oauth`/`health` onto the Task Orchestrator and OAuth Broker.
//!
//! Grounded on `loom::serve`'s axum `AppState`/`router` shape — the teacher
//! repo carries no HTTP framework at all, so this crate's stack is adopted
//! from elsewhere in the pack rather than generalized from the teacher
//! (see DESIGN.md).

pub mod app;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod wire;

pub use app::{AppState, router};
pub use auth::{AuthorizeError, BearerAsUserId, RequestAuthorizer};
pub use error::ApiError;
