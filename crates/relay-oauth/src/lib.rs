//! OAuth Broker (C7, spec §4.5).
//!
//! Grounded on `original_source/.../auth/oauth_client.py` (`OAuthClient`),
//! `oauth_state_manager.py` (`OAuthStateManager`), and `server_metadata.py`
//! (`AuthServerMetadata`/`ProtectedResourceMetadata`); the discovery cache
//! goes beyond the Python original, whose fetch methods were left as
//! `NotImplementedError` stubs (see DESIGN.md and SPEC_FULL.md §4.5 supplement).

pub mod discovery;
pub mod error;
pub mod flow;
pub mod resource;
pub mod state;

pub use discovery::{AuthServerMetadata, DiscoveryCache, ProtectedResourceMetadata};
pub use error::{OAuthError, OAuthResult};
pub use flow::{AuthorizationParams, OAuthClient};
pub use resource::canonical_resource_uri;
pub use state::{OAuthFlowState, OAuthStateManager};
