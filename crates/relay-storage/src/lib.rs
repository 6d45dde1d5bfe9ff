//! Persistence interfaces for the relay agent orchestration runtime (C2–C5).
//!
//! Concrete production backends (Redis/DynamoDB/Postgres/Chroma) are
//! explicitly out of scope: this crate defines the trait boundaries plus an
//! in-memory reference implementation of each, suitable for tests and for a
//! single-process deployment.

pub mod auth_store;
pub mod catalog;
pub mod discovery_store;
pub mod error;
pub mod task_store;

pub use auth_store::{AuthStorage, InMemoryAuthStorage};
pub use catalog::{InMemoryPluginCatalog, PluginCatalog, tool_id};
pub use discovery_store::{DiscoveryStore, InMemoryDiscoveryStore};
pub use error::{StorageError, StorageResult};
pub use task_store::{InMemoryTaskPersistence, TaskPersistence};
