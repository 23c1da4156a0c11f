//! Tasklane Client
//!
//! API client for the Tasklane server providing:
//! - Session management with durable token storage
//! - Automatic access token refresh on 401, serialized through a single
//!   in-flight gate so concurrent recoveries never race the server's
//!   one-time-use rotation
//! - Optimistic task mutations with rollback on failure
//!
//! # Usage
//!
//! ```rust,ignore
//! use tasklane_client::{ApiClient, ClientConfig, TaskSyncEngine};
//!
//! let client = ApiClient::new(ClientConfig::new(
//!     "http://localhost:5000/api",
//!     "/tmp/tasklane-session.json",
//! ))?;
//! client.login("ada@example.com", "hunter2").await?;
//!
//! let engine = TaskSyncEngine::new(client.into());
//! engine.load(&Default::default()).await?;
//! ```

pub mod error;
pub mod http;
pub mod models;
pub mod session;
pub mod storage;
pub mod sync;

pub use error::ClientError;
pub use http::{ApiClient, ClientConfig};
pub use models::*;
pub use session::SessionManager;
pub use storage::SessionStore;
pub use sync::TaskSyncEngine;
