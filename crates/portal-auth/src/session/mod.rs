//! Server-side sessions bound to OAuth tokens.
//!
//! [`SessionStore`] owns the [`UserSession`] lifecycle on top of a
//! [`SessionBackend`]. Two backends are provided:
//!
//! - [`MemorySessionBackend`] for a single instance and tests
//! - [`RedisSessionBackend`] shared across instances
//!
//! # Security Considerations
//!
//! - The browser only ever sees the opaque session id
//! - Tokens live in the backend; never log them
//! - Expiry is enforced on every read, independent of backend TTLs

mod memory;
mod model;
mod redis_backend;
mod store;

pub use memory::MemorySessionBackend;
pub use model::UserSession;
pub use redis_backend::RedisSessionBackend;
pub use store::SessionStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::AuthResult;

/// Key/value storage for serialized sessions.
///
/// Values are opaque bytes; the store handles serialization and expiry
/// semantics. Implementations must honour `ttl` as an upper bound on how long
/// a value is retrievable.
#[async_trait]
pub trait SessionBackend: Send + Sync + std::fmt::Debug {
    /// Stores `value` under `key` for at most `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backend is unavailable.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> AuthResult<()>;

    /// Loads the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backend is unavailable.
    async fn get(&self, key: &str) -> AuthResult<Option<Vec<u8>>>;

    /// Removes the value under `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backend is unavailable.
    async fn delete(&self, key: &str) -> AuthResult<()>;

    /// Checks backend connectivity for readiness.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backend is unreachable.
    async fn ping(&self) -> AuthResult<()>;

    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;
}
