//! Coordination-service boundary.
//!
//! Every instance owns a subtree in the coordination service's hierarchical
//! namespace (see [`crate::names::instance_subtree`]). Install creates it,
//! uninstall removes it recursively, and the schema table leans on a
//! coordination-backed lock while seeding its ID counter.

use async_trait::async_trait;

/// Error types raised by the coordination-service boundary.
#[derive(Debug, thiserror::Error)]
pub enum CoordinationError {
    #[error("failed to connect to coordination service: {0}")]
    Connection(String),

    #[error("node operation failed on '{path}': {message}")]
    Node { path: String, message: String },

    #[error("failed to acquire lock '{0}'")]
    LockUnavailable(String),
}

/// Result type for coordination operations.
pub type CoordinationResult<T> = Result<T, CoordinationError>;

/// Client for the coordination service's hierarchical namespace.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    /// Create the subtree rooted at `path`, including any missing parents.
    /// Ensuring a subtree that already exists is a no-op.
    async fn ensure_subtree(&self, path: &str) -> CoordinationResult<()>;

    /// Recursively delete the subtree rooted at `path` and everything under
    /// it.
    async fn delete_subtree(&self, path: &str) -> CoordinationResult<()>;

    /// Close the connection to the coordination service.
    async fn close(&self) -> CoordinationResult<()>;
}

/// Factory for distributed locks living in the coordination namespace.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LockFactory: Send + Sync {
    /// Create a lock rooted at `path`. The lock is not held until
    /// [`DistributedLock::acquire`] succeeds.
    async fn lock(&self, path: &str) -> CoordinationResult<Box<dyn DistributedLock>>;
}

/// A single-holder lock backed by the coordination service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DistributedLock: Send + Sync {
    async fn acquire(&self) -> CoordinationResult<()>;

    async fn release(&self) -> CoordinationResult<()>;
}
