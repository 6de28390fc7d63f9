use crate::coordination::CoordinationError;

/// Error types that can occur while installing or uninstalling an instance.
#[derive(Debug, thiserror::Error)]
pub enum InstallerError {
    /// The URI carries no instance name, or the name is malformed. Raised
    /// before any remote call is made.
    #[error("invalid instance name: {0}")]
    InvalidName(String),

    /// The install target is already provisioned on the cluster.
    #[error("instance '{0}' already exists")]
    AlreadyExists(String),

    /// The uninstall target does not exist on the cluster.
    #[error("instance '{0}' is not installed")]
    NotInstalled(String),

    /// The caller lacks grant-level privileges on the instance.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// A failure from the storage cluster's admin path or a table operation.
    #[error("cluster error: {0}")]
    Remote(String),

    /// A failure from the coordination service, wrapped before surfacing.
    #[error("coordination service error: {0}")]
    Coordination(#[from] CoordinationError),
}

/// Result type for installer operations.
pub type InstallerResult<T> = Result<T, InstallerError>;
