//! Storage-cluster boundary.
//!
//! Everything the installer needs from the wide-column cluster is expressed
//! as a small set of capability traits so that remote clients can be
//! substituted in tests. A [`ClusterProvider`] hands out per-operation
//! handles; each handle is released exactly once via `close`, on every exit
//! path.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::Configuration;
use crate::coordination::{CoordinationClient, LockFactory};
use crate::error::InstallerResult;
use crate::uri::InstanceUri;

/// Administrative access to the storage cluster, scoped to one operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdminClient: Send + Sync {
    /// Probe whether a table exists, by storage-level name.
    async fn table_exists(&self, name: &str) -> InstallerResult<bool>;

    /// Create a table, seeding it with the given initial properties.
    async fn create_table(
        &self,
        name: &str,
        initial_properties: &HashMap<String, String>,
    ) -> InstallerResult<()>;

    /// Delete a table, by storage-level name.
    async fn delete_table(&self, name: &str) -> InstallerResult<()>;

    /// Release the admin connection.
    async fn close(&self) -> InstallerResult<()>;
}

/// A live connection to an installed instance.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InstanceClient: Send + Sync {
    /// Whether the cluster enforces access control on this instance.
    async fn is_security_enabled(&self) -> InstallerResult<bool>;

    /// Acquire the instance's security manager. Only meaningful when
    /// security is enabled.
    async fn security_manager(&self) -> InstallerResult<Box<dyn SecurityManager>>;

    /// Logical names of the user tables in this instance.
    async fn table_names(&self) -> InstallerResult<Vec<String>>;

    /// Delete a user table, by logical name.
    async fn delete_table(&self, name: &str) -> InstallerResult<()>;

    /// Release the instance connection.
    async fn close(&self) -> InstallerResult<()>;
}

/// Access-control operations on an instance.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecurityManager: Send + Sync {
    /// Grant the invoking principal full privileges on a freshly installed
    /// instance.
    async fn install_instance_creator(&self, uri: &InstanceUri) -> InstallerResult<()>;

    /// Verify that the invoking principal holds grant-level access,
    /// failing with [`crate::error::InstallerError::AccessDenied`] if not.
    async fn check_current_grant_access(&self) -> InstallerResult<()>;

    /// Release the security manager.
    async fn close(&self) -> InstallerResult<()>;
}

/// Factory capability handing out cluster and coordination clients.
///
/// Replaces static factory lookups with an injected value so callers and
/// tests choose the backing implementations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterProvider: Send + Sync {
    /// Open an admin connection to the storage cluster.
    async fn admin(&self, config: &Configuration) -> InstallerResult<Box<dyn AdminClient>>;

    /// Open a connection to an installed instance. Opening an instance that
    /// is not installed fails with
    /// [`crate::error::InstallerError::NotInstalled`].
    async fn open_instance(
        &self,
        uri: &InstanceUri,
        config: &Configuration,
    ) -> InstallerResult<Box<dyn InstanceClient>>;

    /// Lock factory for the instance's coordination namespace.
    async fn lock_factory(
        &self,
        uri: &InstanceUri,
        config: &Configuration,
    ) -> InstallerResult<Box<dyn LockFactory>>;

    /// Open a coordination-service client for the cluster named by `uri`.
    async fn coordination(
        &self,
        uri: &InstanceUri,
        config: &Configuration,
    ) -> InstallerResult<Box<dyn CoordinationClient>>;
}

/// Release a handle, logging instead of raising so that a close failure
/// never masks the operation's primary error.
pub(crate) fn close_or_log<E: std::fmt::Display>(result: Result<(), E>, what: &str) {
    if let Err(e) = result {
        log::warn!("failed to release {what}: {e}");
    }
}
