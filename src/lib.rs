//! Provision and decommission gridbase instances.
//!
//! An instance is a named grouping of tables and metadata spread across a
//! wide-column storage cluster and a coordination service. The [`Installer`]
//! walks the multi-step lifecycle protocol over both systems: the backing
//! tables (system, meta, schema), an optional security bootstrap, and the
//! per-instance coordination subtree.
//!
//! Neither operation is transactional. Each remote step is attempted exactly
//! once, and a mid-sequence failure leaves the steps already taken in place
//! for the caller to repair by re-invoking the operation or cleaning up
//! manually.

pub mod cluster;
pub mod config;
pub mod coordination;
pub mod error;
pub mod installer;
pub mod meta_table;
pub mod names;
pub mod schema_table;
pub mod system_table;
pub mod testing;
pub mod uri;

pub use config::Configuration;
pub use error::{InstallerError, InstallerResult};
pub use installer::Installer;
pub use uri::InstanceUri;
