//! Install and uninstall of the per-instance system table.
//!
//! The system table holds instance-level configuration. Its presence is the
//! marker the installer probes to decide whether an instance exists, so it
//! is always created first and its name anchors the other backing tables.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::cluster::AdminClient;
use crate::error::InstallerResult;
use crate::names;
use crate::uri::InstanceUri;

/// Data format version written into freshly installed system tables.
pub const DATA_VERSION: &str = "system-2.0";

/// Security format version written into freshly installed system tables.
pub const SECURITY_VERSION: &str = "security-0.1";

/// Properties seeded into every new system table. Caller overrides win on
/// key collision.
static DEFAULT_PROPERTIES: Lazy<HashMap<String, String>> = Lazy::new(|| {
    HashMap::from([
        (String::from("data-version"), String::from(DATA_VERSION)),
        (
            String::from("security-version"),
            String::from(SECURITY_VERSION),
        ),
    ])
});

/// Create the system table for the instance named by `uri`, seeding it with
/// the default properties merged with `properties`.
pub async fn install(
    admin: &dyn AdminClient,
    uri: &InstanceUri,
    properties: &HashMap<String, String>,
) -> InstallerResult<()> {
    let instance = uri.validated_instance()?;

    let mut initial = DEFAULT_PROPERTIES.clone();
    initial.extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));

    log::debug!("creating system table for instance '{instance}'");
    admin
        .create_table(&names::system_table_name(instance), &initial)
        .await
}

/// Delete the system table of the instance named by `uri`.
pub async fn uninstall(admin: &dyn AdminClient, uri: &InstanceUri) -> InstallerResult<()> {
    let instance = uri.validated_instance()?;
    admin
        .delete_table(&names::system_table_name(instance))
        .await
}
