//! Install and uninstall of the per-instance meta table.
//!
//! The meta table holds per-table layout and location metadata. It starts
//! empty; rows appear as user tables are created by the surrounding tooling.

use std::collections::HashMap;

use crate::cluster::AdminClient;
use crate::error::InstallerResult;
use crate::names;
use crate::uri::InstanceUri;

/// Create the meta table for the instance named by `uri`.
pub async fn install(admin: &dyn AdminClient, uri: &InstanceUri) -> InstallerResult<()> {
    let instance = uri.validated_instance()?;
    log::debug!("creating meta table for instance '{instance}'");
    admin
        .create_table(&names::meta_table_name(instance), &HashMap::new())
        .await
}

/// Delete the meta table of the instance named by `uri`.
pub async fn uninstall(admin: &dyn AdminClient, uri: &InstanceUri) -> InstallerResult<()> {
    let instance = uri.validated_instance()?;
    admin.delete_table(&names::meta_table_name(instance)).await
}
