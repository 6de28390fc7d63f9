//! Install and uninstall of the per-instance schema table.
//!
//! The schema table registers schema identifiers for the instance. IDs are
//! allocated from a counter seeded at creation time; creation happens under
//! a coordination-backed lock so two concurrent installers cannot both seed
//! the counter.

use std::collections::HashMap;

use crate::cluster::AdminClient;
use crate::coordination::LockFactory;
use crate::error::InstallerResult;
use crate::names;
use crate::uri::InstanceUri;

/// Key of the counter property seeding schema-ID allocation.
pub const NEXT_SCHEMA_ID: &str = "next-schema-id";

/// Create the schema table for the instance named by `uri`, seeding the ID
/// counter under the instance's schema lock.
pub async fn install(
    admin: &dyn AdminClient,
    uri: &InstanceUri,
    locks: &dyn LockFactory,
) -> InstallerResult<()> {
    let instance = uri.validated_instance()?;

    let lock = locks.lock(&names::schema_lock_path(instance)).await?;
    lock.acquire().await?;

    log::debug!("creating schema table for instance '{instance}'");
    let initial = HashMap::from([(String::from(NEXT_SCHEMA_ID), String::from("0"))]);
    let result = admin
        .create_table(&names::schema_table_name(instance), &initial)
        .await;

    if let Err(e) = lock.release().await {
        log::warn!("failed to release schema lock for instance '{instance}': {e}");
    }
    result
}

/// Delete the schema table of the instance named by `uri`.
pub async fn uninstall(admin: &dyn AdminClient, uri: &InstanceUri) -> InstallerResult<()> {
    let instance = uri.validated_instance()?;
    admin
        .delete_table(&names::schema_table_name(instance))
        .await
}
