//! Naming scheme for the cluster resources managed per instance.
//!
//! Backing tables live under `gridbase.{instance}.{component}` on the
//! storage cluster; user tables under `gridbase.{instance}.user.{table}`.
//! The coordination namespace mirrors this with one subtree per instance
//! under `/gridbase`.

/// Prefix under which all managed tables live on the storage cluster.
pub const MANAGED_PREFIX: &str = "gridbase";

/// Root of the coordination namespace shared by all instances.
pub const COORDINATION_ROOT: &str = "/gridbase";

/// Storage-level name of the instance's system table.
pub fn system_table_name(instance: &str) -> String {
    format!("{MANAGED_PREFIX}.{instance}.system")
}

/// Storage-level name of the instance's meta table.
pub fn meta_table_name(instance: &str) -> String {
    format!("{MANAGED_PREFIX}.{instance}.meta")
}

/// Storage-level name of the instance's schema table.
pub fn schema_table_name(instance: &str) -> String {
    format!("{MANAGED_PREFIX}.{instance}.schema")
}

/// Storage-level name of a user table within an instance.
pub fn user_table_name(instance: &str, table: &str) -> String {
    format!("{MANAGED_PREFIX}.{instance}.user.{table}")
}

/// Extract the logical table name from a storage-level user-table name, or
/// `None` when the name belongs to another instance or is not a user table.
pub fn parse_user_table_name<'a>(instance: &str, storage_name: &'a str) -> Option<&'a str> {
    storage_name
        .strip_prefix(MANAGED_PREFIX)?
        .strip_prefix('.')?
        .strip_prefix(instance)?
        .strip_prefix(".user.")
}

/// Coordination-service subtree owned by an instance.
pub fn instance_subtree(instance: &str) -> String {
    format!("{COORDINATION_ROOT}/{instance}")
}

/// Lock path guarding schema-ID allocation for an instance.
pub fn schema_lock_path(instance: &str) -> String {
    format!("{}/schema-lock", instance_subtree(instance))
}
