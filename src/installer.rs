//! Installs or uninstalls instances on a wide-column cluster.
//!
//! Both operations are sequential protocols over the cluster and the
//! coordination service: each remote step is awaited in order and attempted
//! exactly once. Neither operation is transactional: a mid-sequence failure
//! stops the protocol and leaves the steps already taken in place, to be
//! repaired by re-invoking the operation or by manual cleanup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cluster::{close_or_log, AdminClient, ClusterProvider, InstanceClient};
use crate::config::Configuration;
use crate::error::{InstallerError, InstallerResult};
use crate::uri::InstanceUri;
use crate::{meta_table, names, schema_table, system_table};

/// Orchestrates the provisioning and decommissioning of instances.
///
/// Carries no per-call state, so one value can be shared by any number of
/// callers; whatever concurrency control exists lives in the remote systems
/// behind the [`ClusterProvider`].
pub struct Installer {
    provider: Arc<dyn ClusterProvider>,
}

impl Installer {
    pub fn new(provider: Arc<dyn ClusterProvider>) -> Self {
        Self { provider }
    }

    /// Install the instance named by `uri` with default system properties.
    pub async fn install(
        &self,
        uri: &InstanceUri,
        config: &mut Configuration,
    ) -> InstallerResult<()> {
        self.install_with_properties(uri, &HashMap::new(), config)
            .await
    }

    /// Install the instance named by `uri`, merging `properties` over the
    /// system-table defaults.
    ///
    /// Writes the coordination quorum and client port from `uri` into
    /// `config` before touching the cluster. Creates, in order: system
    /// table, meta table, coordination subtree, schema table; then
    /// bootstraps the creator's privileges when the cluster enforces access
    /// control. Earlier steps are not rolled back when a later one fails.
    pub async fn install_with_properties(
        &self,
        uri: &InstanceUri,
        properties: &HashMap<String, String>,
        config: &mut Configuration,
    ) -> InstallerResult<()> {
        let instance = uri.validated_instance()?;
        config.apply_uri(uri);

        let admin = self.provider.admin(config).await?;
        let result = self
            .run_install(admin.as_ref(), uri, instance, properties, config)
            .await;
        close_or_log(admin.close().await, "admin handle");
        result?;

        log::info!("installed instance '{uri}'");
        Ok(())
    }

    async fn run_install(
        &self,
        admin: &dyn AdminClient,
        uri: &InstanceUri,
        instance: &str,
        properties: &HashMap<String, String>,
        config: &Configuration,
    ) -> InstallerResult<()> {
        if admin
            .table_exists(&names::system_table_name(instance))
            .await?
        {
            return Err(InstallerError::AlreadyExists(instance.to_string()));
        }

        log::info!("installing instance '{uri}'");
        system_table::install(admin, uri, properties).await?;
        meta_table::install(admin, uri).await?;

        // The schema lock lives under the instance subtree, so the subtree
        // must exist before the schema table is created.
        self.ensure_coordination_subtree(uri, instance, config)
            .await?;

        let locks = self.provider.lock_factory(uri, config).await?;
        schema_table::install(admin, uri, locks.as_ref()).await?;

        let handle = self.provider.open_instance(uri, config).await?;
        let bootstrap = self.bootstrap_security(handle.as_ref(), uri).await;
        close_or_log(handle.close().await, "instance handle");
        bootstrap
    }

    async fn ensure_coordination_subtree(
        &self,
        uri: &InstanceUri,
        instance: &str,
        config: &Configuration,
    ) -> InstallerResult<()> {
        let coordination = self.provider.coordination(uri, config).await?;
        let ensured = coordination
            .ensure_subtree(&names::instance_subtree(instance))
            .await;
        close_or_log(coordination.close().await, "coordination client");
        Ok(ensured?)
    }

    /// Grant the invoking principal full privileges on the new instance when
    /// the cluster enforces access control.
    async fn bootstrap_security(
        &self,
        handle: &dyn InstanceClient,
        uri: &InstanceUri,
    ) -> InstallerResult<()> {
        if !handle.is_security_enabled().await? {
            return Ok(());
        }

        let security = handle.security_manager().await?;
        let result = security.install_instance_creator(uri).await;
        close_or_log(security.close().await, "security manager handle");
        result
    }

    /// Decommission the instance named by `uri`: delete its user tables, its
    /// backing tables, and its coordination subtree.
    ///
    /// Writes the coordination quorum and client port from `uri` into
    /// `config` before touching the cluster. The instance must already be
    /// installed; otherwise the operation fails with
    /// [`InstallerError::NotInstalled`]. Under access control the caller
    /// needs grant-level privileges. A mid-sequence failure leaves the
    /// resources not yet deleted in place.
    pub async fn uninstall(
        &self,
        uri: &InstanceUri,
        config: &mut Configuration,
    ) -> InstallerResult<()> {
        let instance = uri.validated_instance()?;
        config.apply_uri(uri);

        log::info!("removing instance '{instance}'");
        let handle = self.provider.open_instance(uri, config).await?;
        let result = self
            .run_uninstall(handle.as_ref(), uri, instance, config)
            .await;
        close_or_log(handle.close().await, "instance handle");
        result?;

        log::info!("removed instance '{instance}'");
        Ok(())
    }

    async fn run_uninstall(
        &self,
        handle: &dyn InstanceClient,
        uri: &InstanceUri,
        instance: &str,
        config: &Configuration,
    ) -> InstallerResult<()> {
        if handle.is_security_enabled().await? {
            let security = handle.security_manager().await?;
            let access = security.check_current_grant_access().await;
            close_or_log(security.close().await, "security manager handle");
            access?;
        }

        for table in handle.table_names().await? {
            log::debug!("deleting table '{table}'");
            handle.delete_table(&table).await?;
        }

        let admin = self.provider.admin(config).await?;
        let results = [
            system_table::uninstall(admin.as_ref(), uri).await,
            meta_table::uninstall(admin.as_ref(), uri).await,
            schema_table::uninstall(admin.as_ref(), uri).await,
        ];
        close_or_log(admin.close().await, "admin handle");
        // All three deletions are attempted; the first failure wins.
        for result in results {
            result?;
        }

        let coordination = self.provider.coordination(uri, config).await?;
        let deleted = coordination
            .delete_subtree(&names::instance_subtree(instance))
            .await;
        close_or_log(coordination.close().await, "coordination client");
        deleted?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{
        MockAdminClient, MockClusterProvider, MockInstanceClient, MockSecurityManager,
    };
    use crate::coordination::{MockCoordinationClient, MockDistributedLock, MockLockFactory};

    fn uri_for(instance: &str) -> InstanceUri {
        format!("gridbase://zk1,zk2:2181/{instance}").parse().unwrap()
    }

    fn provider_with_admin(admin: MockAdminClient) -> MockClusterProvider {
        let mut provider = MockClusterProvider::new();
        provider
            .expect_admin()
            .times(1)
            .return_once(move |_| Ok(Box::new(admin)));
        provider
    }

    fn working_lock_factory() -> MockLockFactory {
        let mut locks = MockLockFactory::new();
        locks.expect_lock().returning(|_| {
            let mut lock = MockDistributedLock::new();
            lock.expect_acquire().returning(|| Ok(()));
            lock.expect_release().returning(|| Ok(()));
            Ok(Box::new(lock))
        });
        locks
    }

    fn working_coordination() -> MockCoordinationClient {
        let mut coordination = MockCoordinationClient::new();
        coordination.expect_ensure_subtree().returning(|_| Ok(()));
        coordination.expect_close().returning(|| Ok(()));
        coordination
    }

    #[tokio::test]
    async fn install_rejects_uri_without_instance_name() {
        // No expectations: any remote call panics the test.
        let installer = Installer::new(Arc::new(MockClusterProvider::new()));
        let uri = InstanceUri::new(vec![String::from("zk1")], 2181, None);
        let mut config = Configuration::default();

        let err = installer.install(&uri, &mut config).await.unwrap_err();
        assert!(matches!(err, InstallerError::InvalidName(_)));
    }

    #[tokio::test]
    async fn install_rejects_malformed_instance_name() {
        let installer = Installer::new(Arc::new(MockClusterProvider::new()));
        let uri = InstanceUri::new(
            vec![String::from("zk1")],
            2181,
            Some(String::from("9lives")),
        );
        let mut config = Configuration::default();

        let err = installer.install(&uri, &mut config).await.unwrap_err();
        assert!(matches!(err, InstallerError::InvalidName(_)));
    }

    #[tokio::test]
    async fn uninstall_rejects_uri_without_instance_name() {
        let installer = Installer::new(Arc::new(MockClusterProvider::new()));
        let uri = InstanceUri::new(vec![String::from("zk1")], 2181, None);
        let mut config = Configuration::default();

        let err = installer.uninstall(&uri, &mut config).await.unwrap_err();
        assert!(matches!(err, InstallerError::InvalidName(_)));
    }

    #[tokio::test]
    async fn install_fails_when_system_table_exists() {
        let mut admin = MockAdminClient::new();
        admin
            .expect_table_exists()
            .withf(|name| name == "gridbase.prod.system")
            .times(1)
            .returning(|_| Ok(true));
        admin.expect_create_table().never();
        admin.expect_close().times(1).returning(|| Ok(()));

        let installer = Installer::new(Arc::new(provider_with_admin(admin)));
        let mut config = Configuration::default();

        let err = installer
            .install(&uri_for("prod"), &mut config)
            .await
            .unwrap_err();
        assert!(matches!(err, InstallerError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn install_stops_and_releases_admin_on_remote_failure() {
        let mut admin = MockAdminClient::new();
        admin.expect_table_exists().returning(|_| Ok(false));
        admin
            .expect_create_table()
            .withf(|name, _| name == "gridbase.prod.system")
            .times(1)
            .returning(|_, _| Ok(()));
        admin
            .expect_create_table()
            .withf(|name, _| name == "gridbase.prod.meta")
            .times(1)
            .returning(|_, _| Err(InstallerError::Remote(String::from("region offline"))));
        admin.expect_close().times(1).returning(|| Ok(()));

        // Neither the coordination client nor the instance handle is
        // reached once the meta table fails.
        let installer = Installer::new(Arc::new(provider_with_admin(admin)));
        let mut config = Configuration::default();

        let err = installer
            .install(&uri_for("prod"), &mut config)
            .await
            .unwrap_err();
        assert!(matches!(err, InstallerError::Remote(_)));
    }

    #[tokio::test]
    async fn install_skips_security_bootstrap_when_disabled() {
        let mut admin = MockAdminClient::new();
        admin.expect_table_exists().returning(|_| Ok(false));
        admin.expect_create_table().times(3).returning(|_, _| Ok(()));
        admin.expect_close().times(1).returning(|| Ok(()));

        let mut instance = MockInstanceClient::new();
        instance.expect_is_security_enabled().returning(|| Ok(false));
        instance.expect_security_manager().never();
        instance.expect_close().times(1).returning(|| Ok(()));

        let mut provider = provider_with_admin(admin);
        provider
            .expect_lock_factory()
            .times(1)
            .return_once(|_, _| Ok(Box::new(working_lock_factory())));
        provider
            .expect_coordination()
            .times(1)
            .return_once(|_, _| Ok(Box::new(working_coordination())));
        provider
            .expect_open_instance()
            .times(1)
            .return_once(move |_, _| Ok(Box::new(instance)));

        let installer = Installer::new(Arc::new(provider));
        let mut config = Configuration::default();

        installer.install(&uri_for("prod"), &mut config).await.unwrap();
        assert_eq!(config.coordination.quorum, ["zk1", "zk2"]);
    }

    #[tokio::test]
    async fn install_bootstraps_the_creator_when_security_is_enabled() {
        let mut admin = MockAdminClient::new();
        admin.expect_table_exists().returning(|_| Ok(false));
        admin.expect_create_table().times(3).returning(|_, _| Ok(()));
        admin.expect_close().times(1).returning(|| Ok(()));

        let mut security = MockSecurityManager::new();
        security
            .expect_install_instance_creator()
            .times(1)
            .returning(|_| Ok(()));
        security.expect_close().times(1).returning(|| Ok(()));

        let mut instance = MockInstanceClient::new();
        instance.expect_is_security_enabled().returning(|| Ok(true));
        instance
            .expect_security_manager()
            .times(1)
            .return_once(move || Ok(Box::new(security)));
        instance.expect_close().times(1).returning(|| Ok(()));

        let mut provider = provider_with_admin(admin);
        provider
            .expect_lock_factory()
            .return_once(|_, _| Ok(Box::new(working_lock_factory())));
        provider
            .expect_coordination()
            .return_once(|_, _| Ok(Box::new(working_coordination())));
        provider
            .expect_open_instance()
            .return_once(move |_, _| Ok(Box::new(instance)));

        let installer = Installer::new(Arc::new(provider));
        let mut config = Configuration::default();

        installer.install(&uri_for("prod"), &mut config).await.unwrap();
    }

    #[tokio::test]
    async fn uninstall_stops_at_grant_check_refusal() {
        let mut security = MockSecurityManager::new();
        security
            .expect_check_current_grant_access()
            .times(1)
            .returning(|| Err(InstallerError::AccessDenied(String::from("no GRANT"))));
        security.expect_close().times(1).returning(|| Ok(()));

        let mut instance = MockInstanceClient::new();
        instance.expect_is_security_enabled().returning(|| Ok(true));
        instance
            .expect_security_manager()
            .return_once(move || Ok(Box::new(security)));
        instance.expect_table_names().never();
        instance.expect_close().times(1).returning(|| Ok(()));

        let mut provider = MockClusterProvider::new();
        provider.expect_admin().never();
        provider
            .expect_open_instance()
            .return_once(move |_, _| Ok(Box::new(instance)));

        let installer = Installer::new(Arc::new(provider));
        let mut config = Configuration::default();

        let err = installer
            .uninstall(&uri_for("prod"), &mut config)
            .await
            .unwrap_err();
        assert!(matches!(err, InstallerError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn uninstall_attempts_every_backing_table_and_reports_the_first_failure() {
        let mut instance = MockInstanceClient::new();
        instance.expect_is_security_enabled().returning(|| Ok(false));
        instance.expect_table_names().returning(|| Ok(Vec::new()));
        instance.expect_close().times(1).returning(|| Ok(()));

        let mut admin = MockAdminClient::new();
        admin
            .expect_delete_table()
            .withf(|name| name == "gridbase.prod.system")
            .times(1)
            .returning(|_| Err(InstallerError::Remote(String::from("system stuck"))));
        admin
            .expect_delete_table()
            .withf(|name| name == "gridbase.prod.meta")
            .times(1)
            .returning(|_| Ok(()));
        admin
            .expect_delete_table()
            .withf(|name| name == "gridbase.prod.schema")
            .times(1)
            .returning(|_| Ok(()));
        admin.expect_close().times(1).returning(|| Ok(()));

        let mut provider = MockClusterProvider::new();
        provider
            .expect_open_instance()
            .return_once(move |_, _| Ok(Box::new(instance)));
        provider
            .expect_admin()
            .return_once(move |_| Ok(Box::new(admin)));
        // The coordination subtree is not touched once a deletion failed.
        provider.expect_coordination().never();

        let installer = Installer::new(Arc::new(provider));
        let mut config = Configuration::default();

        let err = installer
            .uninstall(&uri_for("prod"), &mut config)
            .await
            .unwrap_err();
        assert!(matches!(err, InstallerError::Remote(message) if message.contains("system stuck")));
    }
}
