//! In-memory cluster used by the test suite.
//!
//! [`InMemoryCluster`] models just enough of a wide-column cluster and a
//! coordination service to exercise the lifecycle protocol end to end: a
//! table map keyed by storage-level name, a path set for the coordination
//! namespace, and counters for handle and remote-call accounting. Not for
//! production use.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::cluster::{AdminClient, ClusterProvider, InstanceClient, SecurityManager};
use crate::config::Configuration;
use crate::coordination::{
    CoordinationClient, CoordinationError, CoordinationResult, DistributedLock, LockFactory,
};
use crate::error::{InstallerError, InstallerResult};
use crate::names;
use crate::uri::InstanceUri;

#[derive(Default)]
struct ClusterState {
    /// Storage-level table name to its properties.
    tables: HashMap<String, HashMap<String, String>>,
    /// Live paths in the coordination namespace.
    paths: BTreeSet<String>,
    /// Lock paths currently held.
    held_locks: BTreeSet<String>,
    security_enabled: bool,
    grant_access: bool,
    /// Instances whose creator received a privilege bootstrap.
    creator_grants: Vec<String>,
    open_handles: usize,
    remote_calls: usize,
    fail_create: Option<String>,
    fail_delete: Option<String>,
}

impl ClusterState {
    fn record_call(&mut self) {
        self.remote_calls += 1;
    }
}

/// Shared-state fake implementing every collaborator boundary.
///
/// Clones share the same cluster, so a clone can serve as the
/// [`ClusterProvider`] while the original inspects state from the test.
#[derive(Clone, Default)]
pub struct InMemoryCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cluster with access control enabled. `grant_access` controls
    /// whether the calling principal passes the grant check.
    pub fn with_security(grant_access: bool) -> Self {
        let cluster = Self::new();
        {
            let mut state = cluster.state();
            state.security_enabled = true;
            state.grant_access = grant_access;
        }
        cluster
    }

    fn state(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().expect("cluster state poisoned")
    }

    /// Make the next creation of `storage_name` fail with a remote error.
    pub fn fail_create_of(&self, storage_name: &str) {
        self.state().fail_create = Some(storage_name.to_string());
    }

    /// Make the next deletion of `storage_name` fail with a remote error.
    pub fn fail_delete_of(&self, storage_name: &str) {
        self.state().fail_delete = Some(storage_name.to_string());
    }

    /// Register a user table directly, as a live writer would.
    pub fn add_user_table(&self, instance: &str, table: &str) {
        self.state()
            .tables
            .insert(names::user_table_name(instance, table), HashMap::new());
    }

    pub fn table_exists(&self, storage_name: &str) -> bool {
        self.state().tables.contains_key(storage_name)
    }

    pub fn table_count(&self) -> usize {
        self.state().tables.len()
    }

    /// Property stored in an instance's system table, if any.
    pub fn system_property(&self, instance: &str, key: &str) -> Option<String> {
        self.state()
            .tables
            .get(&names::system_table_name(instance))
            .and_then(|properties| properties.get(key).cloned())
    }

    /// Whether the coordination namespace contains `path` or anything under
    /// it.
    pub fn subtree_exists(&self, path: &str) -> bool {
        let child_prefix = format!("{path}/");
        self.state()
            .paths
            .iter()
            .any(|p| p == path || p.starts_with(&child_prefix))
    }

    /// Handles currently open across all boundaries. Zero after any
    /// completed operation, success or failure.
    pub fn open_handles(&self) -> usize {
        self.state().open_handles
    }

    /// Remote calls issued so far, across all boundaries.
    pub fn remote_calls(&self) -> usize {
        self.state().remote_calls
    }

    /// Locks currently held. Zero outside of schema-table creation.
    pub fn held_lock_count(&self) -> usize {
        self.state().held_locks.len()
    }

    /// Instances whose creator received a privilege bootstrap, in order.
    pub fn creator_grants(&self) -> Vec<String> {
        self.state().creator_grants.clone()
    }
}

#[async_trait]
impl ClusterProvider for InMemoryCluster {
    async fn admin(&self, _config: &Configuration) -> InstallerResult<Box<dyn AdminClient>> {
        self.state().open_handles += 1;
        Ok(Box::new(InMemoryAdmin {
            state: Arc::clone(&self.state),
        }))
    }

    async fn open_instance(
        &self,
        uri: &InstanceUri,
        _config: &Configuration,
    ) -> InstallerResult<Box<dyn InstanceClient>> {
        let instance = uri.validated_instance()?;
        let mut state = self.state();
        state.record_call();
        if !state
            .tables
            .contains_key(&names::system_table_name(instance))
        {
            return Err(InstallerError::NotInstalled(instance.to_string()));
        }
        state.open_handles += 1;
        Ok(Box::new(InMemoryInstance {
            state: Arc::clone(&self.state),
            instance: instance.to_string(),
        }))
    }

    async fn lock_factory(
        &self,
        _uri: &InstanceUri,
        _config: &Configuration,
    ) -> InstallerResult<Box<dyn LockFactory>> {
        Ok(Box::new(InMemoryLockFactory {
            state: Arc::clone(&self.state),
        }))
    }

    async fn coordination(
        &self,
        _uri: &InstanceUri,
        _config: &Configuration,
    ) -> InstallerResult<Box<dyn CoordinationClient>> {
        self.state().open_handles += 1;
        Ok(Box::new(InMemoryCoordination {
            state: Arc::clone(&self.state),
        }))
    }
}

struct InMemoryAdmin {
    state: Arc<Mutex<ClusterState>>,
}

impl InMemoryAdmin {
    fn state(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().expect("cluster state poisoned")
    }
}

#[async_trait]
impl AdminClient for InMemoryAdmin {
    async fn table_exists(&self, name: &str) -> InstallerResult<bool> {
        let mut state = self.state();
        state.record_call();
        Ok(state.tables.contains_key(name))
    }

    async fn create_table(
        &self,
        name: &str,
        initial_properties: &HashMap<String, String>,
    ) -> InstallerResult<()> {
        let mut state = self.state();
        state.record_call();
        if state.fail_create.as_deref() == Some(name) {
            state.fail_create = None;
            return Err(InstallerError::Remote(format!(
                "injected failure creating '{name}'"
            )));
        }
        if state.tables.contains_key(name) {
            return Err(InstallerError::Remote(format!(
                "table '{name}' already exists"
            )));
        }
        state
            .tables
            .insert(name.to_string(), initial_properties.clone());
        Ok(())
    }

    async fn delete_table(&self, name: &str) -> InstallerResult<()> {
        let mut state = self.state();
        state.record_call();
        if state.fail_delete.as_deref() == Some(name) {
            state.fail_delete = None;
            return Err(InstallerError::Remote(format!(
                "injected failure deleting '{name}'"
            )));
        }
        state
            .tables
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| InstallerError::Remote(format!("no such table '{name}'")))
    }

    async fn close(&self) -> InstallerResult<()> {
        let mut state = self.state();
        state.open_handles = state.open_handles.saturating_sub(1);
        Ok(())
    }
}

struct InMemoryInstance {
    state: Arc<Mutex<ClusterState>>,
    instance: String,
}

impl InMemoryInstance {
    fn state(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().expect("cluster state poisoned")
    }
}

#[async_trait]
impl InstanceClient for InMemoryInstance {
    async fn is_security_enabled(&self) -> InstallerResult<bool> {
        let mut state = self.state();
        state.record_call();
        Ok(state.security_enabled)
    }

    async fn security_manager(&self) -> InstallerResult<Box<dyn SecurityManager>> {
        self.state().open_handles += 1;
        Ok(Box::new(InMemorySecurityManager {
            state: Arc::clone(&self.state),
            instance: self.instance.clone(),
        }))
    }

    async fn table_names(&self) -> InstallerResult<Vec<String>> {
        let mut state = self.state();
        state.record_call();
        let mut user_tables: Vec<String> = state
            .tables
            .keys()
            .filter_map(|storage_name| names::parse_user_table_name(&self.instance, storage_name))
            .map(str::to_string)
            .collect();
        user_tables.sort();
        Ok(user_tables)
    }

    async fn delete_table(&self, name: &str) -> InstallerResult<()> {
        let storage_name = names::user_table_name(&self.instance, name);
        let mut state = self.state();
        state.record_call();
        if state.fail_delete.as_deref() == Some(storage_name.as_str()) {
            state.fail_delete = None;
            return Err(InstallerError::Remote(format!(
                "injected failure deleting '{storage_name}'"
            )));
        }
        state
            .tables
            .remove(&storage_name)
            .map(|_| ())
            .ok_or_else(|| InstallerError::Remote(format!("no such table '{storage_name}'")))
    }

    async fn close(&self) -> InstallerResult<()> {
        let mut state = self.state();
        state.open_handles = state.open_handles.saturating_sub(1);
        Ok(())
    }
}

struct InMemorySecurityManager {
    state: Arc<Mutex<ClusterState>>,
    instance: String,
}

#[async_trait]
impl SecurityManager for InMemorySecurityManager {
    async fn install_instance_creator(&self, _uri: &InstanceUri) -> InstallerResult<()> {
        let mut state = self.state.lock().expect("cluster state poisoned");
        state.record_call();
        state.creator_grants.push(self.instance.clone());
        Ok(())
    }

    async fn check_current_grant_access(&self) -> InstallerResult<()> {
        let mut state = self.state.lock().expect("cluster state poisoned");
        state.record_call();
        if state.grant_access {
            Ok(())
        } else {
            Err(InstallerError::AccessDenied(format!(
                "principal lacks GRANT access on instance '{}'",
                self.instance
            )))
        }
    }

    async fn close(&self) -> InstallerResult<()> {
        let mut state = self.state.lock().expect("cluster state poisoned");
        state.open_handles = state.open_handles.saturating_sub(1);
        Ok(())
    }
}

struct InMemoryCoordination {
    state: Arc<Mutex<ClusterState>>,
}

#[async_trait]
impl CoordinationClient for InMemoryCoordination {
    async fn ensure_subtree(&self, path: &str) -> CoordinationResult<()> {
        let mut state = self.state.lock().expect("cluster state poisoned");
        state.record_call();
        // Create missing ancestors the way a recursive mkdir would.
        let mut node = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            node.push('/');
            node.push_str(segment);
            state.paths.insert(node.clone());
        }
        Ok(())
    }

    async fn delete_subtree(&self, path: &str) -> CoordinationResult<()> {
        let mut state = self.state.lock().expect("cluster state poisoned");
        state.record_call();
        let child_prefix = format!("{path}/");
        let doomed: Vec<String> = state
            .paths
            .iter()
            .filter(|p| p.as_str() == path || p.starts_with(&child_prefix))
            .cloned()
            .collect();
        if doomed.is_empty() {
            return Err(CoordinationError::Node {
                path: path.to_string(),
                message: String::from("no such node"),
            });
        }
        for p in doomed {
            state.paths.remove(&p);
        }
        Ok(())
    }

    async fn close(&self) -> CoordinationResult<()> {
        let mut state = self.state.lock().expect("cluster state poisoned");
        state.open_handles = state.open_handles.saturating_sub(1);
        Ok(())
    }
}

struct InMemoryLockFactory {
    state: Arc<Mutex<ClusterState>>,
}

#[async_trait]
impl LockFactory for InMemoryLockFactory {
    async fn lock(&self, path: &str) -> CoordinationResult<Box<dyn DistributedLock>> {
        Ok(Box::new(InMemoryLock {
            state: Arc::clone(&self.state),
            path: path.to_string(),
        }))
    }
}

struct InMemoryLock {
    state: Arc<Mutex<ClusterState>>,
    path: String,
}

#[async_trait]
impl DistributedLock for InMemoryLock {
    async fn acquire(&self) -> CoordinationResult<()> {
        let mut state = self.state.lock().expect("cluster state poisoned");
        state.record_call();
        if !state.held_locks.insert(self.path.clone()) {
            return Err(CoordinationError::LockUnavailable(self.path.clone()));
        }
        Ok(())
    }

    async fn release(&self) -> CoordinationResult<()> {
        let mut state = self.state.lock().expect("cluster state poisoned");
        if !state.held_locks.remove(&self.path) {
            return Err(CoordinationError::Node {
                path: self.path.clone(),
                message: String::from("lock not held"),
            });
        }
        Ok(())
    }
}
