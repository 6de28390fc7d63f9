use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::uri::InstanceUri;

/// Connection settings for the coordination service.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoordinationConfig {
    /// Ordered quorum of coordination-service hosts
    pub quorum: Vec<String>,
    /// Client port of the coordination service
    pub client_port: u16,
    /// Session timeout negotiated with the coordination service
    #[serde(with = "humantime_serde")]
    pub session_timeout: Duration,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            quorum: vec![String::from("localhost")],
            client_port: 2181,
            session_timeout: Duration::from_secs(30),
        }
    }
}

/// Settings for storage-cluster admin connections.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminConfig {
    /// Maximum time to wait for a single admin operation to complete
    #[serde(with = "humantime_serde")]
    pub operation_timeout: Duration,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(60),
        }
    }
}

/// Caller-owned configuration passed into install and uninstall.
///
/// The installer mutates the coordination section in place (see
/// [`Configuration::apply_uri`]) before any collaborator uses it.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    /// Coordination-service connection settings
    pub coordination: CoordinationConfig,
    /// Storage-cluster admin settings
    pub admin: AdminConfig,
}

impl Configuration {
    /// Load configuration from defaults, `gridbase.toml`, and
    /// `GRIDBASE__`-prefixed environment variables, in ascending precedence.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file("gridbase.toml"))
            .merge(Env::prefixed("GRIDBASE__").split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }

    /// Write the coordination quorum and client port derived from `uri` into
    /// this configuration. Both lifecycle operations call this before
    /// touching the cluster, so the mutation is visible to the caller
    /// afterwards.
    pub fn apply_uri(&mut self, uri: &InstanceUri) {
        self.coordination.quorum = uri.quorum().to_vec();
        self.coordination.client_port = uri.client_port();
    }
}
