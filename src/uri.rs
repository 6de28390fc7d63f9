//! Instance URIs.
//!
//! An instance URI names a cluster (coordination-service quorum and client
//! port) and, optionally, an instance on that cluster:
//!
//! ```text
//! gridbase://zk1,zk2,zk3:2181/production
//! ```

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{InstallerError, InstallerResult};

/// URI scheme for gridbase clusters.
pub const SCHEME: &str = "gridbase";

/// Coordination-service client port assumed when the URI carries none.
pub const DEFAULT_CLIENT_PORT: u16 = 2181;

/// Identifies a cluster and, optionally, an instance on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceUri {
    quorum: Vec<String>,
    client_port: u16,
    instance: Option<String>,
}

impl InstanceUri {
    pub fn new(quorum: Vec<String>, client_port: u16, instance: Option<String>) -> Self {
        Self {
            quorum,
            client_port,
            instance,
        }
    }

    /// Ordered coordination-service quorum hosts.
    pub fn quorum(&self) -> &[String] {
        &self.quorum
    }

    /// Coordination-service client port.
    pub fn client_port(&self) -> u16 {
        self.client_port
    }

    /// Instance name, if the URI carries one.
    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }

    /// Returns the instance name, failing with
    /// [`InstallerError::InvalidName`] when it is missing or malformed.
    pub fn validated_instance(&self) -> InstallerResult<&str> {
        match self.instance.as_deref() {
            None => Err(InstallerError::InvalidName(format!(
                "URI '{self}' does not specify an instance name"
            ))),
            Some(name) if !is_valid_instance_name(name) => Err(InstallerError::InvalidName(
                format!("'{name}' is not a valid instance name"),
            )),
            Some(name) => Ok(name),
        }
    }
}

/// Instance names start with an ASCII letter or underscore, followed by
/// letters, digits or underscores.
pub fn is_valid_instance_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FromStr for InstanceUri {
    type Err = InstallerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s)
            .map_err(|e| InstallerError::InvalidName(format!("invalid instance URI '{s}': {e}")))?;

        if url.scheme() != SCHEME {
            return Err(InstallerError::InvalidName(format!(
                "instance URI '{s}' must use the '{SCHEME}' scheme"
            )));
        }

        let host = url.host_str().ok_or_else(|| {
            InstallerError::InvalidName(format!("instance URI '{s}' has no quorum hosts"))
        })?;
        let quorum: Vec<String> = host.split(',').map(str::to_string).collect();
        if quorum.iter().any(|h| h.is_empty()) {
            return Err(InstallerError::InvalidName(format!(
                "instance URI '{s}' has an empty quorum host"
            )));
        }

        let client_port = url.port().unwrap_or(DEFAULT_CLIENT_PORT);

        // Name syntax is checked at operation time by validated_instance.
        let path = url.path().trim_matches('/');
        let instance = if path.is_empty() {
            None
        } else {
            Some(path.to_string())
        };

        Ok(Self {
            quorum,
            client_port,
            instance,
        })
    }
}

impl fmt::Display for InstanceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}://{}:{}", self.quorum.join(","), self.client_port)?;
        if let Some(instance) = &self.instance {
            write!(f, "/{instance}")?;
        }
        Ok(())
    }
}
