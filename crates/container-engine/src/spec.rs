//! Immutable container launch descriptions.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// A host-port to container-port mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    /// Port bound on the host
    pub host: u16,
    /// Port inside the container
    pub container: u16,
}

/// A host-path to container-path bind mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    /// Host directory
    pub source: PathBuf,
    /// Mount point inside the container
    pub target: String,
}

/// Immutable description of one container to launch.
///
/// Built once from stack configuration, never mutated afterwards, and
/// consumed by a single create call. Environment variables use a
/// `BTreeMap` so the rendered request is deterministic.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    /// Image reference, registry-qualified
    pub image: String,
    /// Container name, also the logical service name
    pub name: String,
    /// Environment variables
    pub env: BTreeMap<String, String>,
    /// Private network to attach to
    pub network: String,
    /// DNS alias on that network
    pub network_alias: String,
    /// Host/container port mappings, in declaration order
    pub ports: Vec<PortMapping>,
    /// Bind mounts, in declaration order
    pub mounts: Vec<BindMount>,
    /// Ask the engine to remove the container once it stops
    pub auto_remove: bool,
}

impl ServiceSpec {
    /// Create a spec with no ports, mounts, or environment.
    pub fn new(
        image: impl Into<String>,
        name: impl Into<String>,
        network: impl Into<String>,
        network_alias: impl Into<String>,
    ) -> Self {
        Self {
            image: image.into(),
            name: name.into(),
            env: BTreeMap::new(),
            network: network.into(),
            network_alias: network_alias.into(),
            ports: Vec::new(),
            mounts: Vec::new(),
            auto_remove: true,
        }
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add a host/container port mapping.
    pub fn port(mut self, host: u16, container: u16) -> Self {
        self.ports.push(PortMapping { host, container });
        self
    }

    /// Add a bind mount.
    pub fn mount(mut self, source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        self.mounts.push(BindMount {
            source: source.into(),
            target: target.into(),
        });
        self
    }

    /// Override the auto-remove flag (defaults to true).
    pub fn auto_remove(mut self, auto_remove: bool) -> Self {
        self.auto_remove = auto_remove;
        self
    }

    /// Environment rendered as `KEY=VALUE` strings, sorted by key.
    pub fn env_strings(&self) -> Vec<String> {
        self.env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect()
    }
}
