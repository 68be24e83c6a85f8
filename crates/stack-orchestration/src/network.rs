//! Idempotent creation of the stack's private network.

use container_engine::ContainerEngine;
use tracing::{debug, info};

use crate::Result;

/// Make sure a network with exactly this name exists.
///
/// Lists existing networks and creates one only if no exact name match is
/// found. No retry: a failure here is fatal to the run, since every
/// container attaches to this network by name.
pub async fn ensure_network(engine: &dyn ContainerEngine, name: &str) -> Result<()> {
    let networks = engine.list_networks().await?;
    if networks.iter().any(|n| n == name) {
        debug!(network = name, "network already exists");
        return Ok(());
    }
    engine.create_network(name).await?;
    info!(network = name, "created stack network");
    Ok(())
}
