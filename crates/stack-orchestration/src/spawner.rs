//! Pull, create, and start one container.

use container_engine::{ContainerEngine, ServiceSpec};
use tracing::{debug, info};

use crate::{Error, RunningService, ServicePhase};

/// A failed spawn, carrying the partially created container if one exists.
///
/// The spawner never cleans up after itself; when create succeeded but
/// start did not, the caller decides what happens to the leftover
/// container (the orchestrator registers it for shutdown).
#[derive(Debug)]
pub struct SpawnFailure {
    /// What went wrong
    pub error: Error,
    /// Container that was created before the failure, if any
    pub partial: Option<RunningService>,
}

impl SpawnFailure {
    fn bare(error: impl Into<Error>) -> Self {
        Self {
            error: error.into(),
            partial: None,
        }
    }
}

/// Create and start exactly one container described by `spec`.
///
/// With `pull` set, the image is pulled first; a pull failure aborts before
/// anything is created. On success the service is in phase
/// [`ServicePhase::Started`] — readiness is a separate concern.
pub async fn spawn(
    engine: &dyn ContainerEngine,
    spec: &ServiceSpec,
    pull: bool,
) -> Result<RunningService, SpawnFailure> {
    if pull {
        info!(image = %spec.image, "pulling image");
        engine.pull_image(&spec.image).await.map_err(SpawnFailure::bare)?;
    }

    let id = engine
        .create_container(spec)
        .await
        .map_err(SpawnFailure::bare)?;
    let mut service = RunningService::new(id, spec.clone());
    debug!(service = %service.name(), id = %service.id(), "container created");

    if let Err(e) = engine.start_container(service.id()).await {
        service.set_phase(ServicePhase::Failed);
        return Err(SpawnFailure {
            error: e.into(),
            partial: Some(service),
        });
    }
    service.set_phase(ServicePhase::Started);
    info!(service = %service.name(), "container started");
    Ok(service)
}
