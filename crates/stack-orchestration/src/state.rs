//! Lifecycle phases for launched services.

use std::fmt;

use container_engine::ServiceSpec;
use tracing::debug;

/// Phase of one launched container.
///
/// Normal path is `Created -> Started -> Ready -> Stopping -> Stopped`;
/// `Failed` is the alternate terminal reached when a start or readiness
/// wait goes wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServicePhase {
    /// Container created but not yet started
    Created,
    /// Container started, readiness not yet observed
    Started,
    /// Readiness marker observed
    Ready,
    /// Stop requested
    Stopping,
    /// Stop confirmed by the engine
    Stopped,
    /// Startup or readiness failed
    Failed,
}

impl fmt::Display for ServicePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServicePhase::Created => "created",
            ServicePhase::Started => "started",
            ServicePhase::Ready => "ready",
            ServicePhase::Stopping => "stopping",
            ServicePhase::Stopped => "stopped",
            ServicePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A successfully created container and its current phase.
///
/// Owned by the orchestrator (through the shutdown coordinator) for the
/// whole run; only the id string is lent out to collaborators.
#[derive(Debug, Clone)]
pub struct RunningService {
    id: String,
    spec: ServiceSpec,
    phase: ServicePhase,
}

impl RunningService {
    /// Wrap a freshly created container.
    pub fn new(id: String, spec: ServiceSpec) -> Self {
        Self {
            id,
            spec,
            phase: ServicePhase::Created,
        }
    }

    /// Engine-assigned container id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Logical service name (the container name).
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// The spec this container was created from.
    pub fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ServicePhase {
        self.phase
    }

    /// Whether the engine removes this container on stop.
    pub fn auto_remove(&self) -> bool {
        self.spec.auto_remove
    }

    pub(crate) fn set_phase(&mut self, phase: ServicePhase) {
        debug!(service = %self.spec.name, from = %self.phase, to = %phase, "phase change");
        self.phase = phase;
    }
}
