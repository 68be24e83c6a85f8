//! Reverse-order, best-effort teardown of started containers.

use std::sync::Arc;

use container_engine::ContainerEngine;
use tracing::{info, warn};

use crate::{RunningService, ServicePhase};

/// Stops every registered container in reverse registration order.
///
/// Each successful spawn registers here immediately, so teardown covers
/// every container created up to a failure point. Stops are best-effort: a
/// per-container stop failure is logged and the rest are still attempted —
/// cleanup must be maximally thorough even under partial failure. The
/// active set is drained on the first `shutdown_all`, making a second call
/// a no-op.
pub struct ShutdownCoordinator {
    engine: Arc<dyn ContainerEngine>,
    services: Vec<RunningService>,
}

impl ShutdownCoordinator {
    /// New coordinator with an empty active set.
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self {
            engine,
            services: Vec::new(),
        }
    }

    /// Register a container for teardown.
    pub fn register(&mut self, service: RunningService) {
        self.services.push(service);
    }

    /// The active set, in registration order.
    pub fn services(&self) -> &[RunningService] {
        &self.services
    }

    pub(crate) fn set_phase(&mut self, id: &str, phase: ServicePhase) {
        if let Some(service) = self.services.iter_mut().find(|s| s.id() == id) {
            service.set_phase(phase);
        }
    }

    /// Stop everything, newest first. Returns the number of confirmed stops.
    ///
    /// Auto-remove containers are deleted by the engine as a side effect of
    /// the stop, so no separate remove call is issued for them.
    pub async fn shutdown_all(&mut self) -> usize {
        let mut stopped = 0;
        let services: Vec<RunningService> = self.services.drain(..).rev().collect();
        for mut service in services {
            service.set_phase(ServicePhase::Stopping);
            match self.engine.stop_container(service.id()).await {
                Ok(()) => {
                    service.set_phase(ServicePhase::Stopped);
                    info!(service = %service.name(), "container stopped");
                    stopped += 1;
                }
                Err(e) => {
                    warn!(service = %service.name(), error = %e, "failed to stop container; continuing");
                }
            }
        }
        stopped
    }
}
