//! Three-stage stack bring-up with guaranteed teardown.

use std::sync::Arc;

use container_engine::ContainerEngine;
use tracing::{error, info};

use crate::{
    ensure_network, spawn, LaunchStage, ReadinessMonitor, Result, RunningService, ServicePhase,
    ServiceRole, ShutdownCoordinator, StackConfig,
};

/// Drives the stack through its strict dependency order.
///
/// Database first, then the graph store, then the application server — the
/// application's configuration statically encodes the two stores' network
/// aliases and fails fast if they are unreachable. Any stage failure aborts
/// the remaining stages and stops everything started so far, including the
/// failed container itself, to release its resources and ports. One attempt
/// per run; there are no restarts.
pub struct StackOrchestrator {
    engine: Arc<dyn ContainerEngine>,
    config: StackConfig,
    monitor: ReadinessMonitor,
    shutdown: ShutdownCoordinator,
    database_id: Option<String>,
}

impl StackOrchestrator {
    /// Build an orchestrator for one stack.
    pub fn new(engine: Arc<dyn ContainerEngine>, config: StackConfig) -> Self {
        let monitor = ReadinessMonitor::new(engine.clone()).echo_logs(config.echo_logs);
        let shutdown = ShutdownCoordinator::new(engine.clone());
        Self {
            engine,
            config,
            monitor,
            shutdown,
            database_id: None,
        }
    }

    /// Swap the readiness monitor (tests shorten the reopen backoff).
    pub fn with_monitor(mut self, monitor: ReadinessMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    /// The configuration this stack runs with.
    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Container id of the ready database, once the stack is up.
    pub fn database_id(&self) -> Option<&str> {
        self.database_id.as_deref()
    }

    /// Services started so far, in startup order.
    pub fn services(&self) -> &[RunningService] {
        self.shutdown.services()
    }

    /// Bring the whole stack up, or tear down whatever got started.
    pub async fn launch(&mut self) -> Result<()> {
        if let Err(e) = ensure_network(self.engine.as_ref(), &self.config.network).await {
            error!(network = %self.config.network, error = %e, "could not ensure stack network");
            return Err(e);
        }

        for stage in self.config.launch_stages() {
            if let Err(e) = self.bring_up(stage).await {
                error!(error = %e, "stack launch failed; stopping started services");
                self.shutdown.shutdown_all().await;
                return Err(e);
            }
        }
        info!("all services ready");
        Ok(())
    }

    /// Stop every started container, newest first. Safe to call twice.
    pub async fn shutdown_all(&mut self) -> usize {
        self.shutdown.shutdown_all().await
    }

    async fn bring_up(&mut self, stage: LaunchStage) -> Result<()> {
        let name = stage.spec.name.clone();
        info!(service = %name, image = %stage.spec.image, "launching service");

        let service = match spawn(self.engine.as_ref(), &stage.spec, self.config.pull_images).await
        {
            Ok(service) => service,
            Err(failure) => {
                // A container that was created but failed to start still
                // holds resources; leave it to the teardown pass.
                if let Some(partial) = failure.partial {
                    self.shutdown.register(partial);
                }
                return Err(failure.error);
            }
        };

        // Registered before the readiness wait so a container that never
        // becomes ready is still stopped.
        let id = service.id().to_string();
        self.shutdown.register(service);

        match self
            .monitor
            .await_ready(&name, &id, &stage.marker, self.config.ready_timeout)
            .await
        {
            Ok(()) => {
                self.shutdown.set_phase(&id, ServicePhase::Ready);
                if stage.role == ServiceRole::Database {
                    self.database_id = Some(id);
                }
                Ok(())
            }
            Err(e) => {
                self.shutdown.set_phase(&id, ServicePhase::Failed);
                Err(e)
            }
        }
    }
}
