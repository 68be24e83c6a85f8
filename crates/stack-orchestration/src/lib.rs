//! Service lifecycle orchestration for the local BloodHound CE stack.
//!
//! Brings up three containers in strict dependency order — PostgreSQL, then
//! Neo4j, then the application server — on a private engine network. Each
//! stage gates the next on a readiness marker observed in the container's
//! combined log stream; any stage failure aborts the remaining stages and
//! tears down everything started so far in reverse order.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use container_engine::DockerEngine;
//! use stack_orchestration::{StackConfig, StackOrchestrator};
//!
//! # async fn example() -> stack_orchestration::Result<()> {
//! let engine = Arc::new(DockerEngine::connect()?);
//! let mut orchestrator = StackOrchestrator::new(engine, StackConfig::default());
//! orchestrator.launch().await?;
//! // ... use the stack ...
//! orchestrator.shutdown_all().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod network;
mod orchestrator;
mod readiness;
mod shutdown;
mod spawner;
mod state;

pub use config::{LaunchStage, ServiceRole, StackConfig, NEO4J_DATA_DIR, POSTGRES_DATA_DIR};
pub use network::ensure_network;
pub use orchestrator::StackOrchestrator;
pub use readiness::{ReadinessMarker, ReadinessMonitor};
pub use shutdown::ShutdownCoordinator;
pub use spawner::{spawn, SpawnFailure};
pub use state::{RunningService, ServicePhase};

use container_engine::EngineError;

/// Error types for stack orchestration
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Container engine errors
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A failure marker appeared in the service's log output
    #[error("service {service} reported a startup failure: {line}")]
    StartupFailed {
        /// Logical service name
        service: String,
        /// The log line that matched the failure marker
        line: String,
    },

    /// The caller-supplied readiness bound expired
    #[error("timed out waiting for service {service} to become ready")]
    ReadinessTimeout {
        /// Logical service name
        service: String,
    },
}

/// Result type for orchestration operations
pub type Result<T> = std::result::Result<T, Error>;
