//! The engine capability trait.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{EngineError, ServiceSpec};

/// A following stream of combined stdout/stderr log lines.
pub type LogStream = BoxStream<'static, Result<String, EngineError>>;

/// Outcome of a one-shot command executed inside a running container.
#[derive(Debug, Clone, Default)]
pub struct ExecOutcome {
    /// Exit code, if the engine reported one
    pub exit_code: Option<i64>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ExecOutcome {
    /// Whether the command exited successfully.
    pub fn success(&self) -> bool {
        matches!(self.exit_code, None | Some(0))
    }
}

/// Capabilities the stack launcher consumes from the container engine.
///
/// The engine's wire protocol is never modeled here; implementations wrap a
/// client (bollard) or an in-memory script. All methods are one container
/// at a time, matching the strictly sequential launch order upstream.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Names of all existing networks.
    async fn list_networks(&self) -> Result<Vec<String>, EngineError>;

    /// Create a DNS-enabled private network.
    async fn create_network(&self, name: &str) -> Result<(), EngineError>;

    /// Pull an image from its registry.
    async fn pull_image(&self, image: &str) -> Result<(), EngineError>;

    /// Create a container from a spec, returning the engine-assigned id.
    async fn create_container(&self, spec: &ServiceSpec) -> Result<String, EngineError>;

    /// Start a created container.
    async fn start_container(&self, id: &str) -> Result<(), EngineError>;

    /// Stop a running container. Auto-remove containers are deleted by the
    /// engine as a side effect.
    async fn stop_container(&self, id: &str) -> Result<(), EngineError>;

    /// Open a following combined stdout/stderr log stream.
    ///
    /// The engine may close the stream at any time without it meaning
    /// anything about the container; callers reopen as needed.
    async fn container_logs(&self, id: &str) -> Result<LogStream, EngineError>;

    /// Run a command inside a running container and wait for its outcome.
    async fn exec(&self, id: &str, cmd: &[String]) -> Result<ExecOutcome, EngineError>;
}
