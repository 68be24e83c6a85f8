//! Error types for container engine operations.

/// Errors surfaced by [`crate::ContainerEngine`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The control-plane socket could not be reached at all
    #[error("container engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Image pull was rejected or interrupted
    #[error("failed to pull image {image}: {detail}")]
    ImagePullFailed {
        /// Image reference that was requested
        image: String,
        /// Engine-reported cause
        detail: String,
    },

    /// Network creation was rejected
    #[error("failed to create network {name}: {detail}")]
    NetworkCreateFailed {
        /// Requested network name
        name: String,
        /// Engine-reported cause
        detail: String,
    },

    /// Container creation was rejected
    #[error("failed to create container {name}: {detail}")]
    ContainerCreateFailed {
        /// Requested container name
        name: String,
        /// Engine-reported cause
        detail: String,
    },

    /// Container start was rejected
    #[error("failed to start container {id}: {detail}")]
    ContainerStartFailed {
        /// Engine-assigned container id
        id: String,
        /// Engine-reported cause
        detail: String,
    },

    /// Container stop was rejected
    #[error("failed to stop container {id}: {detail}")]
    StopFailed {
        /// Engine-assigned container id
        id: String,
        /// Engine-reported cause
        detail: String,
    },

    /// The log stream could not be opened
    #[error("log stream for container {id} failed: {detail}")]
    LogStreamFailed {
        /// Engine-assigned container id
        id: String,
        /// Engine-reported cause
        detail: String,
    },

    /// Command execution inside the container failed at the engine level
    #[error("exec in container {id} failed: {detail}")]
    ExecFailed {
        /// Engine-assigned container id
        id: String,
        /// Engine-reported cause
        detail: String,
    },
}
