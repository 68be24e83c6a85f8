//! Container engine capability layer.
//!
//! Everything the stack launcher needs from the container engine is expressed
//! as the [`ContainerEngine`] trait: network listing and creation, image
//! pulls, container create/start/stop, a following combined log stream, and
//! one-shot command execution inside a running container. [`DockerEngine`]
//! implements the trait with bollard against the local Docker-compatible
//! socket (Podman's compat socket works too); the `test-utils` feature adds
//! [`ScriptedEngine`], an in-memory implementation for driving the
//! orchestration and migration layers without a daemon.

mod docker;
mod engine;
mod error;
mod spec;

#[cfg(any(test, feature = "test-utils"))]
mod scripted;

pub use docker::DockerEngine;
pub use engine::{ContainerEngine, ExecOutcome, LogStream};
pub use error::EngineError;
pub use spec::{BindMount, PortMapping, ServiceSpec};

#[cfg(any(test, feature = "test-utils"))]
pub use scripted::{EngineCall, ScriptedEngine};
