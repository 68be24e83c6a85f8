//! Bollard-backed engine client.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogsOptions, NetworkingConfig, StartContainerOptions,
    StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{EndpointSettings, HostConfig, PortBinding};
use bollard::network::{CreateNetworkOptions, ListNetworksOptions};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures_util::StreamExt;
use tracing::{debug, trace};

use crate::{ContainerEngine, EngineError, ExecOutcome, LogStream, ServiceSpec};

const SOCKET_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Engine client speaking the Docker API over a local socket.
///
/// Podman's Docker-compatible socket (`/run/podman/podman.sock`) works the
/// same way; only the socket path differs.
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect using the default local socket (or `DOCKER_HOST`).
    pub fn connect() -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| EngineError::EngineUnavailable(e.to_string()))?;
        Ok(Self { docker })
    }

    /// Connect to an explicit socket path. A `unix://` prefix is accepted.
    pub fn connect_socket(path: &str) -> Result<Self, EngineError> {
        let path = path.strip_prefix("unix://").unwrap_or(path);
        let docker =
            Docker::connect_with_socket(path, SOCKET_CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)
                .map_err(|e| EngineError::EngineUnavailable(e.to_string()))?;
        Ok(Self { docker })
    }
}

/// Render a spec into the bollard create-container request.
///
/// Split out of the trait impl so the request shape is unit-testable
/// without a daemon.
fn container_request(spec: &ServiceSpec) -> (CreateContainerOptions<String>, Config<String>) {
    let options = CreateContainerOptions {
        name: spec.name.clone(),
        platform: None,
    };

    let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
    for mapping in &spec.ports {
        let key = format!("{}/tcp", mapping.container);
        exposed_ports.insert(key.clone(), HashMap::new());
        port_bindings.insert(
            key,
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(mapping.host.to_string()),
            }]),
        );
    }

    let binds: Vec<String> = spec
        .mounts
        .iter()
        .map(|m| format!("{}:{}", m.source.display(), m.target))
        .collect();

    let host_config = HostConfig {
        auto_remove: Some(spec.auto_remove),
        binds: (!binds.is_empty()).then_some(binds),
        port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
        ..Default::default()
    };

    let mut endpoints = HashMap::new();
    endpoints.insert(
        spec.network.clone(),
        EndpointSettings {
            aliases: Some(vec![spec.network_alias.clone()]),
            ..Default::default()
        },
    );

    let config = Config {
        image: Some(spec.image.clone()),
        env: Some(spec.env_strings()),
        exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
        host_config: Some(host_config),
        networking_config: Some(NetworkingConfig {
            endpoints_config: endpoints,
        }),
        ..Default::default()
    };

    (options, config)
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn list_networks(&self) -> Result<Vec<String>, EngineError> {
        let networks = self
            .docker
            .list_networks(None::<ListNetworksOptions<String>>)
            .await
            .map_err(|e| EngineError::EngineUnavailable(e.to_string()))?;
        Ok(networks.into_iter().filter_map(|n| n.name).collect())
    }

    async fn create_network(&self, name: &str) -> Result<(), EngineError> {
        self.docker
            .create_network(CreateNetworkOptions {
                name: name.to_string(),
                check_duplicate: true,
                driver: "bridge".to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| EngineError::NetworkCreateFailed {
                name: name.to_string(),
                detail: e.to_string(),
            })?;
        debug!(network = name, "created private network");
        Ok(())
    }

    async fn pull_image(&self, image: &str) -> Result<(), EngineError> {
        debug!(image, "pulling image");
        let mut pull = self.docker.create_image(
            Some(CreateImageOptions {
                from_image: image.to_string(),
                ..Default::default()
            }),
            None,
            None,
        );
        while let Some(progress) = pull.next().await {
            let info = progress.map_err(|e| EngineError::ImagePullFailed {
                image: image.to_string(),
                detail: e.to_string(),
            })?;
            if let Some(status) = info.status {
                trace!(image, %status, "pull progress");
            }
        }
        Ok(())
    }

    async fn create_container(&self, spec: &ServiceSpec) -> Result<String, EngineError> {
        let (options, config) = container_request(spec);
        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| EngineError::ContainerCreateFailed {
                name: spec.name.clone(),
                detail: e.to_string(),
            })?;
        debug!(container = %spec.name, id = %response.id, "container created");
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| EngineError::ContainerStartFailed {
                id: id.to_string(),
                detail: e.to_string(),
            })
    }

    async fn stop_container(&self, id: &str) -> Result<(), EngineError> {
        self.docker
            .stop_container(id, None::<StopContainerOptions>)
            .await
            .map_err(|e| EngineError::StopFailed {
                id: id.to_string(),
                detail: e.to_string(),
            })
    }

    async fn container_logs(&self, id: &str) -> Result<LogStream, EngineError> {
        let id_owned = id.to_string();
        let stream = self.docker.logs(
            id,
            Some(LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );
        let lines = stream.map(move |chunk| match chunk {
            Ok(output) => Ok(output.to_string()),
            Err(e) => Err(EngineError::LogStreamFailed {
                id: id_owned.clone(),
                detail: e.to_string(),
            }),
        });
        Ok(lines.boxed())
    }

    async fn exec(&self, id: &str, cmd: &[String]) -> Result<ExecOutcome, EngineError> {
        let exec_failed = |detail: String| EngineError::ExecFailed {
            id: id.to_string(),
            detail,
        };

        let exec = self
            .docker
            .create_exec(
                id,
                CreateExecOptions {
                    cmd: Some(cmd.to_vec()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| exec_failed(e.to_string()))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        match self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| exec_failed(e.to_string()))?
        {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(msg) = output.next().await {
                    match msg.map_err(|e| exec_failed(e.to_string()))? {
                        bollard::container::LogOutput::StdOut { message } => {
                            stdout.extend_from_slice(&message)
                        }
                        bollard::container::LogOutput::StdErr { message } => {
                            stderr.extend_from_slice(&message)
                        }
                        _ => {}
                    }
                }
            }
            StartExecResults::Detached => {}
        }

        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| exec_failed(e.to_string()))?;

        Ok(ExecOutcome {
            exit_code: inspect.exit_code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}
