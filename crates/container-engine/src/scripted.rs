//! In-memory scripted engine for tests.
//!
//! Containers are named streams of scripted log sessions; every call is
//! recorded so tests can assert on ordering and coverage. Failures are
//! injected per image/container name.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use crate::{ContainerEngine, EngineError, ExecOutcome, LogStream, ServiceSpec};

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// Networks were listed
    ListNetworks,
    /// A network was created
    CreateNetwork(String),
    /// An image pull was requested
    PullImage(String),
    /// A container was created (recorded by name)
    CreateContainer(String),
    /// A container was started (recorded by id)
    StartContainer(String),
    /// A container was stopped (recorded by id)
    StopContainer(String),
    /// A log stream was opened (recorded by id)
    StreamLogs(String),
    /// A command was executed
    Exec {
        /// Container id
        id: String,
        /// Full command line
        cmd: Vec<String>,
    },
}

#[derive(Default)]
struct ScriptedState {
    networks: Vec<String>,
    calls: Vec<EngineCall>,
    log_sessions: HashMap<String, VecDeque<Vec<String>>>,
    exec_outcomes: VecDeque<ExecOutcome>,
    fail_pull: HashSet<String>,
    fail_create: HashSet<String>,
    fail_start: HashSet<String>,
    fail_stop: HashSet<String>,
}

/// Scripted in-memory [`ContainerEngine`].
#[derive(Default)]
pub struct ScriptedEngine {
    state: Mutex<ScriptedState>,
}

impl ScriptedEngine {
    /// New engine with no networks, scripts, or failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic container id assigned for a given container name.
    pub fn container_id(name: &str) -> String {
        format!("ctr-{name}")
    }

    /// Pre-populate an existing network.
    pub fn add_network(&self, name: &str) {
        self.state.lock().unwrap().networks.push(name.to_string());
    }

    /// Queue one log session for a container name. Each call to
    /// `container_logs` consumes one session; once sessions run out the
    /// stream closes immediately, mimicking an engine-side disconnect.
    pub fn script_logs<I, S>(&self, container_name: &str, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .lock()
            .unwrap()
            .log_sessions
            .entry(container_name.to_string())
            .or_default()
            .push_back(lines.into_iter().map(Into::into).collect());
    }

    /// Queue an exec outcome. When the queue is empty, execs succeed with
    /// exit code 0 and empty output.
    pub fn script_exec(&self, outcome: ExecOutcome) {
        self.state.lock().unwrap().exec_outcomes.push_back(outcome);
    }

    /// Make pulls of the given image fail.
    pub fn fail_pull(&self, image: &str) {
        self.state.lock().unwrap().fail_pull.insert(image.to_string());
    }

    /// Make creation of the given container name fail.
    pub fn fail_create(&self, name: &str) {
        self.state.lock().unwrap().fail_create.insert(name.to_string());
    }

    /// Make starting the given container name fail.
    pub fn fail_start(&self, name: &str) {
        self.state.lock().unwrap().fail_start.insert(name.to_string());
    }

    /// Make stopping the given container name fail.
    pub fn fail_stop(&self, name: &str) {
        self.state.lock().unwrap().fail_stop.insert(name.to_string());
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Ids passed to `stop_container`, in order.
    pub fn stopped(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::StopContainer(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Commands passed to `exec`, in order.
    pub fn exec_commands(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Exec { cmd, .. } => Some(cmd),
                _ => None,
            })
            .collect()
    }

    /// Current network names.
    pub fn networks(&self) -> Vec<String> {
        self.state.lock().unwrap().networks.clone()
    }

    fn record(&self, call: EngineCall) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn name_of(id: &str) -> String {
        id.strip_prefix("ctr-").unwrap_or(id).to_string()
    }
}

#[async_trait]
impl ContainerEngine for ScriptedEngine {
    async fn list_networks(&self) -> Result<Vec<String>, EngineError> {
        self.record(EngineCall::ListNetworks);
        Ok(self.networks())
    }

    async fn create_network(&self, name: &str) -> Result<(), EngineError> {
        self.record(EngineCall::CreateNetwork(name.to_string()));
        self.state.lock().unwrap().networks.push(name.to_string());
        Ok(())
    }

    async fn pull_image(&self, image: &str) -> Result<(), EngineError> {
        self.record(EngineCall::PullImage(image.to_string()));
        if self.state.lock().unwrap().fail_pull.contains(image) {
            return Err(EngineError::ImagePullFailed {
                image: image.to_string(),
                detail: "scripted pull failure".to_string(),
            });
        }
        Ok(())
    }

    async fn create_container(&self, spec: &ServiceSpec) -> Result<String, EngineError> {
        self.record(EngineCall::CreateContainer(spec.name.clone()));
        if self.state.lock().unwrap().fail_create.contains(&spec.name) {
            return Err(EngineError::ContainerCreateFailed {
                name: spec.name.clone(),
                detail: "scripted create failure".to_string(),
            });
        }
        Ok(Self::container_id(&spec.name))
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.record(EngineCall::StartContainer(id.to_string()));
        if self.state.lock().unwrap().fail_start.contains(&Self::name_of(id)) {
            return Err(EngineError::ContainerStartFailed {
                id: id.to_string(),
                detail: "scripted start failure".to_string(),
            });
        }
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> Result<(), EngineError> {
        self.record(EngineCall::StopContainer(id.to_string()));
        if self.state.lock().unwrap().fail_stop.contains(&Self::name_of(id)) {
            return Err(EngineError::StopFailed {
                id: id.to_string(),
                detail: "scripted stop failure".to_string(),
            });
        }
        Ok(())
    }

    async fn container_logs(&self, id: &str) -> Result<LogStream, EngineError> {
        self.record(EngineCall::StreamLogs(id.to_string()));
        let session = self
            .state
            .lock()
            .unwrap()
            .log_sessions
            .get_mut(&Self::name_of(id))
            .and_then(|sessions| sessions.pop_front())
            .unwrap_or_default();
        Ok(Box::pin(stream::iter(session.into_iter().map(Ok))))
    }

    async fn exec(&self, id: &str, cmd: &[String]) -> Result<ExecOutcome, EngineError> {
        self.record(EngineCall::Exec {
            id: id.to_string(),
            cmd: cmd.to_vec(),
        });
        Ok(self
            .state
            .lock()
            .unwrap()
            .exec_outcomes
            .pop_front()
            .unwrap_or_default())
    }
}
