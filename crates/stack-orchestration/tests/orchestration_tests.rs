//! End-to-end orchestration against the scripted engine.

use std::sync::Arc;
use std::time::Duration;

use container_engine::{EngineCall, ScriptedEngine};
use stack_orchestration::{
    Error, ReadinessMonitor, ServicePhase, StackConfig, StackOrchestrator,
};

const DB: &str = "BloodHound-CE_PSQL";
const GRAPH: &str = "BloodHound-CE_Neo4j";
const APP: &str = "BloodHound-CE_BH";

fn test_config() -> StackConfig {
    StackConfig {
        pull_images: false,
        ready_timeout: Some(Duration::from_secs(1)),
        ..Default::default()
    }
}

fn orchestrator(engine: Arc<ScriptedEngine>) -> StackOrchestrator {
    let monitor = ReadinessMonitor::new(engine.clone()).with_backoff(Duration::from_millis(10));
    StackOrchestrator::new(engine, test_config()).with_monitor(monitor)
}

fn script_ready(engine: &ScriptedEngine, db: bool, graph: bool, app: bool) {
    if db {
        engine.script_logs(DB, ["database system is ready to accept connections"]);
    }
    if graph {
        engine.script_logs(GRAPH, ["Remote interface available at http://localhost:7474/"]);
    }
    if app {
        engine.script_logs(APP, ["Server started successfully"]);
    }
}

fn call_index(calls: &[EngineCall], wanted: &EngineCall) -> usize {
    calls
        .iter()
        .position(|c| c == wanted)
        .unwrap_or_else(|| panic!("call not found: {wanted:?}"))
}

#[tokio::test]
async fn launch_brings_up_all_three_services_in_dependency_order() {
    let engine = Arc::new(ScriptedEngine::new());
    script_ready(&engine, true, true, true);

    let mut orchestrator = orchestrator(engine.clone());
    orchestrator.launch().await.unwrap();

    assert_eq!(
        orchestrator.database_id(),
        Some(ScriptedEngine::container_id(DB).as_str())
    );
    let phases: Vec<_> = orchestrator.services().iter().map(|s| s.phase()).collect();
    assert_eq!(phases, vec![ServicePhase::Ready; 3]);

    // Strict happens-before: each service is ready (its log stream was
    // scanned) before the next one is even created.
    let calls = engine.calls();
    let db_logs = call_index(&calls, &EngineCall::StreamLogs(ScriptedEngine::container_id(DB)));
    let graph_create = call_index(&calls, &EngineCall::CreateContainer(GRAPH.into()));
    let graph_logs =
        call_index(&calls, &EngineCall::StreamLogs(ScriptedEngine::container_id(GRAPH)));
    let app_create = call_index(&calls, &EngineCall::CreateContainer(APP.into()));
    assert!(db_logs < graph_create);
    assert!(graph_logs < app_create);

    // Nothing was stopped during a successful launch
    assert!(engine.stopped().is_empty());
}

#[tokio::test]
async fn network_is_created_before_any_container() {
    let engine = Arc::new(ScriptedEngine::new());
    script_ready(&engine, true, true, true);

    let mut orchestrator = orchestrator(engine.clone());
    orchestrator.launch().await.unwrap();

    let calls = engine.calls();
    let network = call_index(&calls, &EngineCall::CreateNetwork("BloodHound-CE-network".into()));
    let first_create = call_index(&calls, &EngineCall::CreateContainer(DB.into()));
    assert!(network < first_create);
}

#[tokio::test]
async fn application_create_failure_stops_the_two_stores_in_reverse_order() {
    let engine = Arc::new(ScriptedEngine::new());
    script_ready(&engine, true, true, false);
    engine.fail_create(APP);

    let mut orchestrator = orchestrator(engine.clone());
    let err = orchestrator.launch().await.unwrap_err();
    assert!(matches!(err, Error::Engine(_)));

    assert_eq!(
        engine.stopped(),
        vec![
            ScriptedEngine::container_id(GRAPH),
            ScriptedEngine::container_id(DB),
        ]
    );
}

#[tokio::test]
async fn application_start_failure_also_stops_the_partial_container() {
    let engine = Arc::new(ScriptedEngine::new());
    script_ready(&engine, true, true, false);
    engine.fail_start(APP);

    let mut orchestrator = orchestrator(engine.clone());
    orchestrator.launch().await.unwrap_err();

    // The created-but-not-started application container is torn down too,
    // to release its name and ports.
    assert_eq!(
        engine.stopped(),
        vec![
            ScriptedEngine::container_id(APP),
            ScriptedEngine::container_id(GRAPH),
            ScriptedEngine::container_id(DB),
        ]
    );
}

#[tokio::test]
async fn graph_store_startup_failure_aborts_before_the_application() {
    let engine = Arc::new(ScriptedEngine::new());
    script_ready(&engine, true, false, false);
    engine.script_logs(GRAPH, ["ERROR: Neo4j failed to bind 7687"]);

    let mut orchestrator = orchestrator(engine.clone());
    let err = orchestrator.launch().await.unwrap_err();
    assert!(matches!(err, Error::StartupFailed { .. }));

    // The application was never created
    assert!(!engine
        .calls()
        .iter()
        .any(|c| matches!(c, EngineCall::CreateContainer(name) if name == APP)));
    // The failed graph container is still stopped, after which the database is
    assert_eq!(
        engine.stopped(),
        vec![
            ScriptedEngine::container_id(GRAPH),
            ScriptedEngine::container_id(DB),
        ]
    );
}

#[tokio::test]
async fn shutdown_after_a_failed_launch_is_exactly_once() {
    let engine = Arc::new(ScriptedEngine::new());
    script_ready(&engine, true, true, false);
    engine.fail_create(APP);

    let mut orchestrator = orchestrator(engine.clone());
    orchestrator.launch().await.unwrap_err();
    let stops_after_launch = engine.stopped().len();

    // The teardown that launch() already ran is not repeated
    assert_eq!(orchestrator.shutdown_all().await, 0);
    assert_eq!(engine.stopped().len(), stops_after_launch);
}

#[tokio::test]
async fn pull_policy_is_honored_per_stage() {
    let engine = Arc::new(ScriptedEngine::new());
    script_ready(&engine, true, true, true);

    let config = StackConfig {
        pull_images: true,
        ready_timeout: Some(Duration::from_secs(1)),
        ..Default::default()
    };
    let monitor = ReadinessMonitor::new(engine.clone()).with_backoff(Duration::from_millis(10));
    let mut orchestrator = StackOrchestrator::new(engine.clone(), config).with_monitor(monitor);
    orchestrator.launch().await.unwrap();

    let pulls = engine
        .calls()
        .into_iter()
        .filter(|c| matches!(c, EngineCall::PullImage(_)))
        .count();
    assert_eq!(pulls, 3);
}

#[tokio::test]
async fn image_pull_failure_aborts_the_run_before_create() {
    let engine = Arc::new(ScriptedEngine::new());
    let config = StackConfig {
        pull_images: true,
        ready_timeout: Some(Duration::from_secs(1)),
        ..Default::default()
    };
    engine.fail_pull(&config.postgres_image);

    let monitor = ReadinessMonitor::new(engine.clone()).with_backoff(Duration::from_millis(10));
    let mut orchestrator = StackOrchestrator::new(engine.clone(), config).with_monitor(monitor);
    orchestrator.launch().await.unwrap_err();

    assert!(!engine
        .calls()
        .iter()
        .any(|c| matches!(c, EngineCall::CreateContainer(_))));
    assert!(engine.stopped().is_empty());
}
