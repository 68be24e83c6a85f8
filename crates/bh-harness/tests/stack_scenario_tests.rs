//! Full run scenario: launch, migrate, tear down.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use container_engine::{EngineCall, ScriptedEngine};
use query_migration::{migrate, MigrationReport, MigrationTarget};
use stack_orchestration::{ReadinessMonitor, StackConfig, StackOrchestrator};
use tempfile::NamedTempFile;

const LEGACY_DOCUMENT: &str = r#"{
  "queries": [
    {
      "name": "All domains",
      "category": "Domains",
      "queryList": [{"final": true, "query": "MATCH (d:Domain) RETURN d"}]
    },
    {
      "name": "Kerberoastable paths",
      "category": "Kerberos",
      "queryList": [
        {"query": "MATCH (a) RETURN a"},
        {"query": "MATCH (b) RETURN b"},
        {"query": "MATCH (c) RETURN c"}
      ]
    }
  ]
}"#;

#[tokio::test]
async fn launch_migrate_and_shutdown_end_to_end() {
    let engine = Arc::new(ScriptedEngine::new());
    engine.script_logs(
        "BloodHound-CE_PSQL",
        ["database system is ready to accept connections"],
    );
    engine.script_logs("BloodHound-CE_Neo4j", ["Remote interface available"]);
    engine.script_logs("BloodHound-CE_BH", ["Server started successfully"]);

    let config = StackConfig {
        pull_images: false,
        ready_timeout: Some(Duration::from_secs(1)),
        ..Default::default()
    };
    let monitor = ReadinessMonitor::new(engine.clone()).with_backoff(Duration::from_millis(10));
    let mut orchestrator =
        StackOrchestrator::new(engine.clone(), config).with_monitor(monitor);
    orchestrator.launch().await.unwrap();

    let target = MigrationTarget {
        container_id: orchestrator.database_id().unwrap().to_string(),
        db_user: orchestrator.config().db_user.clone(),
        db_name: orchestrator.config().db_name.clone(),
        admin_name: orchestrator.config().admin_name.clone(),
    };

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(LEGACY_DOCUMENT.as_bytes()).unwrap();

    let report = migrate(engine.as_ref(), &target, file.path()).await.unwrap();
    assert_eq!(
        report,
        MigrationReport {
            injected: 1,
            skipped: 1
        }
    );

    // Exactly one injection call, against the database container
    let execs: Vec<_> = engine
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            EngineCall::Exec { id, cmd } => Some((id, cmd)),
            _ => None,
        })
        .collect();
    assert_eq!(execs.len(), 1);
    assert_eq!(execs[0].0, ScriptedEngine::container_id("BloodHound-CE_PSQL"));
    assert!(execs[0].1.last().unwrap().contains("'[Domains] All domains'"));

    // Teardown is reverse startup order
    orchestrator.shutdown_all().await;
    assert_eq!(
        engine.stopped(),
        vec![
            ScriptedEngine::container_id("BloodHound-CE_BH"),
            ScriptedEngine::container_id("BloodHound-CE_Neo4j"),
            ScriptedEngine::container_id("BloodHound-CE_PSQL"),
        ]
    );
}
