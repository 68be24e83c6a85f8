//! Migration pipeline against the scripted engine.

use std::io::Write;

use container_engine::{ExecOutcome, ScriptedEngine};
use query_migration::{migrate, MigrationError, MigrationReport, MigrationTarget};
use tempfile::NamedTempFile;

fn target() -> MigrationTarget {
    MigrationTarget {
        container_id: ScriptedEngine::container_id("db"),
        db_user: "bloodhound".to_string(),
        db_name: "bloodhound".to_string(),
        admin_name: "admin".to_string(),
    }
}

fn document(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

const MIXED_DOCUMENT: &str = r#"{
  "queries": [
    {
      "name": "All domain admins",
      "category": "AD",
      "queryList": [
        {"final": true, "query": "MATCH (u:User)-[:MemberOf]->(g {name: $group}) RETURN u",
         "props": {"group": "DOMAIN ADMINS"}}
      ]
    },
    {
      "name": "Derivative admin paths",
      "category": "AD",
      "queryList": [
        {"query": "MATCH (a) RETURN a"},
        {"query": "MATCH (b) RETURN b"},
        {"query": "MATCH (c) RETURN c"}
      ]
    }
  ]
}"#;

#[tokio::test]
async fn mixed_document_injects_once_and_reports_the_skip() {
    let engine = ScriptedEngine::new();
    let file = document(MIXED_DOCUMENT);

    let report = migrate(&engine, &target(), file.path()).await.unwrap();
    assert_eq!(
        report,
        MigrationReport {
            injected: 1,
            skipped: 1
        }
    );

    let commands = engine.exec_commands();
    assert_eq!(commands.len(), 1);
    let sql = commands[0].last().unwrap();
    assert!(sql.contains("'[AD] All domain admins'"));
    // Param inlined with SQL-safe quoting of the literal
    assert!(sql.contains("name: ''DOMAIN ADMINS''"));
    assert!(!sql.contains("Unimplemented"));
}

#[tokio::test]
async fn psql_runs_against_the_configured_database() {
    let engine = ScriptedEngine::new();
    let file = document(MIXED_DOCUMENT);
    migrate(&engine, &target(), file.path()).await.unwrap();

    let cmd = &engine.exec_commands()[0];
    assert_eq!(&cmd[..7], &["psql", "-q", "-U", "bloodhound", "-d", "bloodhound", "-c"]);
}

#[tokio::test]
async fn failed_insert_aborts_the_remaining_batch() {
    let engine = ScriptedEngine::new();
    engine.script_exec(ExecOutcome {
        exit_code: Some(1),
        stderr: "relation \"saved_queries\" does not exist".to_string(),
        ..Default::default()
    });

    let file = document(
        r#"{"queries": [
            {"name": "One", "category": "A", "queryList": [{"query": "MATCH (a) RETURN a"}]},
            {"name": "Two", "category": "B", "queryList": [{"query": "MATCH (b) RETURN b"}]}
        ]}"#,
    );

    let err = migrate(&engine, &target(), file.path()).await.unwrap_err();
    match err {
        MigrationError::InjectionFailed { query, detail } => {
            assert_eq!(query, "[A] One");
            assert!(detail.contains("saved_queries"));
        }
        other => panic!("expected InjectionFailed, got {other}"),
    }
    // The second record was never attempted
    assert_eq!(engine.exec_commands().len(), 1);
}

#[tokio::test]
async fn structurally_broken_document_is_malformed() {
    let engine = ScriptedEngine::new();
    let file = document(r#"{"queries": [{"name": "x"}]}"#);

    let err = migrate(&engine, &target(), file.path()).await.unwrap_err();
    assert!(matches!(err, MigrationError::MalformedDocument(_)));
    assert!(engine.exec_commands().is_empty());
}

#[tokio::test]
async fn missing_document_reports_the_path() {
    let engine = ScriptedEngine::new();
    let err = migrate(&engine, &target(), std::path::Path::new("/nonexistent/queries.json"))
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::DocumentRead { .. }));
}
