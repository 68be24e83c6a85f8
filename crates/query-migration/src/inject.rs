//! SQL execution inside the database container.

use container_engine::ContainerEngine;
use tracing::info;

use crate::{MigrationError, NormalizedBatch, NormalizedQuery};

/// Where and as whom the migration writes.
#[derive(Debug, Clone)]
pub struct MigrationTarget {
    /// Container id of the ready database
    pub container_id: String,
    /// Database role to connect as
    pub db_user: String,
    /// Database to connect to
    pub db_name: String,
    /// Application admin whose account owns the injected queries
    pub admin_name: String,
}

/// What the migration run accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    /// Records inserted
    pub injected: usize,
    /// Multi-query groups skipped by policy
    pub skipped: usize,
}

/// Inserts normalized queries by running `psql` inside the database
/// container, one statement per record.
pub struct QueryInjector<'a> {
    engine: &'a dyn ContainerEngine,
    target: &'a MigrationTarget,
}

impl<'a> QueryInjector<'a> {
    /// New injector against a ready database container.
    pub fn new(engine: &'a dyn ContainerEngine, target: &'a MigrationTarget) -> Self {
        Self { engine, target }
    }

    /// Inject every surviving record, failing fast on the first error.
    pub async fn inject_all(
        &self,
        batch: &NormalizedBatch,
    ) -> Result<MigrationReport, MigrationError> {
        let total = batch.queries.len();
        for (i, query) in batch.queries.iter().enumerate() {
            info!(current = i + 1, total, name = %query.name, "injecting query");
            self.insert_query(query).await?;
        }
        Ok(MigrationReport {
            injected: total,
            skipped: batch.skipped,
        })
    }

    /// Push the admin credential's expiration out to the given timestamp.
    pub async fn extend_password_expiration(
        &self,
        expiration: &str,
    ) -> Result<(), MigrationError> {
        let sql = format!(
            "UPDATE auth_secrets SET expires_at={} WHERE id='1';",
            sql_literal(expiration)
        );
        self.run_psql(&sql)
            .await
            .map_err(|detail| MigrationError::ExpirationUpdateFailed { detail })
    }

    async fn insert_query(&self, query: &NormalizedQuery) -> Result<(), MigrationError> {
        let sql = insert_statement(query, &self.target.admin_name);
        self.run_psql(&sql)
            .await
            .map_err(|detail| MigrationError::InjectionFailed {
                query: query.name.clone(),
                detail,
            })
    }

    async fn run_psql(&self, sql: &str) -> Result<(), String> {
        let cmd: Vec<String> = [
            "psql",
            "-q",
            "-U",
            &self.target.db_user,
            "-d",
            &self.target.db_name,
            "-c",
            sql,
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        match self.engine.exec(&self.target.container_id, &cmd).await {
            Ok(outcome) if outcome.success() => Ok(()),
            Ok(outcome) => Err(format!(
                "psql exited with {:?}: {}",
                outcome.exit_code,
                outcome.stderr.trim()
            )),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// SQL string literal with embedded single quotes doubled.
fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Insert guarded by an existence check on the admin account, so the
/// statement is a no-op when the expected admin is absent.
fn insert_statement(query: &NormalizedQuery, admin_name: &str) -> String {
    let admin = sql_literal(admin_name);
    format!(
        "INSERT INTO saved_queries (user_id, name, query, description) \
         SELECT (SELECT id FROM users WHERE principal_name = {admin}), {}, {}, {} \
         WHERE EXISTS (SELECT 1 FROM users WHERE principal_name = {admin});",
        sql_literal(&query.name),
        sql_literal(&query.query),
        sql_literal(&query.description),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_double_embedded_quotes() {
        assert_eq!(sql_literal("plain"), "'plain'");
        assert_eq!(
            sql_literal("WHERE u.name = 'DOMAIN ADMINS'"),
            "'WHERE u.name = ''DOMAIN ADMINS'''"
        );
    }

    #[test]
    fn insert_is_guarded_by_the_admin_existence_check() {
        let sql = insert_statement(
            &NormalizedQuery {
                name: "[AD] All admins".to_string(),
                description: "All admins".to_string(),
                query: "MATCH (n:User) RETURN n".to_string(),
            },
            "admin",
        );

        assert!(sql.starts_with("INSERT INTO saved_queries"));
        assert!(sql.contains("WHERE EXISTS (SELECT 1 FROM users WHERE principal_name = 'admin')"));
        assert!(sql.contains("'[AD] All admins'"));
    }
}
