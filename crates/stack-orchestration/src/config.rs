//! Stack configuration and per-service launch templates.
//!
//! Everything the original tool kept as process-wide constants — image
//! references, network name, admin credentials, data folders, readiness
//! markers — lives in an immutable [`StackConfig`] handed to the
//! orchestrator at construction, so tests can drive several stacks from one
//! process.

use std::path::PathBuf;
use std::time::Duration;

use container_engine::ServiceSpec;

use crate::ReadinessMarker;

/// Data directory for PostgreSQL, relative to the stack's data root.
pub const POSTGRES_DATA_DIR: &str = "bloodhound-data/postgresql";
/// Data directory for Neo4j, relative to the stack's data root.
pub const NEO4J_DATA_DIR: &str = "bloodhound-data/neo4j";

const POSTGRES_READY: &str = "database system is ready to accept connections";
const NEO4J_READY: &str = "Remote interface available";
const APP_READY: &str = "Server started successfully";
const FAILURE_MARKER: &str = "ERROR";

/// Which slot in the dependency chain a service occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRole {
    /// Relational database, first up, last down
    Database,
    /// Graph store, depends on nothing but must precede the application
    GraphStore,
    /// Application server, depends on both stores by network alias
    Application,
}

/// One entry in the ordered launch plan.
#[derive(Debug, Clone)]
pub struct LaunchStage {
    /// The service's slot in the dependency chain
    pub role: ServiceRole,
    /// Container to launch
    pub spec: ServiceSpec,
    /// Log markers that decide readiness
    pub marker: ReadinessMarker,
}

/// Immutable configuration for one stack.
#[derive(Debug, Clone)]
pub struct StackConfig {
    /// Private network joining the three services
    pub network: String,
    /// Host directory under which per-service data folders live
    pub data_root: PathBuf,
    /// PostgreSQL image reference
    pub postgres_image: String,
    /// Neo4j image reference
    pub neo4j_image: String,
    /// Application server image reference
    pub app_image: String,
    /// Database name, user, and owner of the injected queries
    pub db_user: String,
    /// Database password shared with the application
    pub db_password: String,
    /// Database name
    pub db_name: String,
    /// Neo4j password (user is fixed to `neo4j`)
    pub graph_password: String,
    /// Application admin principal created on first boot
    pub admin_name: String,
    /// Application admin password
    pub admin_pass: String,
    /// Host port the application is published on
    pub app_host_port: u16,
    /// Pull images before creating containers
    pub pull_images: bool,
    /// Echo container log lines at info level during readiness waits
    pub echo_logs: bool,
    /// Bound on each readiness wait; `None` waits forever
    pub ready_timeout: Option<Duration>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            network: "BloodHound-CE-network".to_string(),
            data_root: PathBuf::from("."),
            postgres_image: "docker.io/library/postgres:16".to_string(),
            neo4j_image: "docker.io/library/neo4j:4.4".to_string(),
            app_image: "docker.io/specterops/bloodhound:latest".to_string(),
            db_user: "bloodhound".to_string(),
            db_password: "bloodhoundcommunityedition".to_string(),
            db_name: "bloodhound".to_string(),
            graph_password: "bloodhoundcommunityedition".to_string(),
            admin_name: "admin".to_string(),
            admin_pass: "admin".to_string(),
            app_host_port: 8181,
            pull_images: true,
            echo_logs: false,
            ready_timeout: Some(Duration::from_secs(15 * 60)),
        }
    }
}

impl StackConfig {
    /// The ordered launch plan: database, graph store, application.
    pub fn launch_stages(&self) -> Vec<LaunchStage> {
        vec![
            LaunchStage {
                role: ServiceRole::Database,
                spec: self.postgres_spec(),
                marker: ReadinessMarker::new(POSTGRES_READY, FAILURE_MARKER),
            },
            LaunchStage {
                role: ServiceRole::GraphStore,
                spec: self.neo4j_spec(),
                marker: ReadinessMarker::new(NEO4J_READY, FAILURE_MARKER),
            },
            LaunchStage {
                role: ServiceRole::Application,
                spec: self.app_spec(),
                marker: ReadinessMarker::new(APP_READY, FAILURE_MARKER),
            },
        ]
    }

    /// URL the application is reachable at once ready.
    pub fn app_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.app_host_port)
    }

    fn postgres_spec(&self) -> ServiceSpec {
        ServiceSpec::new(&self.postgres_image, "BloodHound-CE_PSQL", &self.network, "app-db")
            .env("PGUSER", &self.db_user)
            .env("POSTGRES_USER", &self.db_user)
            .env("POSTGRES_PASSWORD", &self.db_password)
            .env("POSTGRES_DB", &self.db_name)
            .mount(
                self.data_root.join(POSTGRES_DATA_DIR),
                "/var/lib/postgresql/data",
            )
    }

    fn neo4j_spec(&self) -> ServiceSpec {
        ServiceSpec::new(&self.neo4j_image, "BloodHound-CE_Neo4j", &self.network, "graph-db")
            .env("NEO4J_AUTH", format!("neo4j/{}", self.graph_password))
            .mount(self.data_root.join(NEO4J_DATA_DIR), "/data")
            // Browser and bolt, exposed for external collection tooling
            .port(7474, 7474)
            .port(7687, 7687)
    }

    fn app_spec(&self) -> ServiceSpec {
        ServiceSpec::new(&self.app_image, "BloodHound-CE_BH", &self.network, "bloodhound")
            .env(
                "bhe_database_connection",
                format!(
                    "user={} password={} dbname={} host=app-db",
                    self.db_user, self.db_password, self.db_name
                ),
            )
            .env(
                "bhe_neo4j_connection",
                format!("neo4j://neo4j:{}@graph-db:7687/", self.graph_password),
            )
            .env("bhe_default_admin_principal_name", &self.admin_name)
            .env("bhe_default_admin_password", &self.admin_pass)
            .port(self.app_host_port, 8080)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_plan_orders_database_graph_application() {
        let stages = StackConfig::default().launch_stages();
        let roles: Vec<_> = stages.iter().map(|s| s.role).collect();
        assert_eq!(
            roles,
            vec![
                ServiceRole::Database,
                ServiceRole::GraphStore,
                ServiceRole::Application
            ]
        );
    }

    #[test]
    fn application_points_at_store_aliases() {
        let config = StackConfig::default();
        let app = config.launch_stages().pop().unwrap().spec;
        assert_eq!(
            app.env.get("bhe_database_connection").unwrap(),
            "user=bloodhound password=bloodhoundcommunityedition dbname=bloodhound host=app-db"
        );
        assert!(app
            .env
            .get("bhe_neo4j_connection")
            .unwrap()
            .contains("@graph-db:7687"));
        assert_eq!(app.ports[0].host, 8181);
        assert_eq!(app.ports[0].container, 8080);
    }

    #[test]
    fn data_folders_live_under_the_data_root() {
        let config = StackConfig {
            data_root: PathBuf::from("/srv/stack"),
            ..Default::default()
        };
        let stages = config.launch_stages();
        let db = &stages[0].spec;
        assert_eq!(
            db.mounts[0].source,
            PathBuf::from("/srv/stack/bloodhound-data/postgresql")
        );
        assert_eq!(db.mounts[0].target, "/var/lib/postgresql/data");
    }
}
