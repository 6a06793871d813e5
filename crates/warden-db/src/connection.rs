//! SurrealDB connection management.

use surrealdb::engine::local::{Db, Mem};
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use surrealdb::{Connection, Surreal};
use tracing::info;

use crate::error::DbError;
use crate::schema::run_migrations;

/// Configuration for connecting to a SurrealDB server.
///
/// Every field can be overridden from the environment
/// (`WARDEN_DB_URL`, `WARDEN_DB_NAMESPACE`, `WARDEN_DB_DATABASE`,
/// `WARDEN_DB_USERNAME`, `WARDEN_DB_PASSWORD`).
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// WebSocket URL (e.g., `127.0.0.1:8000`).
    pub url: String,
    /// SurrealDB namespace.
    pub namespace: String,
    /// SurrealDB database name.
    pub database: String,
    /// Root username for authentication.
    pub username: String,
    /// Root password for authentication.
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "warden".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

impl DbConfig {
    /// Build a configuration from the environment, falling back to the
    /// defaults for any unset variable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("WARDEN_DB_URL").unwrap_or(defaults.url),
            namespace: std::env::var("WARDEN_DB_NAMESPACE").unwrap_or(defaults.namespace),
            database: std::env::var("WARDEN_DB_DATABASE").unwrap_or(defaults.database),
            username: std::env::var("WARDEN_DB_USERNAME").unwrap_or(defaults.username),
            password: std::env::var("WARDEN_DB_PASSWORD").unwrap_or(defaults.password),
        }
    }
}

/// A connected, migrated SurrealDB handle.
///
/// Generic over the engine: `connect` yields a WebSocket-backed
/// manager for deployments, `memory` an embedded one for tests.
#[derive(Clone)]
pub struct DbManager<C: Connection> {
    db: Surreal<C>,
}

impl DbManager<Client> {
    /// Connect to a SurrealDB server using the provided configuration.
    ///
    /// Authenticates as root, selects the configured namespace and
    /// database, and applies any pending migrations before returning.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = Surreal::new::<Ws>(&config.url).await?;

        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        run_migrations(&db).await?;

        info!("Successfully connected to SurrealDB");

        Ok(Self { db })
    }
}

impl DbManager<Db> {
    /// Spin up an embedded in-memory instance with migrations applied.
    pub async fn memory() -> Result<Self, DbError> {
        let db = Surreal::new::<Mem>(()).await?;
        db.use_ns("warden").use_db("main").await?;
        run_migrations(&db).await?;
        Ok(Self { db })
    }
}

impl<C: Connection> DbManager<C> {
    /// Returns a reference to the underlying SurrealDB client.
    pub fn client(&self) -> &Surreal<C> {
        &self.db
    }
}
