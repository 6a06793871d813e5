//! Warden Database: SurrealDB connection management, schema
//! migrations, and store implementations for the `warden-core` traits.

mod connection;
mod error;
mod schema;
pub mod store;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::run_migrations;
pub use store::{SurrealAuditSink, SurrealRoleStore, SurrealUserStore};
