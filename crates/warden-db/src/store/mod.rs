//! SurrealDB store implementations.

mod audit;
mod role;
mod user;

pub use audit::SurrealAuditSink;
pub use role::SurrealRoleStore;
pub use user::SurrealUserStore;
