//! Warden Core: domain models, store trait definitions, and error
//! types for role hierarchy and permission resolution.

pub mod error;
pub mod models;
pub mod store;

pub use error::{WardenError, WardenResult};
