//! Persistence layer
//!
//! Endpoints and their probe history live in a local LibSQL database; the
//! engine only talks to it through the `Repository` trait.

pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::{LibsqlRepository, Repository};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
