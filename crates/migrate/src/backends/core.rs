//! Core Migration Backend Traits

use async_trait::async_trait;

use super::BackendType;
use crate::error::MigrateResult;
use crate::version::VersionStore;

/// Transaction scope for running revisions
///
/// Statements and version-table writes share the transaction, so a revision
/// and the heads it records are committed or discarded together.
#[async_trait]
pub trait MigrationTransaction: VersionStore + Send {
    /// Execute a statement within the transaction
    async fn execute(&mut self, sql: &str) -> MigrateResult<u64>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> MigrateResult<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> MigrateResult<()>;
}

/// Database a migration run talks to
#[async_trait]
pub trait MigrationBackend: Send + Sync {
    /// Begin a transaction, creating the version table if missing
    async fn begin(&self) -> MigrateResult<Box<dyn MigrationTransaction>>;

    /// Release connections held by the backend
    async fn close(&self) -> MigrateResult<()>;

    fn backend_type(&self) -> BackendType;
}
