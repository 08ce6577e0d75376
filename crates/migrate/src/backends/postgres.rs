//! PostgreSQL Backend Implementation
//!
//! Runs revisions over a `sqlx` pool. Each run holds a single connection for
//! the lifetime of its transaction.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Postgres;
use std::collections::BTreeSet;
use std::time::Duration;

use super::core::*;
use super::BackendType;
use crate::error::{MigrateError, MigrateResult};
use crate::version::{VersionStore, VersionTable};

/// PostgreSQL migration backend
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    pool: PgPool,
    version_table: VersionTable,
}

impl PostgresBackend {
    /// Connect to `database_url`
    pub async fn connect(database_url: &str, version_table: VersionTable) -> MigrateResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await
            .map_err(|e| MigrateError::database(format!("Failed to connect to database: {}", e)))?;

        tracing::debug!(table = %version_table.qualified_name(), "connected to postgres");
        Ok(Self::from_pool(pool, version_table))
    }

    /// Use an existing pool
    pub fn from_pool(pool: PgPool, version_table: VersionTable) -> Self {
        Self { pool, version_table }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn version_table(&self) -> &VersionTable {
        &self.version_table
    }
}

#[async_trait]
impl MigrationBackend for PostgresBackend {
    async fn begin(&self) -> MigrateResult<Box<dyn MigrationTransaction>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MigrateError::database(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query(&self.version_table.create_sql())
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PostgresTransaction {
            tx: Some(tx),
            version_table: self.version_table.clone(),
        }))
    }

    async fn close(&self) -> MigrateResult<()> {
        self.pool.close().await;
        Ok(())
    }

    fn backend_type(&self) -> BackendType {
        BackendType::PostgreSQL
    }
}

/// PostgreSQL transaction implementation
pub struct PostgresTransaction {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
    version_table: VersionTable,
}

impl PostgresTransaction {
    fn tx(&mut self) -> MigrateResult<&mut sqlx::Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| MigrateError::database("Transaction already completed"))
    }
}

#[async_trait]
impl VersionStore for PostgresTransaction {
    async fn get_current_heads(&mut self) -> MigrateResult<BTreeSet<String>> {
        let sql = self.version_table.select_sql();
        let tx = self.tx()?;
        let rows: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&mut **tx).await?;
        Ok(rows.into_iter().collect())
    }

    async fn set_heads(&mut self, heads: &BTreeSet<String>) -> MigrateResult<()> {
        let delete = self.version_table.delete_sql();
        let insert = self.version_table.insert_sql();
        let tx = self.tx()?;

        sqlx::query(&delete).execute(&mut **tx).await?;
        for head in heads {
            sqlx::query(&insert).bind(head).execute(&mut **tx).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MigrationTransaction for PostgresTransaction {
    async fn execute(&mut self, sql: &str) -> MigrateResult<u64> {
        let tx = self.tx()?;
        let result = sqlx::query(sql).execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }

    async fn commit(mut self: Box<Self>) -> MigrateResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| MigrateError::database("Transaction already completed"))?;

        tx.commit()
            .await
            .map_err(|e| MigrateError::database(format!("Transaction commit failed: {}", e)))
    }

    async fn rollback(mut self: Box<Self>) -> MigrateResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| MigrateError::database("Transaction already completed"))?;

        tx.rollback()
            .await
            .map_err(|e| MigrateError::database(format!("Transaction rollback failed: {}", e)))
    }
}
