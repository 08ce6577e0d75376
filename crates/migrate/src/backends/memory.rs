//! In-memory backend
//!
//! Records executed statements and heads instead of running them. A
//! transaction works on a snapshot of the shared state and publishes it on
//! commit; dropping or rolling back discards it.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::core::*;
use super::BackendType;
use crate::error::{MigrateError, MigrateResult};
use crate::version::VersionStore;

/// Committed state of a [`MemoryBackend`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryState {
    /// Statements in execution order
    pub statements: Vec<String>,
    /// Recorded heads
    pub heads: BTreeSet<String>,
    /// Number of committed transactions
    pub commits: usize,
}

/// Backend keeping its state in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
    fail_on: Option<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any statement containing `pattern`
    pub fn fail_on(mut self, pattern: impl Into<String>) -> Self {
        self.fail_on = Some(pattern.into());
        self
    }

    /// Record `heads` as already applied
    pub async fn seed_heads<I, S>(&self, heads: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock().await;
        state.heads = heads.into_iter().map(Into::into).collect();
    }

    pub async fn heads(&self) -> BTreeSet<String> {
        self.state.lock().await.heads.clone()
    }

    pub async fn statements(&self) -> Vec<String> {
        self.state.lock().await.statements.clone()
    }

    pub async fn commits(&self) -> usize {
        self.state.lock().await.commits
    }

    /// Copy of the committed state
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl MigrationBackend for MemoryBackend {
    async fn begin(&self) -> MigrateResult<Box<dyn MigrationTransaction>> {
        let working = self.state.lock().await.clone();
        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.state),
            working,
            fail_on: self.fail_on.clone(),
        }))
    }

    async fn close(&self) -> MigrateResult<()> {
        Ok(())
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }
}

struct MemoryTransaction {
    shared: Arc<Mutex<MemoryState>>,
    working: MemoryState,
    fail_on: Option<String>,
}

#[async_trait]
impl VersionStore for MemoryTransaction {
    async fn get_current_heads(&mut self) -> MigrateResult<BTreeSet<String>> {
        Ok(self.working.heads.clone())
    }

    async fn set_heads(&mut self, heads: &BTreeSet<String>) -> MigrateResult<()> {
        self.working.heads = heads.clone();
        Ok(())
    }
}

#[async_trait]
impl MigrationTransaction for MemoryTransaction {
    async fn execute(&mut self, sql: &str) -> MigrateResult<u64> {
        if let Some(pattern) = &self.fail_on {
            if sql.contains(pattern.as_str()) {
                return Err(MigrateError::database(format!("statement failed: {}", sql)));
            }
        }
        self.working.statements.push(sql.to_string());
        Ok(0)
    }

    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        let MemoryTransaction {
            shared,
            mut working,
            ..
        } = *self;
        let mut state = shared.lock().await;
        working.commits = state.commits + 1;
        *state = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        Ok(())
    }
}
