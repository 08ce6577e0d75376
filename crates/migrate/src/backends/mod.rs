//! Migration Backends
//!
//! Backends hand out transactions that can run schema statements and read or
//! replace the version table inside the same transaction.

pub mod core;
pub mod memory;
pub mod postgres;

pub use self::core::*;
pub use memory::{MemoryBackend, MemoryState};
pub use postgres::PostgresBackend;

/// Backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendType {
    PostgreSQL,
    Memory,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::PostgreSQL => write!(f, "postgresql"),
            BackendType::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(BackendType::PostgreSQL),
            "memory" => Ok(BackendType::Memory),
            _ => Err(format!("Unsupported migration backend: {}", s)),
        }
    }
}

impl BackendType {
    /// Backend named by the scheme of a connection URL
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split_once("://")?.0;
        scheme.parse().ok()
    }
}
