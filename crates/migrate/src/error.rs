//! Error types for the migration engine
//!
//! Graph and resolution errors are raised before any connection is touched.
//! Execution errors always carry the failing revision and direction.

use std::path::PathBuf;
use thiserror::Error;

use crate::revision::Direction;
use lineage_core::ConfigError;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("Cycle detected in revision graph: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    #[error("Revision '{id}' is defined more than once")]
    DuplicateRevision { id: String },

    #[error("Revision '{revision}' refers to unknown parent '{parent}'")]
    UnresolvedParent { revision: String, parent: String },

    #[error("Branch label '{label}' is used by both '{first}' and '{second}'")]
    DuplicateBranchLabel {
        label: String,
        first: String,
        second: String,
    },

    #[error("Can't locate revision identified by '{spec}'")]
    UnknownRevision { spec: String },

    #[error("Revision '{spec}' is ambiguous; candidates: {}", candidates.join(", "))]
    AmbiguousRevision { spec: String, candidates: Vec<String> },

    #[error("Invalid revision range: {message}")]
    InvalidRangeSpec { message: String },

    #[error("Failed to {direction} revision '{revision}': {source}")]
    Execution {
        revision: String,
        direction: Direction,
        #[source]
        source: Box<MigrateError>,
    },

    #[error("Version table references unknown revision '{revision}'")]
    State { revision: String },

    #[error("Failed to parse revision file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Operation error: {message}")]
    Operation { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl MigrateError {
    /// Create an invalid range error
    pub fn invalid_range(message: impl Into<String>) -> Self {
        Self::InvalidRangeSpec {
            message: message.into(),
        }
    }

    /// Create an unknown revision error
    pub fn unknown(spec: impl Into<String>) -> Self {
        Self::UnknownRevision { spec: spec.into() }
    }

    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create an operation error, for use inside revision scripts
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation {
            message: message.into(),
        }
    }

    /// Wrap a failure raised while running a revision
    pub fn execution(revision: impl Into<String>, direction: Direction, source: MigrateError) -> Self {
        Self::Execution {
            revision: revision.into(),
            direction,
            source: Box::new(source),
        }
    }

    /// Stable name of the error kind, used in command line output
    pub fn kind(&self) -> &'static str {
        match self {
            MigrateError::CycleDetected { .. } => "CycleDetected",
            MigrateError::DuplicateRevision { .. } => "DuplicateRevision",
            MigrateError::UnresolvedParent { .. } => "UnresolvedParent",
            MigrateError::DuplicateBranchLabel { .. } => "DuplicateBranchLabel",
            MigrateError::UnknownRevision { .. } => "UnknownRevision",
            MigrateError::AmbiguousRevision { .. } => "AmbiguousRevision",
            MigrateError::InvalidRangeSpec { .. } => "InvalidRangeSpec",
            MigrateError::Execution { .. } => "ExecutionError",
            MigrateError::State { .. } => "StateError",
            MigrateError::Parse { .. } => "ParseError",
            MigrateError::Database { .. } => "DatabaseError",
            MigrateError::Operation { .. } => "OperationError",
            MigrateError::Io(_) => "IoError",
            MigrateError::Config(_) => "ConfigError",
        }
    }

    /// Revision id attached to the error, if any
    pub fn revision(&self) -> Option<&str> {
        match self {
            MigrateError::DuplicateRevision { id } => Some(id),
            MigrateError::UnresolvedParent { revision, .. }
            | MigrateError::Execution { revision, .. }
            | MigrateError::State { revision } => Some(revision),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for MigrateError {
    fn from(err: sqlx::Error) -> Self {
        MigrateError::Database {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_carries_revision() {
        let err = MigrateError::execution(
            "ae1027a6acf",
            Direction::Upgrade,
            MigrateError::database("relation \"users\" already exists"),
        );

        assert_eq!(err.kind(), "ExecutionError");
        assert_eq!(err.revision(), Some("ae1027a6acf"));
        assert_eq!(
            err.to_string(),
            "Failed to upgrade revision 'ae1027a6acf': Database error: relation \"users\" already exists"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_cycle_message() {
        let err = MigrateError::CycleDetected {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Cycle detected in revision graph: a -> b -> a");
        assert_eq!(err.kind(), "CycleDetected");
    }
}
