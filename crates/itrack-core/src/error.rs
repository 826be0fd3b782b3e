//! Error types for itrack

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Version conflict on issue {id}: expected {expected}, stored {actual}")]
    VersionConflict { id: i64, expected: i64, actual: i64 },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Label reconciliation failed: {0}")]
    Reconciliation(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Config(String),
}

impl Error {
    /// Stable machine-readable tag for this error
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::NotFound(_) => "not_found",
            Error::VersionConflict { .. } => "version_conflict",
            Error::InvalidTransition(_) => "invalid_transition",
            Error::Reconciliation(_) => "reconciliation",
            Error::Database(_) => "database",
            Error::Csv(_) => "csv",
            Error::Io(_) => "io",
            Error::Config(_) => "config",
        }
    }

    pub(crate) fn issue_not_found(id: i64) -> Self {
        Error::NotFound(format!("Issue {id}"))
    }

    pub(crate) fn user_not_found(id: i64) -> Self {
        Error::NotFound(format!("User {id}"))
    }
}
