use idreg_types::{ClassifyError, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    /// The migration list itself is inconsistent. Raised at startup.
    #[error("invalid migration plan: {0}")]
    InvalidPlan(String),

    #[error("stored schema version {stored} is newer than supported version {latest}")]
    VersionAhead { stored: u64, latest: u64 },

    #[error("no migration from schema version {0}")]
    NoPath(u64),

    #[error("corrupt entry {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("migration storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("migration encoding error: {0}")]
    Codec(#[from] bincode::Error),
}

impl MigrationError {
    pub(crate) fn corrupt(key: &[u8], reason: impl ToString) -> Self {
        MigrationError::Corrupt {
            key: hex::encode(key),
            reason: reason.to_string(),
        }
    }
}

impl ClassifyError for MigrationError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;
