use chrono::{DateTime, Utc};
use idreg_attribute::AttributeError;
use idreg_migrations::MigrationError;
use idreg_name::NameError;
use idreg_types::{ClassifyError, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("unrecognized message type {0:?}")]
    UnrecognizedMsg(String),

    #[error("cannot decode {type_url}: {source}")]
    Decode {
        type_url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("transaction has no messages")]
    EmptyTx,

    #[error("state is at schema version {current}, waiting for migrations to reach {latest}")]
    MigrationPending { current: u64, latest: u64 },

    #[error("invalid genesis: {0}")]
    InvalidGenesis(String),

    #[error("block {got} does not follow committed height {last}")]
    BlockOutOfOrder { last: u64, got: u64 },

    #[error("block time {got} is before committed block time {last}")]
    BlockTimeRegressed {
        last: DateTime<Utc>,
        got: DateTime<Utc>,
    },

    #[error("state has no genesis; start with a genesis document")]
    Uninitialized,

    #[error(transparent)]
    Name(#[from] NameError),

    #[error(transparent)]
    Attribute(#[from] AttributeError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl ClassifyError for AppError {
    fn kind(&self) -> ErrorKind {
        match self {
            AppError::UnrecognizedMsg(_)
            | AppError::Decode { .. }
            | AppError::EmptyTx
            | AppError::MigrationPending { .. }
            | AppError::InvalidGenesis(_)
            | AppError::BlockOutOfOrder { .. }
            | AppError::BlockTimeRegressed { .. } => ErrorKind::Validation,
            AppError::Uninitialized => ErrorKind::NotFound,
            AppError::Name(e) => e.kind(),
            AppError::Attribute(e) => e.kind(),
            AppError::Migration(e) => e.kind(),
            AppError::Storage(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
