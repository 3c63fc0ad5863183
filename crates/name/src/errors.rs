//! Error types for the name registry

use idreg_types::{Address, ClassifyError, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NameError {
    #[error("invalid name {name:?}: {reason}")]
    Invalid { name: String, reason: String },

    #[error("segment of name {name:?} is too short")]
    SegmentTooShort { name: String },

    #[error("segment of name {name:?} is too long")]
    SegmentTooLong { name: String },

    #[error("name {name:?} has too many segments")]
    TooManySegments { name: String },

    #[error("name not bound: {name}")]
    NotFound { name: String },

    #[error("name already bound: {name}")]
    AlreadyBound { name: String },

    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("account does not exist: {address}")]
    AccountNotFound { address: Address },

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("invalid genesis state: {0}")]
    InvalidGenesis(String),

    #[error("name storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("name record encoding error: {0}")]
    Codec(#[from] bincode::Error),
}

impl ClassifyError for NameError {
    fn kind(&self) -> ErrorKind {
        match self {
            NameError::Invalid { .. }
            | NameError::InvalidAddress(_)
            | NameError::AccountNotFound { .. }
            | NameError::InvalidParams(_)
            | NameError::InvalidGenesis(_) => ErrorKind::Validation,
            NameError::SegmentTooShort { .. }
            | NameError::SegmentTooLong { .. }
            | NameError::TooManySegments { .. } => ErrorKind::ResourceLimit,
            NameError::NotFound { .. } => ErrorKind::NotFound,
            NameError::AlreadyBound { .. } => ErrorKind::AlreadyExists,
            NameError::Unauthorized { .. } => ErrorKind::Permission,
            NameError::Storage(_) | NameError::Codec(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, NameError>;
