//! Error types for the attribute store

use crate::types::AttributeType;
use idreg_name::NameError;
use idreg_types::{Address, ClassifyError, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AttributeError {
    #[error("invalid attribute: {reason}")]
    InvalidAttribute { reason: String },

    #[error("invalid {attribute_type} value for attribute {name:?}")]
    InvalidValue {
        name: String,
        attribute_type: AttributeType,
    },

    #[error("attribute value length of {length} exceeds max length {max}")]
    ValueTooLong { length: usize, max: u32 },

    #[error("more than {limit} entries match, narrow the request")]
    ScanLimitExceeded { limit: usize },

    #[error("attribute expiration {expiration} is before block time {block_time}")]
    ExpirationInPast {
        expiration: String,
        block_time: String,
    },

    #[error("update and original names must match: {update:?} : {original:?}")]
    NameMismatch { original: String, update: String },

    #[error("update and original accounts must match: {update} : {original}")]
    AddressMismatch { original: Address, update: Address },

    #[error("{name:?} is reserved, use the account data operation instead")]
    ReservedName { name: String },

    #[error("no account found for owner address {address}")]
    AccountNotFound { address: Address },

    #[error("{name:?} does not resolve to address {owner}")]
    Unauthorized { name: String, owner: Address },

    #[error("expected authority {expected} got {signer}")]
    NotAuthority { expected: Address, signer: Address },

    #[error("{0}")]
    NotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("invalid genesis state: {0}")]
    InvalidGenesis(String),

    #[error(transparent)]
    Name(#[from] NameError),

    #[error("attribute storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("attribute encoding error: {0}")]
    Codec(#[from] bincode::Error),
}

impl ClassifyError for AttributeError {
    fn kind(&self) -> ErrorKind {
        match self {
            AttributeError::InvalidAttribute { .. }
            | AttributeError::InvalidValue { .. }
            | AttributeError::ExpirationInPast { .. }
            | AttributeError::NameMismatch { .. }
            | AttributeError::AddressMismatch { .. }
            | AttributeError::ReservedName { .. }
            | AttributeError::AccountNotFound { .. }
            | AttributeError::InvalidParams(_)
            | AttributeError::InvalidGenesis(_) => ErrorKind::Validation,
            AttributeError::ValueTooLong { .. } | AttributeError::ScanLimitExceeded { .. } => {
                ErrorKind::ResourceLimit
            }
            AttributeError::Unauthorized { .. } | AttributeError::NotAuthority { .. } => {
                ErrorKind::Permission
            }
            AttributeError::NotFound(_) => ErrorKind::NotFound,
            AttributeError::Name(e) => e.kind(),
            AttributeError::Storage(_) | AttributeError::Codec(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, AttributeError>;
