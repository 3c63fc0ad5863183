use serde::{Deserialize, Serialize};
use std::fmt;

/// Error taxonomy shared by every module.
///
/// Errors are pure functions of state and input, so the same operation
/// against the same state yields the same kind on every replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed name, value or address.
    Validation,
    /// Name unbound, attribute absent or no exact match.
    NotFound,
    /// Caller is not the owner or authority.
    Permission,
    /// Value too long, too many segments, segment length out of bounds.
    ResourceLimit,
    /// Name already bound.
    AlreadyExists,
    /// Storage or encoding failure.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Permission => "permission",
            ErrorKind::ResourceLimit => "resource_limit",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Implemented by module error enums to expose their [`ErrorKind`].
pub trait ClassifyError {
    fn kind(&self) -> ErrorKind;
}
