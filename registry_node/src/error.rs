use crate::codec::CodecError;
use crate::storage::StorageError;
use num_bigint::BigUint;

/// Reasons an operation is rejected. Any error aborts the whole operation.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("absent value: {0}")]
    NotFound(String),

    #[error("provider already registered: {0}")]
    AlreadyRegistered(String),

    #[error("wrong address: caller is not the owner of {0}")]
    Unauthorized(String),

    #[error("insufficient space: requested {requested}, available {available}")]
    InsufficientSpace {
        requested: BigUint,
        available: BigUint,
    },

    #[error("no file with such id: {0}")]
    NoSuchFile(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("no nodes available for selection")]
    NoNodes,

    #[error("invalid argument for {operation}: {reason}")]
    InvalidArgument { operation: String, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

impl RegistryError {
    pub fn invalid_argument(operation: &str, reason: impl Into<String>) -> Self {
        RegistryError::InvalidArgument {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }
}

/// Printable form of an opaque identifier for messages and logs
pub fn display_id(id: &[u8]) -> String {
    match std::str::from_utf8(id) {
        Ok(s) if s.chars().all(|c| !c.is_control()) => s.to_string(),
        _ => format!("0x{}", hex::encode(id)),
    }
}
