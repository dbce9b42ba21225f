//! Error types for repository, cipher, and storage operations.

use crate::repository::Right;
use crate::storage::Namespace;
use thiserror::Error;

/// Result type alias for coffer operations.
pub type Result<T> = std::result::Result<T, CofferError>;

#[derive(Debug, Error)]
pub enum CofferError {
    #[error("initialization vector must be {expected} bytes, got {actual}")]
    InvalidIv { expected: usize, actual: usize },

    #[error("invalid AES key length: {0} bytes")]
    InvalidKeyLength(usize),

    #[error("ciphertext record too short: {0} bytes")]
    TruncatedRecord(usize),

    /// Tag mismatch. Never says whether the password or the data was at fault.
    #[error("Invalid password or corrupted data")]
    Integrity,

    #[error("{namespace} record '{key}' not found")]
    NotFound { namespace: Namespace, key: String },

    #[error("user account '{0}' not found")]
    UnknownAccount(String),

    #[error("secret '{0}' not found")]
    UnknownSecret(String),

    #[error("unknown right '{0}'")]
    UnknownRight(String),

    #[error("user account '{user}' has no right '{right}'")]
    Forbidden { user: String, right: Right },

    #[error("invalid store key '{0}'")]
    InvalidStoreKey(String),

    #[error("invalid key derivation parameters: {0}")]
    InvalidKdfParams(String),

    #[error("OS random generator unavailable")]
    Entropy,

    #[error("repository encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse failure classes for a consuming service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    /// Wrong password, tampered record, or undecodable repository.
    InvalidCredentials,
    InvalidInput,
    Io,
    Internal,
}

impl CofferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CofferError::NotFound { .. }
            | CofferError::UnknownAccount(_)
            | CofferError::UnknownSecret(_) => ErrorKind::NotFound,
            CofferError::Forbidden { .. } => ErrorKind::Forbidden,
            CofferError::Integrity
            | CofferError::TruncatedRecord(_)
            | CofferError::Encoding(_) => ErrorKind::InvalidCredentials,
            CofferError::InvalidIv { .. }
            | CofferError::InvalidKeyLength(_)
            | CofferError::InvalidStoreKey(_)
            | CofferError::InvalidKdfParams(_) => ErrorKind::InvalidInput,
            CofferError::Io(_) => ErrorKind::Io,
            CofferError::UnknownRight(_) | CofferError::Entropy => ErrorKind::Internal,
        }
    }

    /// Message safe to show to a remote caller.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::InvalidCredentials => "invalid credentials or corrupted data".to_string(),
            ErrorKind::Io | ErrorKind::Internal => "internal error".to_string(),
            _ => self.to_string(),
        }
    }
}
