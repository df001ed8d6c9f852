//! Error types for the core crate

use thiserror::Error;

/// Core ledger errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("unknown transaction type: {0}")]
    UnknownTxKind(String),

    #[error("unknown return code: {0}")]
    UnknownReturnCode(u64),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Hex decode error: {0}")]
    HexDecode(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl From<hex::FromHexError> for CoreError {
    fn from(err: hex::FromHexError) -> Self {
        CoreError::HexDecode(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Json(err.to_string())
    }
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
