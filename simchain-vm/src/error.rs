//! VM error types

use simchain_core::{Address, CoreError, ReturnCode, VmOutput};
use thiserror::Error;

/// VM error type
#[derive(Error, Debug, Clone)]
pub enum VmError {
    /// Transaction could not be set up (pre-transaction hook failed)
    #[error("{0}")]
    Setup(String),

    /// Account not found
    #[error("tx recipient (address: {}) does not exist", hex::encode(.0.as_bytes()))]
    AccountNotFound(Address),

    /// Sender of a transaction missing from the world
    #[error("sender account (address: {}) does not exist", hex::encode(.0.as_bytes()))]
    SenderNotFound(Address),

    /// Call target has no code
    #[error("tx recipient (address: {}) is not a smart contract", hex::encode(.0.as_bytes()))]
    NotASmartContract(Address),

    /// Builtin function not registered
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// Builtin function registered twice
    #[error("builtin function already registered: {0}")]
    DuplicateFunction(String),

    /// Execution finished with a non-Ok return code
    #[error("tx step failed: retcode={}, msg={message}", .return_code.as_u64())]
    TxFailed {
        return_code: ReturnCode,
        message: String,
        output: Box<VmOutput>,
    },

    /// Builtin transfer finished with a non-Ok return code
    #[error("{function} failed: retcode = {}, msg = {message}", .return_code.as_u64())]
    BuiltinFailed {
        function: String,
        return_code: ReturnCode,
        message: String,
    },

    /// Output balance deltas do not add up to the declared value
    #[error("sum of balance deltas should equal call value. Sum of balance deltas: {sum} (0x{sum:x}). Call value: {value} (0x{value:x})")]
    BalanceDeltaMismatch {
        sum: num_bigint::BigInt,
        value: num_bigint::BigInt,
    },

    /// Insufficient gas
    #[error("Out of gas: required {required}, available {available}")]
    OutOfGas { required: u64, available: u64 },

    /// Insufficient balance
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: String, available: String },

    /// A negative token or native balance would result
    #[error("negative value")]
    NegativeValue,

    /// Royalties above the 10000 basis-point cap
    #[error("invalid royalties: {0} exceeds 10000")]
    InvalidRoyalties(u32),

    /// State machine misuse
    #[error("State error: {0}")]
    State(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors from the core crate
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Other error
    #[error("VM error: {0}")]
    Other(String),
}

impl VmError {
    /// Return code carried by a failed execution, if any
    pub fn return_code(&self) -> Option<ReturnCode> {
        match self {
            VmError::TxFailed { return_code, .. } => Some(*return_code),
            VmError::BuiltinFailed { return_code, .. } => Some(*return_code),
            _ => None,
        }
    }
}

impl From<bincode::Error> for VmError {
    fn from(err: bincode::Error) -> Self {
        VmError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for VmError {
    fn from(err: serde_json::Error) -> Self {
        VmError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for VmError {
    fn from(err: anyhow::Error) -> Self {
        VmError::Other(err.to_string())
    }
}

/// Result type for VM operations
pub type VmResult<T> = Result<T, VmError>;

/// An expected-result mismatch; the transaction itself executed fine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("check failed for tx {tx_id}: {field}: want {expected}, have {actual}")]
pub struct CheckError {
    pub tx_id: String,
    pub field: &'static str,
    pub expected: String,
    pub actual: String,
}

/// Error of a whole scenario step
#[derive(Error, Debug, Clone)]
pub enum StepError {
    #[error(transparent)]
    Execution(#[from] VmError),

    #[error(transparent)]
    Check(#[from] CheckError),
}
