//! Output produced by the contract VM and by builtin functions

use crate::{Address, CoreError, CoreResult, Nonce};
use num_bigint::{BigInt, BigUint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Execution return code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnCode {
    Ok,
    FunctionNotFound,
    FunctionWrongSignature,
    ContractNotFound,
    UserError,
    OutOfGas,
    AccountCollision,
    OutOfFunds,
    CallStackOverFlow,
    ContractInvalid,
    ExecutionFailed,
    UpgradeFailed,
    SimulateFailed,
}

impl ReturnCode {
    /// Numeric code, as reported in scenario expectations
    pub fn as_u64(&self) -> u64 {
        match self {
            ReturnCode::Ok => 0,
            ReturnCode::FunctionNotFound => 1,
            ReturnCode::FunctionWrongSignature => 2,
            ReturnCode::ContractNotFound => 3,
            ReturnCode::UserError => 4,
            ReturnCode::OutOfGas => 5,
            ReturnCode::AccountCollision => 6,
            ReturnCode::OutOfFunds => 7,
            ReturnCode::CallStackOverFlow => 8,
            ReturnCode::ContractInvalid => 9,
            ReturnCode::ExecutionFailed => 10,
            ReturnCode::UpgradeFailed => 11,
            ReturnCode::SimulateFailed => 12,
        }
    }
}

impl TryFrom<u64> for ReturnCode {
    type Error = CoreError;

    fn try_from(code: u64) -> CoreResult<Self> {
        let rc = match code {
            0 => ReturnCode::Ok,
            1 => ReturnCode::FunctionNotFound,
            2 => ReturnCode::FunctionWrongSignature,
            3 => ReturnCode::ContractNotFound,
            4 => ReturnCode::UserError,
            5 => ReturnCode::OutOfGas,
            6 => ReturnCode::AccountCollision,
            7 => ReturnCode::OutOfFunds,
            8 => ReturnCode::CallStackOverFlow,
            9 => ReturnCode::ContractInvalid,
            10 => ReturnCode::ExecutionFailed,
            11 => ReturnCode::UpgradeFailed,
            12 => ReturnCode::SimulateFailed,
            other => return Err(CoreError::UnknownReturnCode(other)),
        };
        Ok(rc)
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ReturnCode::Ok => "ok",
            ReturnCode::FunctionNotFound => "function not found",
            ReturnCode::FunctionWrongSignature => "wrong signature for function",
            ReturnCode::ContractNotFound => "contract not found",
            ReturnCode::UserError => "user error",
            ReturnCode::OutOfGas => "out of gas",
            ReturnCode::AccountCollision => "account collision",
            ReturnCode::OutOfFunds => "out of funds",
            ReturnCode::CallStackOverFlow => "call stack overflow",
            ReturnCode::ContractInvalid => "contract invalid",
            ReturnCode::ExecutionFailed => "execution failed",
            ReturnCode::UpgradeFailed => "upgrade failed",
            ReturnCode::SimulateFailed => "simulate failed",
        };
        write!(f, "{} ({})", text, self.as_u64())
    }
}

/// Metadata attached to a token instance.
///
/// Minting writes it once under the system account; ordinary holders
/// usually store only the balance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: Vec<u8>,
    pub nonce: Nonce,
    pub creator: Vec<u8>,
    pub royalties: u32,
    pub hash: Vec<u8>,
    pub uris: Vec<Vec<u8>>,
    pub attributes: Vec<u8>,
}

/// A raw storage write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUpdate {
    /// Storage key
    pub offset: Vec<u8>,
    /// New value; empty deletes the key
    pub data: Vec<u8>,
}

impl StorageUpdate {
    pub fn new(offset: impl Into<Vec<u8>>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            offset: offset.into(),
            data: data.into(),
        }
    }
}

/// A token-level balance change, applied through the token codec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDelta {
    pub token_identifier: Vec<u8>,
    pub nonce: Nonce,
    pub delta: BigInt,
    /// Metadata to attach when the instance is created on the receiving side
    pub metadata: Option<TokenMetadata>,
}

/// Changes reported for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputAccount {
    pub address: Address,
    /// New nonce, when the VM changed it
    pub nonce: Option<u64>,
    /// Signed balance change
    pub balance_delta: BigInt,
    /// Raw storage writes, in order
    pub storage_updates: Vec<StorageUpdate>,
    /// New code, for deployments and upgrades
    pub code: Option<Vec<u8>>,
    pub code_metadata: Option<Vec<u8>>,
    pub owner: Option<Address>,
    /// Token balance changes
    pub token_deltas: Vec<TokenDelta>,
}

impl OutputAccount {
    /// Create an output account with no changes
    pub fn new(address: Address) -> Self {
        Self {
            address,
            nonce: None,
            balance_delta: BigInt::default(),
            storage_updates: Vec::new(),
            code: None,
            code_metadata: None,
            owner: None,
            token_deltas: Vec::new(),
        }
    }

    /// Set the balance delta
    pub fn with_balance_delta(mut self, delta: impl Into<BigInt>) -> Self {
        self.balance_delta = delta.into();
        self
    }

    /// Add a storage write
    pub fn with_storage(mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.storage_updates.push(StorageUpdate::new(key, value));
        self
    }

    /// Set code
    pub fn with_code(mut self, code: Vec<u8>) -> Self {
        self.code = Some(code);
        self
    }
}

/// Log entry emitted by a contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub identifier: Vec<u8>,
    pub address: Address,
    pub topics: Vec<Vec<u8>>,
    pub data: Vec<u8>,
}

/// Result of a VM or builtin execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmOutput {
    pub return_data: Vec<Vec<u8>>,
    pub return_code: ReturnCode,
    pub return_message: String,
    pub gas_remaining: u64,
    pub gas_refund: BigUint,
    pub output_accounts: BTreeMap<Address, OutputAccount>,
    pub deleted_accounts: Vec<Address>,
    pub touched_accounts: Vec<Address>,
    pub logs: Vec<LogEntry>,
}

impl VmOutput {
    /// Create an output with the given return code and nothing else
    pub fn with_code(return_code: ReturnCode) -> Self {
        Self {
            return_data: Vec::new(),
            return_code,
            return_message: String::new(),
            gas_remaining: 0,
            gas_refund: BigUint::default(),
            output_accounts: BTreeMap::new(),
            deleted_accounts: Vec::new(),
            touched_accounts: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// Create an empty successful output
    pub fn ok() -> Self {
        Self::with_code(ReturnCode::Ok)
    }

    /// The protocol-level out-of-funds result: every other field zero or empty
    pub fn out_of_funds() -> Self {
        Self::with_code(ReturnCode::OutOfFunds)
    }

    /// Create a failed output carrying a message
    pub fn failure(return_code: ReturnCode, message: impl Into<String>) -> Self {
        let mut output = Self::with_code(return_code);
        output.return_message = message.into();
        output
    }

    /// Insert or replace an output account
    pub fn add_account(&mut self, account: OutputAccount) {
        self.output_accounts.insert(account.address.clone(), account);
    }

    /// Sum of all balance deltas
    pub fn balance_delta_sum(&self) -> BigInt {
        self.output_accounts
            .values()
            .map(|account| &account.balance_delta)
            .sum()
    }

    pub fn is_ok(&self) -> bool {
        self.return_code == ReturnCode::Ok
    }
}
