//! Inputs handed to the contract VM and to builtin functions

use crate::{Address, DcdtTransfer, Gas, Nonce, TxHash};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Token kind carried into the VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DcdtTokenKind {
    /// Nonce 0
    Fungible,
    /// Any instance with a non-zero nonce
    NonFungible,
}

impl DcdtTokenKind {
    /// Kind implied by an instance nonce
    pub fn from_nonce(nonce: Nonce) -> Self {
        if nonce == 0 {
            DcdtTokenKind::Fungible
        } else {
            DcdtTokenKind::NonFungible
        }
    }

    /// Numeric token type as stored on chain
    pub fn as_u32(&self) -> u32 {
        match self {
            DcdtTokenKind::Fungible => 0,
            DcdtTokenKind::NonFungible => 1,
        }
    }
}

/// Token transfer descriptor seen by the VM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcdtTransferInput {
    pub token_identifier: Vec<u8>,
    pub nonce: Nonce,
    pub value: BigUint,
    pub kind: DcdtTokenKind,
}

impl From<&DcdtTransfer> for DcdtTransferInput {
    fn from(transfer: &DcdtTransfer) -> Self {
        Self {
            token_identifier: transfer.token_identifier.clone(),
            nonce: transfer.nonce,
            value: transfer.value.clone(),
            kind: DcdtTokenKind::from_nonce(transfer.nonce),
        }
    }
}

/// How a call was initiated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CallType {
    #[default]
    DirectCall,
    AsynchronousCall,
    AsynchronousCallBack,
}

/// Fields shared by call and create inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmInput {
    /// Caller address
    pub caller: Address,
    /// Call arguments
    pub arguments: Vec<Vec<u8>>,
    /// Native value
    pub call_value: BigUint,
    /// Call type
    pub call_type: CallType,
    /// Gas price
    pub gas_price: u64,
    /// Gas provided for this execution
    pub gas_provided: Gas,
    /// Hash of the originating transaction
    pub original_tx_hash: TxHash,
    /// Hash of the current transaction
    pub current_tx_hash: TxHash,
    /// Token transfers that accompany the call
    pub dcdt_transfers: Vec<DcdtTransferInput>,
}

impl VmInput {
    /// Build an input for a transaction id, deriving both hashes from it
    pub fn for_tx(tx_id: &str, caller: Address, call_value: BigUint, gas_provided: Gas) -> Self {
        let tx_hash = TxHash::from_tx_id(tx_id);
        Self {
            caller,
            arguments: Vec::new(),
            call_value,
            call_type: CallType::DirectCall,
            gas_price: 0,
            gas_provided,
            original_tx_hash: tx_hash,
            current_tx_hash: tx_hash,
            dcdt_transfers: Vec::new(),
        }
    }
}

/// Input of a contract call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCallInput {
    pub vm_input: VmInput,
    pub recipient: Address,
    pub function: String,
    pub allow_init_function: bool,
}

/// Input of a contract deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCreateInput {
    pub vm_input: VmInput,
    pub contract_code: Vec<u8>,
    pub contract_code_metadata: Vec<u8>,
}
