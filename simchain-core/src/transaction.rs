//! Transaction descriptors and expected results

use crate::{Address, CoreError, CoreResult, Gas, LogEntry, Nonce, ReturnCode, Specified};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of transaction a step executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    /// Contract deployment
    Deploy,
    /// Contract call
    Call,
    /// Read-only query, executed as if the contract called itself
    Query,
    /// Plain value transfer, no VM involved
    Transfer,
    /// Protocol reward credited to a validator; has no sender
    ValidatorReward,
}

impl TxKind {
    /// Whether transactions of this kind originate from a sender account
    pub fn has_sender(&self) -> bool {
        !matches!(self, TxKind::ValidatorReward)
    }

    /// Name used in scenario files
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Deploy => "scDeploy",
            TxKind::Call => "scCall",
            TxKind::Query => "scQuery",
            TxKind::Transfer => "transfer",
            TxKind::ValidatorReward => "validatorReward",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxKind {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "scDeploy" => Ok(TxKind::Deploy),
            "scCall" => Ok(TxKind::Call),
            "scQuery" => Ok(TxKind::Query),
            "transfer" => Ok(TxKind::Transfer),
            "validatorReward" => Ok(TxKind::ValidatorReward),
            other => Err(CoreError::UnknownTxKind(other.to_string())),
        }
    }
}

/// A token movement declared by a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcdtTransfer {
    /// Token identifier, e.g. `TEST-abcdef`
    pub token_identifier: Vec<u8>,
    /// Instance nonce; 0 for fungible tokens
    pub nonce: Nonce,
    /// Amount moved
    pub value: BigUint,
}

impl DcdtTransfer {
    /// Create a fungible transfer
    pub fn fungible(token_identifier: impl Into<Vec<u8>>, value: impl Into<BigUint>) -> Self {
        Self {
            token_identifier: token_identifier.into(),
            nonce: 0,
            value: value.into(),
        }
    }

    /// Create a transfer of a non-fungible or semi-fungible instance
    pub fn instance(
        token_identifier: impl Into<Vec<u8>>,
        nonce: Nonce,
        value: impl Into<BigUint>,
    ) -> Self {
        Self {
            token_identifier: token_identifier.into(),
            nonce,
            value: value.into(),
        }
    }
}

/// Transaction descriptor produced by the scenario layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction kind
    pub kind: TxKind,
    /// Sender; required for every kind except validator rewards
    pub from: Option<Address>,
    /// Recipient; for deployments this is ignored by the VM
    pub to: Address,
    /// Native value moved with the transaction
    pub value: BigUint,
    /// Gas limit
    pub gas_limit: Gas,
    /// Gas price
    pub gas_price: u64,
    /// Contract code, for deployments
    pub code: Vec<u8>,
    /// Contract code metadata, for deployments
    pub code_metadata: Specified<Vec<u8>>,
    /// Function to call
    pub function: String,
    /// Call arguments
    pub arguments: Vec<Vec<u8>>,
    /// Token transfers performed before the main call
    pub dcdt_transfers: Vec<DcdtTransfer>,
}

impl Transaction {
    /// Create an empty transaction of the given kind
    pub fn new(kind: TxKind, from: Option<Address>, to: Address) -> Self {
        Self {
            kind,
            from,
            to,
            value: BigUint::default(),
            gas_limit: 0,
            gas_price: 0,
            code: Vec::new(),
            code_metadata: Specified::Unspecified,
            function: String::new(),
            arguments: Vec::new(),
            dcdt_transfers: Vec::new(),
        }
    }

    /// Create a simple transfer transaction
    pub fn transfer(from: Address, to: Address, value: impl Into<BigUint>) -> Self {
        Self::new(TxKind::Transfer, Some(from), to).with_value(value)
    }

    /// Create a contract call transaction
    pub fn call(from: Address, to: Address, function: impl Into<String>) -> Self {
        let mut tx = Self::new(TxKind::Call, Some(from), to);
        tx.function = function.into();
        tx
    }

    /// Create a contract query
    pub fn query(to: Address, function: impl Into<String>) -> Self {
        let mut tx = Self::new(TxKind::Query, Some(to.clone()), to);
        tx.function = function.into();
        tx
    }

    /// Create a contract deployment transaction
    pub fn deploy(from: Address, code: Vec<u8>) -> Self {
        let mut tx = Self::new(TxKind::Deploy, Some(from), Address::default());
        tx.code = code;
        tx
    }

    /// Create a validator reward
    pub fn validator_reward(to: Address, reward: impl Into<BigUint>) -> Self {
        Self::new(TxKind::ValidatorReward, None, to).with_value(reward)
    }

    /// Set the native value
    pub fn with_value(mut self, value: impl Into<BigUint>) -> Self {
        self.value = value.into();
        self
    }

    /// Set gas limit and price
    pub fn with_gas(mut self, gas_limit: Gas, gas_price: u64) -> Self {
        self.gas_limit = gas_limit;
        self.gas_price = gas_price;
        self
    }

    /// Set call arguments
    pub fn with_arguments(mut self, arguments: Vec<Vec<u8>>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Attach a token transfer
    pub fn with_dcdt(mut self, transfer: DcdtTransfer) -> Self {
        self.dcdt_transfers.push(transfer);
        self
    }

    /// Sender address, failing for kinds that require one
    pub fn sender(&self) -> CoreResult<&Address> {
        self.from.as_ref().ok_or_else(|| {
            CoreError::InvalidTransaction(format!("{} transaction without sender", self.kind))
        })
    }
}

/// Expected outcome of a transaction; `None` fields are not checked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxExpect {
    /// Expected return data
    pub out: Option<Vec<Vec<u8>>>,
    /// Expected return code
    pub status: Option<ReturnCode>,
    /// Expected return message
    pub message: Option<String>,
    /// Expected gas remaining, only checked when gas checks are enabled
    pub gas: Option<u64>,
    /// Expected gas refund
    pub refund: Option<BigUint>,
    /// Expected log entries
    pub logs: Option<Vec<LogEntry>>,
}

impl TxExpect {
    /// Expect a plain successful execution
    pub fn ok() -> Self {
        Self {
            status: Some(ReturnCode::Ok),
            ..Self::default()
        }
    }

    /// Expect a given return code
    pub fn status(code: ReturnCode) -> Self {
        Self {
            status: Some(code),
            ..Self::default()
        }
    }
}

/// One transaction step of a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxStep {
    /// Transaction identifier, also used to derive the tx hash
    pub id: String,
    /// Optional free-form comment
    pub comment: Option<String>,
    /// The transaction
    pub tx: Transaction,
    /// Expected outcome
    pub expect: Option<TxExpect>,
    /// Log the VM output entries of this step
    pub display_logs: bool,
}

impl TxStep {
    /// Create a step without expectations
    pub fn new(id: impl Into<String>, tx: Transaction) -> Self {
        Self {
            id: id.into(),
            comment: None,
            tx,
            expect: None,
            display_logs: false,
        }
    }

    /// Attach an expectation
    pub fn expect(mut self, expect: TxExpect) -> Self {
        self.expect = Some(expect);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("scCall".parse::<TxKind>().unwrap(), TxKind::Call);
        assert_eq!(
            "validatorReward".parse::<TxKind>().unwrap(),
            TxKind::ValidatorReward
        );

        let err = "scUpgrade".parse::<TxKind>().unwrap_err();
        assert!(err.to_string().contains("unknown transaction type"));
    }

    #[test]
    fn test_has_sender() {
        assert!(TxKind::Deploy.has_sender());
        assert!(TxKind::Query.has_sender());
        assert!(!TxKind::ValidatorReward.has_sender());
    }

    #[test]
    fn test_transfer_builder() {
        let alice = Address::from_name("alice");
        let bob = Address::from_name("bob");
        let tx = Transaction::transfer(alice.clone(), bob.clone(), 100u32).with_gas(10, 1);

        assert_eq!(tx.kind, TxKind::Transfer);
        assert_eq!(tx.sender().unwrap(), &alice);
        assert_eq!(tx.to, bob);
        assert_eq!(tx.value, BigUint::from(100u32));
        assert_eq!(tx.gas_limit, 10);
    }

    #[test]
    fn test_reward_has_no_sender() {
        let tx = Transaction::validator_reward(Address::from_name("validator"), 5u32);
        assert!(tx.sender().is_err());
    }
}
