//! Account model

use crate::dcdt::TokenRecord;
use crate::{VmError, VmResult};
use num_bigint::{BigInt, BigUint, Sign};
use serde::{Deserialize, Serialize};
use simchain_core::Address;
use std::collections::BTreeMap;

/// Raw key/value storage of an account
pub type Storage = BTreeMap<Vec<u8>, Vec<u8>>;

/// Account information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account address
    pub address: Address,
    /// Account nonce (number of transactions sent)
    pub nonce: u64,
    /// Account balance
    pub balance: BigUint,
    /// Owner, for contracts
    pub owner: Option<Address>,
    /// Contract code (empty for user accounts)
    pub code: Vec<u8>,
    /// Contract code metadata
    pub code_metadata: Vec<u8>,
    /// Storage; a key is never mapped to an empty value
    pub storage: Storage,
}

impl Account {
    /// Create a new empty account
    pub fn new(address: Address) -> Self {
        Self {
            address,
            nonce: 0,
            balance: BigUint::default(),
            owner: None,
            code: Vec::new(),
            code_metadata: Vec::new(),
            storage: Storage::new(),
        }
    }

    /// Create an account with initial balance
    pub fn with_balance(address: Address, balance: impl Into<BigUint>) -> Self {
        let mut account = Self::new(address);
        account.balance = balance.into();
        account
    }

    /// Check if account is a contract
    pub fn is_contract(&self) -> bool {
        !self.code.is_empty()
    }

    /// Increment nonce
    pub fn increment_nonce(&mut self) {
        self.nonce += 1;
    }

    /// Add to balance
    pub fn add_balance(&mut self, amount: &BigUint) {
        self.balance += amount;
    }

    /// Subtract from balance
    pub fn sub_balance(&mut self, amount: &BigUint) -> VmResult<()> {
        if self.balance < *amount {
            return Err(VmError::InsufficientBalance {
                required: amount.to_string(),
                available: self.balance.to_string(),
            });
        }
        self.balance -= amount;
        Ok(())
    }

    /// Apply a signed balance change, refusing to go below zero
    pub fn apply_balance_delta(&mut self, delta: &BigInt) -> VmResult<()> {
        let (sign, magnitude) = delta.clone().into_parts();
        match sign {
            Sign::Minus => self.sub_balance(&magnitude).map_err(|_| VmError::NegativeValue),
            _ => {
                self.add_balance(&magnitude);
                Ok(())
            }
        }
    }

    /// Get storage value; empty if absent
    pub fn storage_value(&self, key: &[u8]) -> Vec<u8> {
        self.storage.get(key).cloned().unwrap_or_default()
    }

    /// Set storage value; an empty value removes the key
    pub fn set_storage(&mut self, key: Vec<u8>, value: Vec<u8>) {
        if value.is_empty() {
            self.storage.remove(&key);
        } else {
            self.storage.insert(key, value);
        }
    }
}

/// Account description used to pre-seed the world
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSeed {
    pub address: Address,
    pub nonce: u64,
    pub balance: BigUint,
    pub owner: Option<Address>,
    pub code: Vec<u8>,
    pub code_metadata: Vec<u8>,
    /// Raw storage entries
    pub storage: Storage,
    /// Token records, written through the token codec
    pub tokens: Vec<TokenRecord>,
}

impl AccountSeed {
    /// Seed for a plain account with a balance
    pub fn new(address: Address, balance: impl Into<BigUint>) -> Self {
        Self {
            address,
            nonce: 0,
            balance: balance.into(),
            owner: None,
            code: Vec::new(),
            code_metadata: Vec::new(),
            storage: Storage::new(),
            tokens: Vec::new(),
        }
    }

    /// Attach contract code
    pub fn with_code(mut self, code: Vec<u8>) -> Self {
        self.code = code;
        self
    }

    /// Attach a token record
    pub fn with_token(mut self, record: TokenRecord) -> Self {
        self.tokens.push(record);
        self
    }

    /// Add a raw storage entry
    pub fn with_storage(mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.storage.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> Address {
        Address::from_name("acct")
    }

    #[test]
    fn test_account_creation() {
        let account = Account::new(addr());
        assert_eq!(account.nonce, 0);
        assert_eq!(account.balance, BigUint::from(0u32));
        assert!(!account.is_contract());
    }

    #[test]
    fn test_balance_operations() {
        let mut account = Account::new(addr());

        account.add_balance(&BigUint::from(500u32));
        assert_eq!(account.balance, BigUint::from(500u32));

        account.sub_balance(&BigUint::from(200u32)).unwrap();
        assert_eq!(account.balance, BigUint::from(300u32));

        // Insufficient balance should fail
        assert!(account.sub_balance(&BigUint::from(400u32)).is_err());
    }

    #[test]
    fn test_balance_delta() {
        let mut account = Account::with_balance(addr(), 100u32);
        account.apply_balance_delta(&BigInt::from(-40)).unwrap();
        assert_eq!(account.balance, BigUint::from(60u32));

        account.apply_balance_delta(&BigInt::from(15)).unwrap();
        assert_eq!(account.balance, BigUint::from(75u32));

        let err = account.apply_balance_delta(&BigInt::from(-76)).unwrap_err();
        assert!(matches!(err, VmError::NegativeValue));
        assert_eq!(account.balance, BigUint::from(75u32));
    }

    #[test]
    fn test_storage_pruning() {
        let mut account = Account::new(addr());
        account.set_storage(b"key".to_vec(), b"value".to_vec());
        assert_eq!(account.storage_value(b"key"), b"value".to_vec());

        account.set_storage(b"key".to_vec(), Vec::new());
        assert!(account.storage.is_empty());
        assert!(account.storage_value(b"key").is_empty());
    }
}
