//! World-state changes made before a transaction runs

use crate::state::AccountStore;
use crate::{VmError, VmResult};
use num_bigint::BigUint;
use simchain_core::{Address, Gas};
use std::fmt;
use tracing::trace;

/// Adjusts the sender before the transaction body executes.
///
/// Runs inside the transaction backup, so anything it changes is undone on
/// rollback.
pub trait PreTxHook: Send + Sync + fmt::Debug {
    fn before_tx(
        &self,
        store: &mut AccountStore,
        sender: &Address,
        gas_limit: Gas,
        gas_price: u64,
    ) -> VmResult<()>;
}

/// Bumps the sender nonce and charges `gas_limit * gas_price` up front
#[derive(Debug, Clone, Copy, Default)]
pub struct UpfrontGasCharge;

impl PreTxHook for UpfrontGasCharge {
    fn before_tx(
        &self,
        store: &mut AccountStore,
        sender: &Address,
        gas_limit: Gas,
        gas_price: u64,
    ) -> VmResult<()> {
        let account = store
            .get_account_mut(sender)
            .ok_or_else(|| VmError::SenderNotFound(sender.clone()))?;

        let fee = BigUint::from(gas_limit) * BigUint::from(gas_price);
        account.sub_balance(&fee)?;
        account.increment_nonce();

        trace!(sender = %sender, fee = %fee, nonce = account.nonce, "charged upfront gas");
        Ok(())
    }
}

/// Bumps the sender nonce without charging for gas
#[derive(Debug, Clone, Copy, Default)]
pub struct NonceOnly;

impl PreTxHook for NonceOnly {
    fn before_tx(
        &self,
        store: &mut AccountStore,
        sender: &Address,
        _gas_limit: Gas,
        _gas_price: u64,
    ) -> VmResult<()> {
        let account = store
            .get_account_mut(sender)
            .ok_or_else(|| VmError::SenderNotFound(sender.clone()))?;
        account.increment_nonce();
        Ok(())
    }
}
