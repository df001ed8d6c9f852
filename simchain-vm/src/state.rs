//! Account store with transaction backups

use crate::account::{Account, AccountSeed};
use crate::dcdt::{system_account_address, TokenCodec, TokenRecord};
use crate::hook::{PreTxHook, UpfrontGasCharge};
use crate::{VmError, VmResult};
use num_bigint::{BigInt, BigUint};
use simchain_core::{Address, Gas, Nonce, OutputAccount};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Where the store is in the backup cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorePhase {
    /// No transaction in flight
    #[default]
    Idle,
    /// Backup taken, nothing written yet
    BackedUp,
    /// Backup taken and the world has been written to
    Mutated,
}

/// In-memory world: every account, keyed by address.
///
/// At most one backup exists at a time. Transactions never nest, so a
/// second `create_state_backup` before commit or rollback is an error.
#[derive(Debug, Clone)]
pub struct AccountStore {
    accounts: BTreeMap<Address, Account>,
    backup: Option<BTreeMap<Address, Account>>,
    phase: StorePhase,
    codec: TokenCodec,
    hook: Arc<dyn PreTxHook>,
}

impl Default for AccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountStore {
    /// Create an empty store with the default codec and gas-charging hook
    pub fn new() -> Self {
        Self {
            accounts: BTreeMap::new(),
            backup: None,
            phase: StorePhase::Idle,
            codec: TokenCodec::default(),
            hook: Arc::new(UpfrontGasCharge),
        }
    }

    /// Use a different token codec
    pub fn with_codec(mut self, codec: TokenCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Use a different pre-transaction hook
    pub fn with_hook(mut self, hook: Arc<dyn PreTxHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn phase(&self) -> StorePhase {
        self.phase
    }

    pub fn has_backup(&self) -> bool {
        self.backup.is_some()
    }

    fn touch(&mut self) {
        if self.phase == StorePhase::BackedUp {
            self.phase = StorePhase::Mutated;
        }
    }

    /// Snapshot the whole world
    pub fn create_state_backup(&mut self) -> VmResult<()> {
        if self.backup.is_some() {
            return Err(VmError::State("state backup already open".to_string()));
        }
        self.backup = Some(self.accounts.clone());
        self.phase = StorePhase::BackedUp;
        debug!(accounts = self.accounts.len(), "created state backup");
        Ok(())
    }

    /// Restore the world to the last backup and drop it
    pub fn rollback_changes(&mut self) -> VmResult<()> {
        let backup = self
            .backup
            .take()
            .ok_or_else(|| VmError::State("no state backup to roll back to".to_string()))?;
        self.accounts = backup;
        self.phase = StorePhase::Idle;
        debug!("rolled back state changes");
        Ok(())
    }

    /// Keep the current world and drop the backup
    pub fn commit_changes(&mut self) -> VmResult<()> {
        if self.backup.take().is_none() {
            return Err(VmError::State("no state backup to commit".to_string()));
        }
        self.phase = StorePhase::Idle;
        debug!("committed state changes");
        Ok(())
    }

    /// Get account by address
    pub fn get_account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Get account for modification
    pub fn get_account_mut(&mut self, address: &Address) -> Option<&mut Account> {
        if self.accounts.contains_key(address) {
            self.touch();
        }
        self.accounts.get_mut(address)
    }

    /// Insert or replace an account
    pub fn put_account(&mut self, account: Account) {
        self.touch();
        self.accounts.insert(account.address.clone(), account);
    }

    /// Remove an account, returning it if it existed
    pub fn remove_account(&mut self, address: &Address) -> Option<Account> {
        self.touch();
        self.accounts.remove(address)
    }

    /// All accounts in address order
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Storage value of an account; empty when the account or key is absent
    pub fn storage_value(&self, address: &Address, key: &[u8]) -> Vec<u8> {
        self.accounts
            .get(address)
            .map(|account| account.storage_value(key))
            .unwrap_or_default()
    }

    /// Run the pre-transaction hook for a sender
    pub fn update_world_state_before(
        &mut self,
        sender: &Address,
        gas_limit: Gas,
        gas_price: u64,
    ) -> VmResult<()> {
        let hook = Arc::clone(&self.hook);
        hook.before_tx(self, sender, gas_limit, gas_price)
    }

    /// Apply a signed change to an existing account's balance
    pub fn update_balance_with_delta(&mut self, address: &Address, delta: &BigInt) -> VmResult<()> {
        let account = self
            .get_account_mut(address)
            .ok_or_else(|| VmError::AccountNotFound(address.clone()))?;
        account.apply_balance_delta(delta)
    }

    /// Apply the per-account changes of a VM output, then delete accounts.
    ///
    /// Accounts referenced for the first time are created. Not atomic on its
    /// own; callers run it inside a backup.
    pub fn update_accounts<'a>(
        &mut self,
        output_accounts: impl IntoIterator<Item = &'a OutputAccount>,
        deleted: &[Address],
    ) -> VmResult<()> {
        let codec = self.codec.clone();
        self.touch();

        for output in output_accounts {
            let account = self
                .accounts
                .entry(output.address.clone())
                .or_insert_with(|| Account::new(output.address.clone()));

            account.apply_balance_delta(&output.balance_delta)?;

            if let Some(nonce) = output.nonce {
                account.nonce = nonce;
            }
            if let Some(code) = &output.code {
                account.code = code.clone();
            }
            if let Some(code_metadata) = &output.code_metadata {
                account.code_metadata = code_metadata.clone();
            }
            if let Some(owner) = &output.owner {
                account.owner = Some(owner.clone());
            }
            for update in &output.storage_updates {
                account.set_storage(update.offset.clone(), update.data.clone());
            }
            for delta in &output.token_deltas {
                codec.apply_token_delta(delta, &mut account.storage)?;
            }

            trace!(
                address = %output.address,
                balance_delta = %output.balance_delta,
                storage_updates = output.storage_updates.len(),
                token_deltas = output.token_deltas.len(),
                "updated account"
            );
        }

        for address in deleted {
            self.accounts.remove(address);
            trace!(address = %address, "deleted account");
        }
        Ok(())
    }

    /// Add a pre-built account, writing its tokens through the codec
    pub fn seed_account(&mut self, seed: AccountSeed) -> VmResult<()> {
        let mut account = Account::new(seed.address);
        account.nonce = seed.nonce;
        account.balance = seed.balance;
        account.owner = seed.owner;
        account.code = seed.code;
        account.code_metadata = seed.code_metadata;
        for (key, value) in seed.storage {
            account.set_storage(key, value);
        }
        self.codec.write_records(&seed.tokens, &mut account.storage)?;

        self.put_account(account);
        Ok(())
    }

    /// Decode the tokens held by an account, with shared metadata overlaid
    pub fn token_records(&self, address: &Address) -> VmResult<Vec<TokenRecord>> {
        let Some(account) = self.accounts.get(address) else {
            return Ok(Vec::new());
        };
        let system_address = system_account_address();
        let system_storage = if *address == system_address {
            None
        } else {
            self.accounts.get(&system_address).map(|a| &a.storage)
        };
        self.codec.read_records(&account.storage, system_storage)
    }

    /// Balance of one token instance; zero for unknown accounts
    pub fn token_balance(&self, address: &Address, identifier: &[u8], nonce: Nonce) -> VmResult<BigUint> {
        match self.accounts.get(address) {
            Some(account) => self.codec.token_balance(identifier, nonce, &account.storage),
            None => Ok(BigUint::default()),
        }
    }
}
