//! Builtin (protocol-native) functions and their dispatcher

pub mod shard;
pub mod transfer;

pub use shard::{ModuloShard, ShardCoordinator, SingleShard};
pub use transfer::{
    register_transfer_functions, DcdtNftTransfer, DcdtTransfer, MultiDcdtNftTransfer,
    DCDT_NFT_TRANSFER, DCDT_TRANSFER, MULTI_DCDT_NFT_TRANSFER,
};

use crate::account::Account;
use crate::dcdt::TokenCodec;
use crate::gas::GasSchedule;
use crate::state::AccountStore;
use crate::{VmError, VmResult};
use num_bigint::BigUint;
use simchain_core::{
    biguint_to_bytes, u64_to_bytes, Address, ContractCallInput, DcdtTransfer as TxDcdtTransfer,
    DcdtTransferInput, Gas, OutputAccount, ReturnCode, VmInput, VmOutput,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A native operation invoked like a contract call.
///
/// Either handle is `None` when the account does not live in this world.
/// The recipient is also `None` when it is the caller itself.
pub trait BuiltinFunction: Send + Sync + fmt::Debug {
    fn process(
        &self,
        caller: Option<&mut Account>,
        recipient: Option<&mut Account>,
        input: &ContractCallInput,
    ) -> VmResult<BuiltinOutcome>;
}

/// Result of a builtin function
#[derive(Debug, Clone)]
pub struct BuiltinOutcome {
    pub output: VmOutput,
    /// Changes to accounts other than the loaded caller and recipient
    pub side_effects: Vec<OutputAccount>,
}

impl BuiltinOutcome {
    pub fn new(output: VmOutput) -> Self {
        Self {
            output,
            side_effects: Vec::new(),
        }
    }

    /// Outcome that changes nothing
    pub fn failure(return_code: ReturnCode, message: impl Into<String>) -> Self {
        Self::new(VmOutput::failure(return_code, message))
    }

    /// Side-effect entry for an address, created on first use
    pub fn side_effect(&mut self, address: &Address) -> &mut OutputAccount {
        let index = match self.side_effects.iter().position(|a| a.address == *address) {
            Some(index) => index,
            None => {
                self.side_effects.push(OutputAccount::new(address.clone()));
                self.side_effects.len() - 1
            }
        };
        &mut self.side_effects[index]
    }
}

/// Name-keyed registry of builtin functions
#[derive(Debug, Clone, Default)]
pub struct BuiltinContainer {
    functions: BTreeMap<String, Arc<dyn BuiltinFunction>>,
}

impl BuiltinContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> VmResult<Arc<dyn BuiltinFunction>> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| VmError::UnknownFunction(name.to_string()))
    }

    /// Register a function; names are unique
    pub fn add(&mut self, name: impl Into<String>, function: Arc<dyn BuiltinFunction>) -> VmResult<()> {
        let name = name.into();
        if self.functions.contains_key(&name) {
            return Err(VmError::DuplicateFunction(name));
        }
        self.functions.insert(name, function);
        Ok(())
    }
}

/// Context of a token transfer declared on a transaction
#[derive(Debug, Clone, Copy)]
pub struct DirectTransfer<'a> {
    pub sender: &'a Address,
    pub destination: &'a Address,
    pub gas_provided: Gas,
    pub gas_price: u64,
    pub tx_id: &'a str,
}

/// Runs builtin functions against an account store
#[derive(Debug, Clone)]
pub struct BuiltinDispatcher {
    container: BuiltinContainer,
    shard: Arc<dyn ShardCoordinator>,
}

impl BuiltinDispatcher {
    pub fn new(container: BuiltinContainer, shard: Arc<dyn ShardCoordinator>) -> Self {
        Self { container, shard }
    }

    /// Dispatcher with the native transfer functions registered
    pub fn with_transfer_functions(
        codec: &TokenCodec,
        schedule: &GasSchedule,
        shard: Arc<dyn ShardCoordinator>,
    ) -> VmResult<Self> {
        let mut container = BuiltinContainer::new();
        register_transfer_functions(&mut container, codec, schedule)?;
        Ok(Self::new(container, shard))
    }

    pub fn container(&self) -> &BuiltinContainer {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut BuiltinContainer {
        &mut self.container
    }

    pub fn names(&self) -> Vec<String> {
        self.container.names()
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.container.contains(name)
    }

    fn local_account(&self, store: &AccountStore, address: &Address) -> Option<Account> {
        if !self.shard.is_local(address) {
            return None;
        }
        store.get_account(address).cloned()
    }

    /// Run a builtin call.
    ///
    /// Caller and recipient are loaded only when they are local. On an Ok
    /// output the caller, the recipient (when distinct) and the local side
    /// effects are written back; otherwise nothing is.
    pub fn process(&self, store: &mut AccountStore, input: &ContractCallInput) -> VmResult<VmOutput> {
        let function = self.container.get(&input.function)?;

        let caller_address = &input.vm_input.caller;
        let mut caller = self.local_account(store, caller_address);
        let mut recipient = if input.recipient == *caller_address {
            None
        } else {
            self.local_account(store, &input.recipient)
        };

        let outcome = function.process(caller.as_mut(), recipient.as_mut(), input)?;
        if !outcome.output.is_ok() {
            debug!(
                function = %input.function,
                return_code = %outcome.output.return_code,
                message = %outcome.output.return_message,
                "builtin function failed"
            );
            return Ok(outcome.output);
        }

        if let Some(account) = caller {
            store.put_account(account);
        }
        if let Some(account) = recipient {
            store.put_account(account);
        }

        let (local, foreign): (Vec<&OutputAccount>, Vec<&OutputAccount>) = outcome
            .side_effects
            .iter()
            .partition(|account| self.shard.is_local(&account.address));
        for account in foreign {
            warn!(address = %account.address, "dropping builtin effect on foreign shard");
        }
        store.update_accounts(local, &[])?;

        Ok(outcome.output)
    }

    fn process_direct(
        &self,
        store: &mut AccountStore,
        function: &str,
        recipient: &Address,
        arguments: Vec<Vec<u8>>,
        transfers: &[TxDcdtTransfer],
        ctx: &DirectTransfer<'_>,
    ) -> VmResult<Gas> {
        let mut vm_input = VmInput::for_tx(
            ctx.tx_id,
            ctx.sender.clone(),
            BigUint::default(),
            ctx.gas_provided,
        );
        vm_input.arguments = arguments;
        vm_input.gas_price = ctx.gas_price;
        vm_input.dcdt_transfers = transfers.iter().map(DcdtTransferInput::from).collect();

        let input = ContractCallInput {
            vm_input,
            recipient: recipient.clone(),
            function: function.to_string(),
            allow_init_function: false,
        };

        let output = self.process(store, &input)?;
        if !output.is_ok() {
            return Err(VmError::BuiltinFailed {
                function: function.to_string(),
                return_code: output.return_code,
                message: output.return_message,
            });
        }
        Ok(output.gas_remaining)
    }

    /// Move one declared token transfer; returns the gas left for the main call.
    ///
    /// Fungible tokens go through `DCDTTransfer` on the destination. Instances
    /// go through `DCDTNFTTransfer` called on the sender, naming the
    /// destination as the last argument.
    pub fn perform_direct_dcdt_transfer(
        &self,
        store: &mut AccountStore,
        ctx: &DirectTransfer<'_>,
        transfer: &TxDcdtTransfer,
    ) -> VmResult<Gas> {
        let value = biguint_to_bytes(&transfer.value);
        if transfer.nonce == 0 {
            let arguments = vec![transfer.token_identifier.clone(), value];
            self.process_direct(
                store,
                DCDT_TRANSFER,
                ctx.destination,
                arguments,
                std::slice::from_ref(transfer),
                ctx,
            )
        } else {
            let arguments = vec![
                transfer.token_identifier.clone(),
                u64_to_bytes(transfer.nonce),
                value,
                ctx.destination.as_bytes().to_vec(),
            ];
            self.process_direct(
                store,
                DCDT_NFT_TRANSFER,
                ctx.sender,
                arguments,
                std::slice::from_ref(transfer),
                ctx,
            )
        }
    }

    /// Move several declared token transfers in one builtin call; returns the
    /// gas left for the main call
    pub fn perform_direct_multi_dcdt_transfer(
        &self,
        store: &mut AccountStore,
        ctx: &DirectTransfer<'_>,
        transfers: &[TxDcdtTransfer],
    ) -> VmResult<Gas> {
        let mut arguments = vec![
            ctx.destination.as_bytes().to_vec(),
            u64_to_bytes(transfers.len() as u64),
        ];
        for transfer in transfers {
            arguments.push(transfer.token_identifier.clone());
            arguments.push(u64_to_bytes(transfer.nonce));
            arguments.push(biguint_to_bytes(&transfer.value));
        }
        self.process_direct(store, MULTI_DCDT_NFT_TRANSFER, ctx.sender, arguments, transfers, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountSeed;
    use crate::dcdt::{TokenInstance, TokenRecord};

    fn alice() -> Address {
        Address::from_name("alice")
    }

    fn bob() -> Address {
        Address::from_name("bob")
    }

    fn dispatcher(schedule: &GasSchedule) -> BuiltinDispatcher {
        BuiltinDispatcher::with_transfer_functions(&TokenCodec::default(), schedule, Arc::new(SingleShard))
            .unwrap()
    }

    fn world() -> AccountStore {
        let mut store = AccountStore::new();
        store
            .seed_account(
                AccountSeed::new(alice(), 0u32)
                    .with_token(TokenRecord::fungible(b"TEST-abcdef".to_vec(), 100u32))
                    .with_token(
                        TokenRecord::new(b"NFT-123456".to_vec())
                            .with_instance(TokenInstance::with_nonce(1, 1u32)),
                    ),
            )
            .unwrap();
        store
    }

    fn ctx<'a>(sender: &'a Address, destination: &'a Address, gas: Gas) -> DirectTransfer<'a> {
        DirectTransfer {
            sender,
            destination,
            gas_provided: gas,
            gas_price: 1,
            tx_id: "transfer-1",
        }
    }

    #[test]
    fn test_container() {
        let dispatcher = dispatcher(&GasSchedule::default());
        assert_eq!(
            dispatcher.names(),
            vec![
                DCDT_NFT_TRANSFER.to_string(),
                DCDT_TRANSFER.to_string(),
                MULTI_DCDT_NFT_TRANSFER.to_string()
            ]
        );
        assert!(dispatcher.is_builtin(DCDT_TRANSFER));
        assert!(matches!(
            dispatcher.container().get("ChangeOwnerAddress"),
            Err(VmError::UnknownFunction(_))
        ));

        let mut container = dispatcher.container().clone();
        let err = container
            .add(DCDT_TRANSFER, Arc::new(DcdtTransfer::new(TokenCodec::default(), 0)))
            .unwrap_err();
        assert!(matches!(err, VmError::DuplicateFunction(_)));
    }

    #[test]
    fn test_direct_fungible_transfer() {
        let dispatcher = dispatcher(&GasSchedule::default());
        let mut store = world();
        let (alice, bob) = (alice(), bob());

        let transfer = TxDcdtTransfer::fungible(b"TEST-abcdef".to_vec(), 40u32);
        let gas_left = dispatcher
            .perform_direct_dcdt_transfer(&mut store, &ctx(&alice, &bob, 1_000_000), &transfer)
            .unwrap();

        assert_eq!(gas_left, 800_000);
        assert_eq!(
            store.token_balance(&alice, b"TEST-abcdef", 0).unwrap(),
            BigUint::from(60u32)
        );
        // recipient did not exist before and is created by the transfer
        assert_eq!(
            store.token_balance(&bob, b"TEST-abcdef", 0).unwrap(),
            BigUint::from(40u32)
        );
    }

    #[test]
    fn test_direct_nft_transfer() {
        let dispatcher = dispatcher(&GasSchedule::zero());
        let mut store = world();
        let (alice, bob) = (alice(), bob());

        let transfer = TxDcdtTransfer::instance(b"NFT-123456".to_vec(), 1, 1u32);
        dispatcher
            .perform_direct_dcdt_transfer(&mut store, &ctx(&alice, &bob, 0), &transfer)
            .unwrap();

        assert_eq!(
            store.token_balance(&alice, b"NFT-123456", 1).unwrap(),
            BigUint::default()
        );
        let records = store.token_records(&bob).unwrap();
        assert_eq!(records[0].instances[0].nonce(), 1);
    }

    #[test]
    fn test_direct_multi_transfer() {
        let dispatcher = dispatcher(&GasSchedule::default());
        let mut store = world();
        let (alice, bob) = (alice(), bob());

        let transfers = vec![
            TxDcdtTransfer::fungible(b"TEST-abcdef".to_vec(), 100u32),
            TxDcdtTransfer::instance(b"NFT-123456".to_vec(), 1, 1u32),
        ];
        let gas_left = dispatcher
            .perform_direct_multi_dcdt_transfer(&mut store, &ctx(&alice, &bob, 500_000), &transfers)
            .unwrap();

        assert_eq!(gas_left, 100_000);
        assert!(store.token_records(&alice).unwrap().is_empty());
        assert_eq!(store.token_records(&bob).unwrap().len(), 2);
    }

    #[test]
    fn test_failed_transfer_is_error_and_writes_nothing() {
        let dispatcher = dispatcher(&GasSchedule::default());
        let mut store = world();
        let (alice, bob) = (alice(), bob());
        let before = store.token_records(&alice).unwrap();

        let transfer = TxDcdtTransfer::fungible(b"TEST-abcdef".to_vec(), 1_000u32);
        let err = dispatcher
            .perform_direct_dcdt_transfer(&mut store, &ctx(&alice, &bob, 1_000_000), &transfer)
            .unwrap_err();
        assert_eq!(err.return_code(), Some(ReturnCode::UserError));
        assert_eq!(
            err.to_string(),
            "DCDTTransfer failed: retcode = 4, msg = insufficient funds"
        );
        assert_eq!(store.token_records(&alice).unwrap(), before);
        assert!(store.get_account(&bob).is_none());

        let err = dispatcher
            .perform_direct_dcdt_transfer(
                &mut store,
                &ctx(&alice, &bob, 10),
                &TxDcdtTransfer::fungible(b"TEST-abcdef".to_vec(), 1u32),
            )
            .unwrap_err();
        assert_eq!(err.return_code(), Some(ReturnCode::OutOfGas));
    }

    #[test]
    fn test_foreign_shard_recipient_is_absent() {
        let alice = Address::new(vec![0xa0, 0x00]);
        let remote = Address::new(vec![0xb0, 0x01]);
        let mut store = AccountStore::new();
        store
            .seed_account(
                AccountSeed::new(alice.clone(), 0u32)
                    .with_token(TokenRecord::fungible(b"TEST-abcdef".to_vec(), 10u32)),
            )
            .unwrap();
        store.put_account(Account::new(remote.clone()));
        let before_remote = store.get_account(&remote).cloned();

        let dispatcher = BuiltinDispatcher::with_transfer_functions(
            &TokenCodec::default(),
            &GasSchedule::zero(),
            Arc::new(ModuloShard::new(2, 0)),
        )
        .unwrap();

        let transfer = TxDcdtTransfer::fungible(b"TEST-abcdef".to_vec(), 3u32);
        dispatcher
            .perform_direct_dcdt_transfer(&mut store, &ctx(&alice, &remote, 0), &transfer)
            .unwrap();

        // only the local side is written
        assert_eq!(
            store.token_balance(&alice, b"TEST-abcdef", 0).unwrap(),
            BigUint::from(7u32)
        );
        assert_eq!(store.get_account(&remote).cloned(), before_remote);
    }

    #[test]
    fn test_unknown_function() {
        let dispatcher = dispatcher(&GasSchedule::default());
        let mut store = world();
        let input = ContractCallInput {
            vm_input: VmInput::for_tx("tx", alice(), BigUint::default(), 0),
            recipient: alice(),
            function: "SetUserName".to_string(),
            allow_init_function: false,
        };
        assert!(matches!(
            dispatcher.process(&mut store, &input),
            Err(VmError::UnknownFunction(_))
        ));
    }
}
