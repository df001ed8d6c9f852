//! Transaction execution pipeline

use crate::builtin::{BuiltinDispatcher, DirectTransfer};
use crate::check::check_tx_results;
use crate::config::ExecutorConfig;
use crate::state::AccountStore;
use crate::vm::VirtualMachine;
use crate::{StepError, VmError, VmResult};
use num_bigint::BigInt;
use parking_lot::{Mutex, MutexGuard};
use simchain_core::{
    biguint_from_bytes, biguint_to_bytes, to_signed, Address, ContractCallInput,
    ContractCreateInput, DcdtTransferInput, Gas, OutputAccount, Specified, Transaction, TxKind,
    TxStep, VmInput, VmOutput,
};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Code metadata used for deployments that do not declare any
pub const DEFAULT_CODE_METADATA: [u8; 2] = [0x05, 0x00];

/// Storage key accumulating validator rewards
pub const REWARD_KEY: &[u8] = b"DHARITRIreward";

/// Lifecycle of a transaction against the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Committed,
    RolledBack,
}

/// A backup opened for one transaction.
///
/// Begins by snapshotting the store and ends in exactly one of commit or
/// rollback.
#[derive(Debug)]
pub struct TxSession {
    state: SessionState,
}

impl TxSession {
    /// Snapshot the store and open the session
    pub fn begin(store: &mut AccountStore) -> VmResult<Self> {
        store.create_state_backup()?;
        Ok(Self {
            state: SessionState::Open,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn ensure_open(&self) -> VmResult<()> {
        if self.state != SessionState::Open {
            return Err(VmError::State(format!(
                "transaction session already closed: {:?}",
                self.state
            )));
        }
        Ok(())
    }

    /// Keep every change made since the session began
    pub fn commit(&mut self, store: &mut AccountStore) -> VmResult<()> {
        self.ensure_open()?;
        store.commit_changes()?;
        self.state = SessionState::Committed;
        Ok(())
    }

    /// Discard every change made since the session began
    pub fn rollback(&mut self, store: &mut AccountStore) -> VmResult<()> {
        self.ensure_open()?;
        store.rollback_changes()?;
        self.state = SessionState::RolledBack;
        Ok(())
    }

    /// Commit on success, roll back on failure.
    ///
    /// A failed rollback replaces the original error.
    pub fn finish<T>(mut self, store: &mut AccountStore, result: VmResult<T>) -> VmResult<T> {
        match result {
            Ok(value) => {
                self.commit(store)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback(store) {
                    warn!(error = %err, "rollback failed after transaction error");
                    return Err(rollback_err);
                }
                Err(err)
            }
        }
    }
}

/// Executes transactions against an account store
#[derive(Debug)]
pub struct TransactionExecutor<V> {
    world: AccountStore,
    vm: V,
    builtins: BuiltinDispatcher,
    config: ExecutorConfig,
}

impl<V: VirtualMachine> TransactionExecutor<V> {
    /// Create an executor with the default configuration
    pub fn new(vm: V) -> VmResult<Self> {
        Self::with_config(vm, ExecutorConfig::default())
    }

    /// Create an executor over an empty world
    pub fn with_config(vm: V, config: ExecutorConfig) -> VmResult<Self> {
        config.validate()?;
        let world = AccountStore::new();
        let builtins = BuiltinDispatcher::with_transfer_functions(
            world.codec(),
            &config.gas_schedule,
            config.shard_coordinator(),
        )?;
        Ok(Self {
            world,
            vm,
            builtins,
            config,
        })
    }

    /// Replace the world; builtins are re-registered against its codec
    pub fn with_world(mut self, world: AccountStore) -> VmResult<Self> {
        self.builtins = BuiltinDispatcher::with_transfer_functions(
            world.codec(),
            &self.config.gas_schedule,
            self.config.shard_coordinator(),
        )?;
        self.world = world;
        Ok(self)
    }

    pub fn world(&self) -> &AccountStore {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut AccountStore {
        &mut self.world
    }

    pub fn vm(&self) -> &V {
        &self.vm
    }

    pub fn vm_mut(&mut self) -> &mut V {
        &mut self.vm
    }

    pub fn builtins(&self) -> &BuiltinDispatcher {
        &self.builtins
    }

    pub fn builtins_mut(&mut self) -> &mut BuiltinDispatcher {
        &mut self.builtins
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute one transaction atomically.
    ///
    /// Returns the output when it was applied. A non-Ok output comes back
    /// as [`VmError::TxFailed`]; in that case and on any other error the
    /// world is left exactly as it was before the call.
    pub fn execute_tx(&mut self, tx_id: &str, tx: &Transaction) -> VmResult<VmOutput> {
        debug!(tx_id, kind = %tx.kind, "executing tx");

        let session = TxSession::begin(&mut self.world)?;
        let result = self.run_tx(tx_id, tx);
        let result = session.finish(&mut self.world, result);

        match &result {
            Ok(output) => debug!(tx_id, gas_remaining = output.gas_remaining, "tx applied"),
            Err(err) => debug!(tx_id, error = %err, "tx rolled back"),
        }
        result
    }

    /// Execute a scenario step and check its expected result.
    ///
    /// A failed transaction whose expected status matches its return code
    /// counts as executed, and the rest of the expectation is checked
    /// against its output.
    pub fn execute_tx_step(&mut self, step: &TxStep) -> Result<VmOutput, StepError> {
        trace!(tx_id = %step.id, "tx step");
        if let Some(comment) = &step.comment {
            trace!(tx_id = %step.id, comment = %comment);
        }

        let expected_status = step.expect.as_ref().and_then(|expect| expect.status);
        let output = match self.execute_tx(&step.id, &step.tx) {
            Ok(output) => output,
            Err(VmError::TxFailed {
                return_code,
                output,
                ..
            }) if expected_status == Some(return_code) => *output,
            Err(err) => return Err(err.into()),
        };

        if step.display_logs {
            for log in &output.logs {
                let topics: Vec<String> = log.topics.iter().map(hex::encode).collect();
                info!(
                    tx_id = %step.id,
                    identifier = %String::from_utf8_lossy(&log.identifier),
                    address = %log.address,
                    topics = ?topics,
                    data = %hex::encode(&log.data),
                    "log entry"
                );
            }
        }

        if let Some(expect) = &step.expect {
            check_tx_results(&step.id, expect, self.config.check_gas, &output)?;
        }
        Ok(output)
    }

    fn run_tx(&mut self, tx_id: &str, tx: &Transaction) -> VmResult<VmOutput> {
        let mut gas_for_execution = 0;

        // 1. sender bookkeeping and declared token transfers
        if tx.kind.has_sender() {
            let sender = tx.sender()?;
            self.world
                .update_world_state_before(sender, tx.gas_limit, tx.gas_price)
                .map_err(|e| VmError::Setup(format!("could not set up tx {}: {}", tx_id, e)))?;

            gas_for_execution = tx.gas_limit;
            if !tx.dcdt_transfers.is_empty() {
                gas_for_execution = self.transfer_tokens(tx_id, sender, tx)?;
            }
        }

        // 2. native balance guard
        if !self.sender_can_pay(tx)? {
            return Err(tx_failed(VmOutput::out_of_funds()));
        }

        // 3. queries run as the contract calling itself
        let query;
        let tx = if tx.kind == TxKind::Query {
            query = as_query(tx);
            &query
        } else {
            tx
        };

        // 4. run the body
        let output = match tx.kind {
            TxKind::Deploy => self.deploy(tx_id, tx, gas_for_execution)?,
            TxKind::Call => self.sc_call(tx_id, tx, gas_for_execution)?,
            TxKind::Query => self.sc_call(tx_id, tx, tx.gas_limit)?,
            TxKind::Transfer => transfer_output(tx),
            TxKind::ValidatorReward => self.validator_reward(tx)?,
        };

        // 5. apply
        if !output.is_ok() {
            return Err(tx_failed(output));
        }
        self.update_state_after_tx(tx, &output)?;
        Ok(output)
    }

    fn transfer_tokens(&mut self, tx_id: &str, sender: &Address, tx: &Transaction) -> VmResult<Gas> {
        let ctx = DirectTransfer {
            sender,
            destination: &tx.to,
            gas_provided: tx.gas_limit,
            gas_price: tx.gas_price,
            tx_id,
        };
        match tx.dcdt_transfers.as_slice() {
            [single] => self
                .builtins
                .perform_direct_dcdt_transfer(&mut self.world, &ctx, single),
            transfers => self.builtins.perform_direct_multi_dcdt_transfer(
                &mut self.world,
                &ctx,
                transfers,
            ),
        }
    }

    fn sender_can_pay(&self, tx: &Transaction) -> VmResult<bool> {
        if !tx.kind.has_sender() {
            return Ok(true);
        }
        let sender = tx.sender()?;
        let balance = self
            .world
            .get_account(sender)
            .map(|account| account.balance.clone())
            .unwrap_or_default();
        if balance < tx.value {
            debug!(sender = %sender, balance = %balance, value = %tx.value, "sender cannot cover value");
            return Ok(false);
        }
        Ok(true)
    }

    fn vm_input(&self, tx_id: &str, tx: &Transaction, gas: Gas) -> VmResult<VmInput> {
        let mut input = VmInput::for_tx(tx_id, tx.sender()?.clone(), tx.value.clone(), gas);
        input.arguments = tx.arguments.clone();
        input.gas_price = tx.gas_price;
        input.dcdt_transfers = tx.dcdt_transfers.iter().map(DcdtTransferInput::from).collect();
        Ok(input)
    }

    fn deploy(&mut self, tx_id: &str, tx: &Transaction, gas: Gas) -> VmResult<VmOutput> {
        let contract_code_metadata = match &tx.code_metadata {
            Specified::Unspecified => DEFAULT_CODE_METADATA.to_vec(),
            Specified::Default => Vec::new(),
            Specified::Explicit(metadata) => metadata.clone(),
        };
        let input = ContractCreateInput {
            vm_input: self.vm_input(tx_id, tx, gas)?,
            contract_code: tx.code.clone(),
            contract_code_metadata,
        };

        let output = self.vm.create(&input)?;
        self.trace_gas(tx_id, "deploy", gas, &output);
        Ok(output)
    }

    fn sc_call(&mut self, tx_id: &str, tx: &Transaction, gas: Gas) -> VmResult<VmOutput> {
        let recipient = self
            .world
            .get_account(&tx.to)
            .ok_or_else(|| VmError::AccountNotFound(tx.to.clone()))?;
        if !recipient.is_contract() {
            return Err(VmError::NotASmartContract(tx.to.clone()));
        }

        let input = ContractCallInput {
            vm_input: self.vm_input(tx_id, tx, gas)?,
            recipient: tx.to.clone(),
            function: tx.function.clone(),
            allow_init_function: false,
        };

        let output = self.vm.call(&input)?;
        self.trace_gas(tx_id, &tx.function, gas, &output);
        Ok(output)
    }

    fn validator_reward(&self, tx: &Transaction) -> VmResult<VmOutput> {
        let recipient = self
            .world
            .get_account(&tx.to)
            .ok_or_else(|| VmError::AccountNotFound(tx.to.clone()))?;

        let total = biguint_from_bytes(&recipient.storage_value(REWARD_KEY)) + &tx.value;
        let mut output = VmOutput::ok();
        output.add_account(
            OutputAccount::new(tx.to.clone())
                .with_balance_delta(to_signed(&tx.value))
                .with_storage(REWARD_KEY, biguint_to_bytes(&total)),
        );
        Ok(output)
    }

    fn update_state_after_tx(&mut self, tx: &Transaction, output: &VmOutput) -> VmResult<()> {
        let value = to_signed(&tx.value);
        if tx.kind.has_sender() {
            self.world.update_balance_with_delta(tx.sender()?, &-value.clone())?;
        }

        self.world
            .update_accounts(output.output_accounts.values(), &output.deleted_accounts)?;

        if tx.kind.has_sender() {
            let sum: BigInt = output.balance_delta_sum();
            if sum != value {
                return Err(VmError::BalanceDeltaMismatch { sum, value });
            }
        }
        Ok(())
    }

    fn trace_gas(&self, tx_id: &str, operation: &str, gas_provided: Gas, output: &VmOutput) {
        if self.config.trace_gas {
            info!(
                tx_id,
                operation,
                gas_used = gas_provided.saturating_sub(output.gas_remaining),
                "gas trace"
            );
        }
    }
}

fn tx_failed(output: VmOutput) -> VmError {
    VmError::TxFailed {
        return_code: output.return_code,
        message: output.return_message.clone(),
        output: Box::new(output),
    }
}

fn as_query(tx: &Transaction) -> Transaction {
    let mut query = tx.clone();
    query.from = Some(tx.to.clone());
    query.gas_limit = i64::MAX as Gas;
    query
}

fn transfer_output(tx: &Transaction) -> VmOutput {
    let mut output = VmOutput::ok();
    output.add_account(OutputAccount::new(tx.to.clone()).with_balance_delta(to_signed(&tx.value)));
    output
}

/// Executor shared between threads
#[derive(Debug)]
pub struct SharedExecutor<V> {
    inner: Arc<Mutex<TransactionExecutor<V>>>,
}

impl<V> Clone for SharedExecutor<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: VirtualMachine> SharedExecutor<V> {
    pub fn new(executor: TransactionExecutor<V>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(executor)),
        }
    }

    pub fn execute_tx(&self, tx_id: &str, tx: &Transaction) -> VmResult<VmOutput> {
        self.inner.lock().execute_tx(tx_id, tx)
    }

    pub fn execute_tx_step(&self, step: &TxStep) -> Result<VmOutput, StepError> {
        self.inner.lock().execute_tx_step(step)
    }

    /// Exclusive access for setup and inspection
    pub fn lock(&self) -> MutexGuard<'_, TransactionExecutor<V>> {
        self.inner.lock()
    }
}
