//! Transaction execution engine for the simulated ledger
//!
//! This crate provides the execution environment scenario harnesses drive:
//! - An account store with single-level backup, rollback and commit
//! - DCDT token storage encoding
//! - Builtin token transfer functions and their dispatcher
//! - The transaction pipeline, expected-result checks and world dumps

pub mod account;
pub mod builtin;
pub mod check;
pub mod config;
pub mod dcdt;
pub mod dump;
pub mod error;
pub mod executor;
pub mod gas;
pub mod hook;
pub mod scenario;
pub mod state;
pub mod testing;
pub mod vm;

pub use account::{Account, AccountSeed, Storage};
pub use builtin::{BuiltinContainer, BuiltinDispatcher, BuiltinFunction, BuiltinOutcome};
pub use check::check_tx_results;
pub use config::ExecutorConfig;
pub use dcdt::{TokenCodec, TokenEntry, TokenInstance, TokenRecord};
pub use dump::{dump_world, world_to_json, AccountDump};
pub use error::{CheckError, StepError, VmError, VmResult};
pub use executor::{SharedExecutor, TransactionExecutor, TxSession};
pub use gas::{GasMeter, GasSchedule};
pub use hook::{NonceOnly, PreTxHook, UpfrontGasCharge};
pub use scenario::{run_scenario, ScenarioReport, Step};
pub use state::{AccountStore, StorePhase};
pub use vm::VirtualMachine;
