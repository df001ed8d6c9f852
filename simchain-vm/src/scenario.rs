//! Ordered execution of scenario steps

use crate::account::AccountSeed;
use crate::dump::{dump_world, AccountDump};
use crate::executor::TransactionExecutor;
use crate::vm::VirtualMachine;
use crate::StepError;
use simchain_core::{TxStep, VmOutput};
use tracing::{debug, info};

/// A scenario step with every external reference already resolved
#[derive(Debug, Clone)]
pub enum Step {
    /// Create or overwrite accounts
    SetState(Vec<AccountSeed>),
    /// Execute a transaction and check its expectation
    Tx(TxStep),
    /// Record the current world
    DumpWorld,
    /// Steps of another scenario, run on the same world
    External(Vec<Step>),
}

/// What a scenario run produced
#[derive(Debug, Default)]
pub struct ScenarioReport {
    /// Output of every transaction step, by step id
    pub outputs: Vec<(String, VmOutput)>,
    /// One entry per `DumpWorld` step
    pub dumps: Vec<Vec<AccountDump>>,
    /// Leaf steps executed
    pub steps_run: usize,
}

impl ScenarioReport {
    /// Output of a transaction step
    pub fn output(&self, tx_id: &str) -> Option<&VmOutput> {
        self.outputs
            .iter()
            .find(|(id, _)| id == tx_id)
            .map(|(_, output)| output)
    }
}

/// Run steps in order, stopping at the first failure
pub fn run_scenario<V: VirtualMachine>(
    executor: &mut TransactionExecutor<V>,
    steps: &[Step],
) -> Result<ScenarioReport, StepError> {
    let mut report = ScenarioReport::default();
    run_steps(executor, steps, &mut report)?;
    info!(steps = report.steps_run, "scenario finished");
    Ok(report)
}

fn run_steps<V: VirtualMachine>(
    executor: &mut TransactionExecutor<V>,
    steps: &[Step],
    report: &mut ScenarioReport,
) -> Result<(), StepError> {
    for step in steps {
        match step {
            Step::SetState(seeds) => {
                debug!(accounts = seeds.len(), "set state");
                for seed in seeds {
                    executor.world_mut().seed_account(seed.clone())?;
                }
            }
            Step::Tx(tx_step) => {
                let output = executor.execute_tx_step(tx_step)?;
                report.outputs.push((tx_step.id.clone(), output));
            }
            Step::DumpWorld => {
                report.dumps.push(dump_world(executor.world())?);
            }
            Step::External(inner) => {
                debug!(steps = inner.len(), "external steps");
                run_steps(executor, inner, report)?;
                continue;
            }
        }
        report.steps_run += 1;
    }
    Ok(())
}
