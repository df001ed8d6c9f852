//! Example driving the execution core through a short scenario

use simchain_core::{Address, DcdtTransfer, ReturnCode, Transaction, TxExpect, TxStep};
use simchain_vm::testing::MockVm;
use simchain_vm::{
    run_scenario, world_to_json, AccountSeed, ExecutorConfig, Step, TokenRecord,
    TransactionExecutor,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("Simulated Ledger Demo");
    println!("=====================");

    let alice = Address::from_name("alice");
    let bob = Address::from_name("bob");
    let adder = Address::from_name("adder");

    // Executor with gas tracing on
    println!("\n1. Creating the executor...");
    let config = ExecutorConfig {
        trace_gas: true,
        ..ExecutorConfig::default()
    };
    let mut executor = TransactionExecutor::with_config(MockVm::new(), config)?;
    println!("   Builtins: {}", executor.builtins().names().join(", "));

    println!("\n2. Running the scenario...");
    let steps = vec![
        Step::SetState(vec![
            AccountSeed::new(alice.clone(), 1_000u32)
                .with_token(TokenRecord::fungible(b"TEST-abcdef".to_vec(), 50u32)),
            AccountSeed::new(adder.clone(), 0u32).with_code(b"adder".to_vec()),
        ]),
        Step::Tx(
            TxStep::new("transfer", Transaction::transfer(alice.clone(), bob.clone(), 100u32))
                .expect(TxExpect::ok()),
        ),
        Step::Tx(
            TxStep::new(
                "deposit",
                Transaction::call(alice.clone(), adder.clone(), "deposit")
                    .with_gas(1_000_000, 0)
                    .with_dcdt(DcdtTransfer::fungible(b"TEST-abcdef".to_vec(), 20u32)),
            )
            .expect(TxExpect::ok()),
        ),
        Step::Tx(
            TxStep::new("overdraw", Transaction::transfer(bob.clone(), alice.clone(), 5_000u32))
                .expect(TxExpect::status(ReturnCode::OutOfFunds)),
        ),
        Step::DumpWorld,
    ];
    let report = run_scenario(&mut executor, &steps)?;

    for (tx_id, output) in &report.outputs {
        println!("   {}: {}", tx_id, output.return_code);
    }

    println!("\n3. Final world:");
    if let Some(dump) = report.dumps.last() {
        println!("{}", world_to_json(dump)?);
    }

    println!("\nDemo completed successfully!");
    Ok(())
}
