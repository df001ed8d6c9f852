//! Property tests for the execution core
//!
//! - Rollback restores the exact world
//! - Applied outputs conserve the declared value
//! - A sender short of the value gets OutOfFunds and changes nothing
//! - Token records survive a storage round trip
//! - Compaction depends only on the record shape

use num_bigint::{BigInt, BigUint};
use proptest::prelude::*;
use simchain_core::{Address, OutputAccount, ReturnCode, Specified, Transaction, VmOutput};
use simchain_vm::testing::MockVm;
use simchain_vm::{
    Account, AccountSeed, AccountStore, Storage, StorePhase, TokenCodec, TokenEntry,
    TokenInstance, TokenRecord, TransactionExecutor, VmError,
};

const PROPTEST_CASES: u32 = 64;

const IDENTIFIERS: [&str; 3] = ["AAA-111111", "BBB-222222", "CCCC-abcdef"];

fn address(idx: u8) -> Address {
    Address::from_name(&format!("user{}", idx))
}

fn contract() -> Address {
    Address::from_name("contract")
}

fn snapshot(store: &AccountStore) -> Vec<Account> {
    store.accounts().cloned().collect()
}

fn total_balance(store: &AccountStore) -> BigUint {
    store.accounts().map(|account| account.balance.clone()).sum()
}

// ============================================================================
// Rollback
// ============================================================================

#[derive(Debug, Clone)]
enum Mutation {
    SetBalance(u8, u64),
    BumpNonce(u8),
    Write(u8, Vec<u8>, Vec<u8>),
    Create(u8),
    Remove(u8),
}

fn mutation_strategy() -> impl Strategy<Value = Mutation> {
    prop_oneof![
        (0u8..6, any::<u64>()).prop_map(|(idx, balance)| Mutation::SetBalance(idx, balance)),
        (0u8..6).prop_map(Mutation::BumpNonce),
        (
            0u8..6,
            prop::collection::vec(any::<u8>(), 1..4),
            prop::collection::vec(any::<u8>(), 0..4)
        )
            .prop_map(|(idx, key, value)| Mutation::Write(idx, key, value)),
        (0u8..8).prop_map(Mutation::Create),
        (0u8..6).prop_map(Mutation::Remove),
    ]
}

fn apply_mutation(store: &mut AccountStore, mutation: &Mutation) {
    match mutation {
        Mutation::SetBalance(idx, balance) => {
            if let Some(account) = store.get_account_mut(&address(*idx)) {
                account.balance = BigUint::from(*balance);
            }
        }
        Mutation::BumpNonce(idx) => {
            if let Some(account) = store.get_account_mut(&address(*idx)) {
                account.increment_nonce();
            }
        }
        Mutation::Write(idx, key, value) => {
            if let Some(account) = store.get_account_mut(&address(*idx)) {
                account.set_storage(key.clone(), value.clone());
            }
        }
        Mutation::Create(idx) => store.put_account(Account::with_balance(address(*idx), 1u32)),
        Mutation::Remove(idx) => {
            store.remove_account(&address(*idx));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(PROPTEST_CASES))]

    #[test]
    fn prop_rollback_restores_world(
        balances in prop::collection::vec(any::<u64>(), 1..6),
        mutations in prop::collection::vec(mutation_strategy(), 0..30),
    ) {
        let mut store = AccountStore::new();
        for (idx, balance) in balances.iter().enumerate() {
            store
                .seed_account(
                    AccountSeed::new(address(idx as u8), *balance)
                        .with_storage(vec![idx as u8], vec![1]),
                )
                .unwrap();
        }
        let before = snapshot(&store);

        store.create_state_backup().unwrap();
        for mutation in &mutations {
            apply_mutation(&mut store, mutation);
        }
        store.rollback_changes().unwrap();

        prop_assert_eq!(snapshot(&store), before);
        prop_assert_eq!(store.phase(), StorePhase::Idle);
        prop_assert!(!store.has_backup());
    }
}

// ============================================================================
// Execution
// ============================================================================

fn executor(sender_balance: u64) -> TransactionExecutor<MockVm> {
    let mut executor = TransactionExecutor::new(MockVm::new()).unwrap();
    let world = executor.world_mut();
    world.put_account(Account::with_balance(address(0), sender_balance));
    world.put_account(Account::new(address(1)));
    world
        .seed_account(AccountSeed::new(contract(), 0u32).with_code(b"code".to_vec()))
        .unwrap();
    executor
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(PROPTEST_CASES))]

    #[test]
    fn prop_transfer_conserves_total(balance in 0u64..1_000_000, value in 0u64..1_000_000) {
        let mut executor = executor(balance);
        let total = total_balance(executor.world());

        let result = executor.execute_tx("tx", &Transaction::transfer(address(0), address(2), value));

        prop_assert_eq!(total_balance(executor.world()), total);
        prop_assert_eq!(executor.world().phase(), StorePhase::Idle);
        if value <= balance {
            prop_assert!(result.is_ok());
            let received = executor.world().get_account(&address(2)).unwrap().balance.clone();
            prop_assert_eq!(received, BigUint::from(value));
        } else {
            prop_assert_eq!(result.unwrap_err().return_code(), Some(ReturnCode::OutOfFunds));
        }
    }

    #[test]
    fn prop_out_of_funds_leaves_world_unchanged(balance in 0u64..1_000, extra in 1u64..1_000) {
        let mut executor = executor(balance);
        let before = snapshot(executor.world());

        let tx = Transaction::call(address(0), contract(), "pay").with_value(balance + extra);
        let err = executor.execute_tx("tx", &tx).unwrap_err();

        prop_assert_eq!(err.return_code(), Some(ReturnCode::OutOfFunds));
        prop_assert_eq!(snapshot(executor.world()), before);
        prop_assert!(executor.vm().calls().is_empty());
    }

    #[test]
    fn prop_balance_deltas_must_match_value(
        value in 0u64..10_000,
        split in 0u64..10_000,
        skew in -5i64..5,
    ) {
        let mut executor = executor(10_000);
        let before = snapshot(executor.world());

        let to_contract = split.min(value);
        let to_other = (value - to_contract) as i64 + skew;
        prop_assume!(to_other >= 0);

        let mut output = VmOutput::ok();
        output.add_account(OutputAccount::new(contract()).with_balance_delta(to_contract));
        output.add_account(OutputAccount::new(address(1)).with_balance_delta(to_other));
        executor.vm_mut().push_output(output);

        let tx = Transaction::call(address(0), contract(), "split").with_value(value);
        let result = executor.execute_tx("tx", &tx);

        if skew == 0 {
            let applied = result.unwrap();
            prop_assert_eq!(applied.balance_delta_sum(), BigInt::from(value));
            prop_assert_eq!(
                executor.world().get_account(&address(0)).unwrap().balance.clone(),
                BigUint::from(10_000 - value)
            );
        } else {
            let is_mismatch = matches!(result, Err(VmError::BalanceDeltaMismatch { .. }));
            prop_assert!(is_mismatch);
            prop_assert_eq!(snapshot(executor.world()), before);
        }
    }
}

// ============================================================================
// Token codec
// ============================================================================

fn instance_strategy(nonce: u64) -> impl Strategy<Value = TokenInstance> {
    (
        0u64..1_000,
        prop::collection::vec(any::<u8>(), 0..4),
        0u32..=10_000,
        prop::collection::vec(prop::collection::vec(any::<u8>(), 1..4), 0..2),
        prop::collection::vec(any::<u8>(), 0..4),
    )
        .prop_map(move |(balance, creator, royalties, uris, attributes)| TokenInstance {
            nonce: if nonce == 0 {
                Specified::Unspecified
            } else {
                Specified::Explicit(nonce)
            },
            balance: BigUint::from(balance),
            creator,
            royalties,
            hash: Vec::new(),
            uris,
            attributes,
        })
}

fn record_strategy(identifier: &'static str) -> impl Strategy<Value = TokenRecord> {
    (
        prop::collection::btree_set(0u64..6, 0..4),
        prop::option::of(prop::collection::vec("[A-Za-z]{1,8}", 0..3)),
        0u64..10,
        any::<bool>(),
    )
        .prop_flat_map(move |(nonces, roles, last_nonce, frozen)| {
            let instances: Vec<_> = nonces.into_iter().map(instance_strategy).collect();
            instances.prop_map(move |instances| {
                let mut record = TokenRecord::new(identifier.as_bytes().to_vec());
                record.instances = instances;
                if let Some(roles) = &roles {
                    record.roles = Specified::Explicit(roles.clone());
                }
                if last_nonce > 0 {
                    record.last_nonce = Specified::Explicit(last_nonce);
                }
                if frozen {
                    record.frozen = Specified::Explicit(true);
                }
                record
            })
        })
}

/// Comparable view of a record, ignoring representation-only differences
#[derive(Debug, PartialEq, Eq)]
struct Normalized {
    identifier: Vec<u8>,
    instances: Vec<(u64, BigUint, Vec<u8>, u32, Vec<Vec<u8>>, Vec<u8>)>,
    roles: Vec<String>,
    last_nonce: u64,
    frozen: bool,
}

fn normalize(record: &TokenRecord) -> Option<Normalized> {
    let mut instances: Vec<_> = record
        .instances
        .iter()
        .filter(|instance| instance.balance.bits() > 0)
        .map(|instance| {
            (
                instance.nonce(),
                instance.balance.clone(),
                instance.creator.clone(),
                instance.royalties,
                instance.uris.clone(),
                instance.attributes.clone(),
            )
        })
        .collect();
    instances.sort_by_key(|instance| instance.0);

    let roles = record.roles.value();
    let last_nonce = record.last_nonce.value();
    let frozen = record.frozen.value() && !instances.is_empty();
    if instances.is_empty() && !record.roles.is_specified() && last_nonce == 0 {
        return None;
    }
    Some(Normalized {
        identifier: record.identifier.clone(),
        instances,
        roles,
        last_nonce,
        frozen,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(PROPTEST_CASES))]

    #[test]
    fn prop_codec_round_trip(
        first in record_strategy(IDENTIFIERS[0]),
        second in record_strategy(IDENTIFIERS[1]),
        third in record_strategy(IDENTIFIERS[2]),
    ) {
        let records = vec![first, second, third];
        let codec = TokenCodec::default();
        let mut storage = Storage::new();
        codec.write_records(&records, &mut storage).unwrap();

        let decoded: Vec<Normalized> = codec
            .read_records(&storage, None)
            .unwrap()
            .iter()
            .filter_map(normalize)
            .collect();
        let expected: Vec<Normalized> = records.iter().filter_map(normalize).collect();

        prop_assert_eq!(decoded, expected);
    }

    #[test]
    fn prop_compaction_follows_shape(record in record_strategy(IDENTIFIERS[0])) {
        let has_roles = record.roles.explicit().map(|roles| !roles.is_empty()).unwrap_or(false);
        let compact_shape = record.instances.len() == 1
            && record.instances[0].nonce() == 0
            && !has_roles
            && !record.frozen.is_specified();

        match TokenEntry::from_record(&record) {
            TokenEntry::Compact(balance) => {
                prop_assert!(compact_shape);
                prop_assert_eq!(&balance, &record.instances[0].balance);
            }
            TokenEntry::Full(full) => {
                prop_assert!(!compact_shape);
                prop_assert_eq!(full, record);
            }
        }
    }
}
