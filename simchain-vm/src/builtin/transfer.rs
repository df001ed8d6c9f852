//! Native DCDT transfer functions

use super::{BuiltinContainer, BuiltinFunction, BuiltinOutcome};
use crate::account::Account;
use crate::dcdt::TokenCodec;
use crate::gas::{GasMeter, GasSchedule};
use crate::VmResult;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;
use simchain_core::{
    biguint_from_bytes, biguint_to_bytes, u64_from_bytes, u64_to_bytes, Address, ContractCallInput,
    Gas, LogEntry, Nonce, ReturnCode, TokenDelta, TokenMetadata, VmOutput,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// Fungible transfer: `[token, value]`, sent to the call recipient
pub const DCDT_TRANSFER: &str = "DCDTTransfer";

/// Instance transfer: `[token, nonce, value, destination]`, called on self
pub const DCDT_NFT_TRANSFER: &str = "DCDTNFTTransfer";

/// Batch transfer: `[destination, count, (token, nonce, value) x count]`,
/// called on self
pub const MULTI_DCDT_NFT_TRANSFER: &str = "MultiDCDTNFTTransfer";

const WRONG_ARGUMENTS: &str = "invalid arguments to process built-in function";

/// Register the three transfer functions
pub fn register_transfer_functions(
    container: &mut BuiltinContainer,
    codec: &TokenCodec,
    schedule: &GasSchedule,
) -> VmResult<()> {
    container.add(
        DCDT_TRANSFER,
        Arc::new(DcdtTransfer::new(codec.clone(), schedule.dcdt_transfer)),
    )?;
    container.add(
        DCDT_NFT_TRANSFER,
        Arc::new(DcdtNftTransfer::new(codec.clone(), schedule.dcdt_nft_transfer)),
    )?;
    container.add(
        MULTI_DCDT_NFT_TRANSFER,
        Arc::new(MultiDcdtNftTransfer::new(codec.clone(), schedule.clone())),
    )?;
    Ok(())
}

#[derive(Debug, Clone)]
struct TransferEntry {
    token: Vec<u8>,
    nonce: Nonce,
    value: BigUint,
}

impl TransferEntry {
    fn delta(&self, sign: Sign, metadata: Option<TokenMetadata>) -> TokenDelta {
        TokenDelta {
            token_identifier: self.token.clone(),
            nonce: self.nonce,
            delta: BigInt::from_biguint(sign, self.value.clone()),
            metadata,
        }
    }

    fn log(&self, function: &str, sender: &Address, destination: &Address) -> LogEntry {
        LogEntry {
            identifier: function.as_bytes().to_vec(),
            address: sender.clone(),
            topics: vec![
                self.token.clone(),
                u64_to_bytes(self.nonce),
                biguint_to_bytes(&self.value),
                destination.as_bytes().to_vec(),
            ],
            data: Vec::new(),
        }
    }
}

/// Reason the sender cannot pay an entry, if any
fn check_sender(codec: &TokenCodec, sender: &Account, entry: &TransferEntry) -> VmResult<Option<String>> {
    if entry.value.is_zero() {
        return Ok(Some("transfer value must be positive".to_string()));
    }
    let stored = codec.token_data(&entry.token, entry.nonce, &sender.storage, None)?;
    if stored.is_frozen() {
        return Ok(Some(format!(
            "account is frozen for token {}",
            String::from_utf8_lossy(&entry.token)
        )));
    }
    if stored.value < entry.value {
        return Ok(Some("insufficient funds".to_string()));
    }
    Ok(None)
}

/// Entries summed per `(token, nonce)`, so a batch naming one instance
/// twice is checked against its combined amount
fn batch_totals(entries: &[TransferEntry]) -> Vec<TransferEntry> {
    let mut totals: BTreeMap<(Vec<u8>, Nonce), BigUint> = BTreeMap::new();
    for entry in entries {
        *totals.entry((entry.token.clone(), entry.nonce)).or_default() += &entry.value;
    }
    totals
        .into_iter()
        .map(|((token, nonce), value)| TransferEntry { token, nonce, value })
        .collect()
}

/// Take an entry out of the sender, returning the instance metadata to
/// hand over with it
fn debit(codec: &TokenCodec, sender: &mut Account, entry: &TransferEntry) -> VmResult<Option<TokenMetadata>> {
    let metadata = if entry.nonce > 0 {
        codec
            .token_data(&entry.token, entry.nonce, &sender.storage, None)?
            .metadata
    } else {
        None
    };
    codec.apply_token_delta(&entry.delta(Sign::Minus, None), &mut sender.storage)?;
    Ok(metadata)
}

/// Give an entry to its destination: the sender itself, the loaded
/// recipient, or a side effect for the dispatcher to apply
fn credit(
    codec: &TokenCodec,
    sender: &mut Account,
    recipient: Option<&mut Account>,
    destination: &Address,
    entry: &TransferEntry,
    metadata: Option<TokenMetadata>,
    outcome: &mut BuiltinOutcome,
) -> VmResult<()> {
    let delta = entry.delta(Sign::Plus, metadata);
    if sender.address == *destination {
        return codec.apply_token_delta(&delta, &mut sender.storage);
    }
    match recipient {
        Some(account) if account.address == *destination => {
            codec.apply_token_delta(&delta, &mut account.storage)
        }
        _ => {
            outcome.side_effect(destination).token_deltas.push(delta);
            Ok(())
        }
    }
}

/// Gas left after charging `cost`, or `None` when the call cannot pay
fn charge(input: &ContractCallInput, cost: Gas) -> Option<Gas> {
    let mut meter = GasMeter::new(input.vm_input.gas_provided);
    meter.consume(cost, &input.function).ok()?;
    Some(meter.remaining())
}

fn success(gas_remaining: Gas) -> BuiltinOutcome {
    let mut output = VmOutput::ok();
    output.gas_remaining = gas_remaining;
    BuiltinOutcome::new(output)
}

/// Fungible token transfer
#[derive(Debug, Clone)]
pub struct DcdtTransfer {
    codec: TokenCodec,
    gas_cost: Gas,
}

impl DcdtTransfer {
    pub fn new(codec: TokenCodec, gas_cost: Gas) -> Self {
        Self { codec, gas_cost }
    }
}

impl BuiltinFunction for DcdtTransfer {
    fn process(
        &self,
        caller: Option<&mut Account>,
        recipient: Option<&mut Account>,
        input: &ContractCallInput,
    ) -> VmResult<BuiltinOutcome> {
        let args = &input.vm_input.arguments;
        if args.len() < 2 {
            return Ok(BuiltinOutcome::failure(ReturnCode::FunctionWrongSignature, WRONG_ARGUMENTS));
        }
        let Some(gas_remaining) = charge(input, self.gas_cost) else {
            return Ok(BuiltinOutcome::failure(ReturnCode::OutOfGas, "not enough gas"));
        };
        let Some(sender) = caller else {
            return Ok(BuiltinOutcome::failure(ReturnCode::UserError, "sender account not found"));
        };

        let entry = TransferEntry {
            token: args[0].clone(),
            nonce: 0,
            value: biguint_from_bytes(&args[1]),
        };
        if let Some(reason) = check_sender(&self.codec, sender, &entry)? {
            return Ok(BuiltinOutcome::failure(ReturnCode::UserError, reason));
        }

        let destination = &input.recipient;
        let mut outcome = success(gas_remaining);
        let metadata = debit(&self.codec, sender, &entry)?;
        credit(&self.codec, sender, recipient, destination, &entry, metadata, &mut outcome)?;
        outcome
            .output
            .logs
            .push(entry.log(DCDT_TRANSFER, &sender.address, destination));

        trace!(
            token = %String::from_utf8_lossy(&entry.token),
            value = %entry.value,
            destination = %destination,
            "fungible transfer"
        );
        Ok(outcome)
    }
}

/// Transfer of a single NFT/SFT instance
#[derive(Debug, Clone)]
pub struct DcdtNftTransfer {
    codec: TokenCodec,
    gas_cost: Gas,
}

impl DcdtNftTransfer {
    pub fn new(codec: TokenCodec, gas_cost: Gas) -> Self {
        Self { codec, gas_cost }
    }
}

impl BuiltinFunction for DcdtNftTransfer {
    fn process(
        &self,
        caller: Option<&mut Account>,
        recipient: Option<&mut Account>,
        input: &ContractCallInput,
    ) -> VmResult<BuiltinOutcome> {
        let args = &input.vm_input.arguments;
        if args.len() < 4 {
            return Ok(BuiltinOutcome::failure(ReturnCode::FunctionWrongSignature, WRONG_ARGUMENTS));
        }
        let Some(gas_remaining) = charge(input, self.gas_cost) else {
            return Ok(BuiltinOutcome::failure(ReturnCode::OutOfGas, "not enough gas"));
        };
        let Some(sender) = caller else {
            return Ok(BuiltinOutcome::failure(ReturnCode::UserError, "sender account not found"));
        };
        if input.recipient != sender.address {
            return Ok(BuiltinOutcome::failure(
                ReturnCode::UserError,
                "instance transfers must be called on the sender",
            ));
        }

        let entry = TransferEntry {
            token: args[0].clone(),
            nonce: u64_from_bytes(&args[1]),
            value: biguint_from_bytes(&args[2]),
        };
        let destination = Address::new(args[3].clone());
        if let Some(reason) = check_sender(&self.codec, sender, &entry)? {
            return Ok(BuiltinOutcome::failure(ReturnCode::UserError, reason));
        }

        let mut outcome = success(gas_remaining);
        let metadata = debit(&self.codec, sender, &entry)?;
        credit(&self.codec, sender, recipient, &destination, &entry, metadata, &mut outcome)?;
        outcome
            .output
            .logs
            .push(entry.log(DCDT_NFT_TRANSFER, &sender.address, &destination));
        Ok(outcome)
    }
}

/// Transfer of several token instances to one destination
#[derive(Debug, Clone)]
pub struct MultiDcdtNftTransfer {
    codec: TokenCodec,
    schedule: GasSchedule,
}

impl MultiDcdtNftTransfer {
    pub fn new(codec: TokenCodec, schedule: GasSchedule) -> Self {
        Self { codec, schedule }
    }

    fn parse_entries(args: &[Vec<u8>]) -> Option<(Address, Vec<TransferEntry>)> {
        if args.len() < 2 {
            return None;
        }
        let destination = Address::new(args[0].clone());
        let count = usize::try_from(u64_from_bytes(&args[1])).ok()?;
        if count == 0 || args.len() < 2 + count.checked_mul(3)? {
            return None;
        }

        let entries = args[2..2 + count * 3]
            .chunks(3)
            .map(|chunk| TransferEntry {
                token: chunk[0].clone(),
                nonce: u64_from_bytes(&chunk[1]),
                value: biguint_from_bytes(&chunk[2]),
            })
            .collect();
        Some((destination, entries))
    }
}

impl BuiltinFunction for MultiDcdtNftTransfer {
    fn process(
        &self,
        caller: Option<&mut Account>,
        mut recipient: Option<&mut Account>,
        input: &ContractCallInput,
    ) -> VmResult<BuiltinOutcome> {
        let Some((destination, entries)) = Self::parse_entries(&input.vm_input.arguments) else {
            return Ok(BuiltinOutcome::failure(ReturnCode::FunctionWrongSignature, WRONG_ARGUMENTS));
        };
        let cost = self.schedule.multi_transfer_cost(entries.len());
        let Some(gas_remaining) = charge(input, cost) else {
            return Ok(BuiltinOutcome::failure(ReturnCode::OutOfGas, "not enough gas"));
        };
        let Some(sender) = caller else {
            return Ok(BuiltinOutcome::failure(ReturnCode::UserError, "sender account not found"));
        };
        if input.recipient != sender.address {
            return Ok(BuiltinOutcome::failure(
                ReturnCode::UserError,
                "multi transfers must be called on the sender",
            ));
        }

        if entries.iter().any(|entry| entry.value.is_zero()) {
            return Ok(BuiltinOutcome::failure(
                ReturnCode::UserError,
                "transfer value must be positive",
            ));
        }
        for total in batch_totals(&entries) {
            if let Some(reason) = check_sender(&self.codec, sender, &total)? {
                return Ok(BuiltinOutcome::failure(ReturnCode::UserError, reason));
            }
        }

        let mut outcome = success(gas_remaining);
        for entry in &entries {
            let metadata = debit(&self.codec, sender, entry)?;
            credit(
                &self.codec,
                sender,
                recipient.as_deref_mut(),
                &destination,
                entry,
                metadata,
                &mut outcome,
            )?;
            outcome
                .output
                .logs
                .push(entry.log(MULTI_DCDT_NFT_TRANSFER, &sender.address, &destination));
        }
        Ok(outcome)
    }
}
