//! Scripted VM for harness tests

use crate::vm::VirtualMachine;
use crate::VmResult;
use simchain_core::{
    to_signed, Address, ContractCallInput, ContractCreateInput, OutputAccount, VmOutput,
};
use std::collections::VecDeque;

/// A VM invocation as seen by [`MockVm`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmCall {
    Create(ContractCreateInput),
    Call(ContractCallInput),
}

/// A VM that replays queued outputs.
///
/// With an empty queue it behaves like a contract that accepts everything:
/// deployments create a contract holding the call value, calls move the call
/// value from caller to recipient and return the function name.
#[derive(Debug, Default)]
pub struct MockVm {
    responses: VecDeque<VmResult<VmOutput>>,
    calls: Vec<VmCall>,
    deployed: u64,
}

impl MockVm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the output of the next invocation
    pub fn push_output(&mut self, output: VmOutput) -> &mut Self {
        self.responses.push_back(Ok(output));
        self
    }

    /// Queue a VM-level failure for the next invocation
    pub fn push_error(&mut self, error: crate::VmError) -> &mut Self {
        self.responses.push_back(Err(error));
        self
    }

    /// Every invocation so far, in order
    pub fn calls(&self) -> &[VmCall] {
        &self.calls
    }

    pub fn last_call(&self) -> Option<&VmCall> {
        self.calls.last()
    }

    /// Address the default behavior assigns to the n-th deployment of a creator
    pub fn contract_address(creator: &Address, index: u64) -> Address {
        let mut bytes = vec![0u8; 8];
        bytes.extend(creator.as_bytes().iter().take(16));
        bytes.extend_from_slice(&index.to_be_bytes());
        bytes.resize(32, 0);
        Address::new(bytes)
    }

    fn default_create(&mut self, input: &ContractCreateInput) -> VmOutput {
        let caller = &input.vm_input.caller;
        let contract = Self::contract_address(caller, self.deployed);
        self.deployed += 1;

        let value = to_signed(&input.vm_input.call_value);
        let mut account = OutputAccount::new(contract.clone())
            .with_balance_delta(value)
            .with_code(input.contract_code.clone());
        account.code_metadata = Some(input.contract_code_metadata.clone());
        account.owner = Some(caller.clone());

        let mut output = VmOutput::ok();
        output.gas_remaining = input.vm_input.gas_provided;
        output.return_data = vec![contract.into_bytes()];
        output.add_account(account);
        output
    }

    fn default_call(&mut self, input: &ContractCallInput) -> VmOutput {
        let mut output = VmOutput::ok();
        output.gas_remaining = input.vm_input.gas_provided;
        output.return_data = vec![input.function.as_bytes().to_vec()];
        output.add_account(
            OutputAccount::new(input.recipient.clone())
                .with_balance_delta(to_signed(&input.vm_input.call_value)),
        );
        output
    }
}

impl VirtualMachine for MockVm {
    fn create(&mut self, input: &ContractCreateInput) -> VmResult<VmOutput> {
        self.calls.push(VmCall::Create(input.clone()));
        match self.responses.pop_front() {
            Some(response) => response,
            None => Ok(self.default_create(input)),
        }
    }

    fn call(&mut self, input: &ContractCallInput) -> VmResult<VmOutput> {
        self.calls.push(VmCall::Call(input.clone()));
        match self.responses.pop_front() {
            Some(response) => response,
            None => Ok(self.default_call(input)),
        }
    }
}
