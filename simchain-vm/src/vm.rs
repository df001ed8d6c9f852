//! Contract virtual machine interface

use crate::VmResult;
use simchain_core::{ContractCallInput, ContractCreateInput, VmOutput};

/// A smart-contract VM driven by the executor.
///
/// The executor treats it as a black box: inputs go in, a [`VmOutput`] with
/// per-account deltas comes out. An `Err` means the VM itself broke, not
/// that the contract failed; contract failures are non-Ok return codes.
pub trait VirtualMachine: Send {
    /// Deploy a contract
    fn create(&mut self, input: &ContractCreateInput) -> VmResult<VmOutput>;

    /// Call a contract function
    fn call(&mut self, input: &ContractCallInput) -> VmResult<VmOutput>;
}

impl<V: VirtualMachine + ?Sized> VirtualMachine for Box<V> {
    fn create(&mut self, input: &ContractCreateInput) -> VmResult<VmOutput> {
        (**self).create(input)
    }

    fn call(&mut self, input: &ContractCallInput) -> VmResult<VmOutput> {
        (**self).call(input)
    }
}
