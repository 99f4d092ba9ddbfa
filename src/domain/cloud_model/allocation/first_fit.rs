use crate::domain::cloud_model::allocation::comparator::suitable_hosts;
use crate::domain::cloud_model::allocation::vm_allocation_policy_trait::VmAllocationPolicy;
use crate::domain::cloud_model::host::Host;
use crate::domain::cloud_model::vm::Vm;

/// Places a Vm on the first Host, in registration order, that can take it.
#[derive(Debug, Clone, Default)]
pub struct VmAllocationPolicyFirstFit;

impl VmAllocationPolicy for VmAllocationPolicyFirstFit {
    fn get_name(&self) -> &'static str {
        "FirstFit"
    }

    fn find_host_for_vm(&mut self, hosts: &[Host], vm: &Vm) -> Option<usize> {
        suitable_hosts(hosts, vm).next().map(|(index, _)| index)
    }
}
