use crate::domain::cloud_model::allocation::comparator::{AvailableMipsCompare, suitable_hosts};
use crate::domain::cloud_model::allocation::vm_allocation_policy_trait::VmAllocationPolicy;
use crate::domain::cloud_model::host::Host;
use crate::domain::cloud_model::vm::Vm;

/// Packs Vms tightly: picks the suitable Host with the fewest available MIPS.
#[derive(Debug, Clone, Default)]
pub struct VmAllocationPolicyBestFit;

impl VmAllocationPolicy for VmAllocationPolicyBestFit {
    fn get_name(&self) -> &'static str {
        "BestFit"
    }

    fn find_host_for_vm(&mut self, hosts: &[Host], vm: &Vm) -> Option<usize> {
        let comparator = AvailableMipsCompare::new(false);
        suitable_hosts(hosts, vm).min_by(|a, b| comparator.compare(*a, *b)).map(|(index, _)| index)
    }
}
