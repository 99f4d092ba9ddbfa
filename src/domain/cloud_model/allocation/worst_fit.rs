use crate::domain::cloud_model::allocation::comparator::{AvailableMipsCompare, suitable_hosts};
use crate::domain::cloud_model::allocation::vm_allocation_policy_trait::VmAllocationPolicy;
use crate::domain::cloud_model::host::Host;
use crate::domain::cloud_model::vm::Vm;

/// Spreads Vms out: picks the suitable Host with the most available MIPS.
#[derive(Debug, Clone, Default)]
pub struct VmAllocationPolicyWorstFit;

impl VmAllocationPolicy for VmAllocationPolicyWorstFit {
    fn get_name(&self) -> &'static str {
        "WorstFit"
    }

    fn find_host_for_vm(&mut self, hosts: &[Host], vm: &Vm) -> Option<usize> {
        let comparator = AvailableMipsCompare::new(true);
        suitable_hosts(hosts, vm).min_by(|a, b| comparator.compare(*a, *b)).map(|(index, _)| index)
    }

    fn find_host_for_migration(&mut self, hosts: &[Host], vm: &Vm, current: usize) -> Option<usize> {
        let comparator = AvailableMipsCompare::new(true);
        suitable_hosts(hosts, vm).filter(|(index, _)| *index != current).min_by(|a, b| comparator.compare(*a, *b)).map(|(index, _)| index)
    }
}
