use crate::domain::cloud_model::allocation::vm_allocation_policy_trait::VmAllocationPolicy;
use crate::domain::cloud_model::host::Host;
use crate::domain::cloud_model::vm::Vm;

/// Starts each search at the Host after the one chosen last, wrapping around.
#[derive(Debug, Clone, Default)]
pub struct VmAllocationPolicyRoundRobin {
    next_index: usize,
}

impl VmAllocationPolicy for VmAllocationPolicyRoundRobin {
    fn get_name(&self) -> &'static str {
        "RoundRobin"
    }

    fn find_host_for_vm(&mut self, hosts: &[Host], vm: &Vm) -> Option<usize> {
        if hosts.is_empty() {
            return None;
        }

        let start = self.next_index % hosts.len();
        let found = (0..hosts.len()).map(|offset| (start + offset) % hosts.len()).find(|index| hosts[*index].is_suitable(vm))?;
        self.next_index = found + 1;
        Some(found)
    }
}
