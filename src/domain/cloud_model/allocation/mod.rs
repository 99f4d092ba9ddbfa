pub mod best_fit;
pub mod comparator;
pub mod first_fit;
pub mod round_robin;
pub mod vm_allocation_policy_trait;
pub mod worst_fit;

use std::str::FromStr;

use crate::domain::cloud_model::allocation::best_fit::VmAllocationPolicyBestFit;
use crate::domain::cloud_model::allocation::first_fit::VmAllocationPolicyFirstFit;
use crate::domain::cloud_model::allocation::round_robin::VmAllocationPolicyRoundRobin;
use crate::domain::cloud_model::allocation::vm_allocation_policy_trait::VmAllocationPolicy;
use crate::domain::cloud_model::allocation::worst_fit::VmAllocationPolicyWorstFit;
use crate::error::ConversionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VmAllocationPolicyType {
    #[default]
    FirstFit,
    BestFit,
    WorstFit,
    RoundRobin,
}

impl FromStr for VmAllocationPolicyType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FirstFit" | "Simple" => Ok(VmAllocationPolicyType::FirstFit),
            "BestFit" => Ok(VmAllocationPolicyType::BestFit),
            "WorstFit" => Ok(VmAllocationPolicyType::WorstFit),
            "RoundRobin" => Ok(VmAllocationPolicyType::RoundRobin),
            _ => Err(ConversionError::UnknownAllocationPolicyType(s.to_string())),
        }
    }
}

impl VmAllocationPolicyType {
    pub fn get_instance(&self) -> Box<dyn VmAllocationPolicy> {
        match self {
            VmAllocationPolicyType::FirstFit => Box::new(VmAllocationPolicyFirstFit),
            VmAllocationPolicyType::BestFit => Box::new(VmAllocationPolicyBestFit),
            VmAllocationPolicyType::WorstFit => Box::new(VmAllocationPolicyWorstFit),
            VmAllocationPolicyType::RoundRobin => Box::new(VmAllocationPolicyRoundRobin::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cloud_model::host::Host;
    use crate::domain::cloud_model::resource::pe::Pe;
    use crate::domain::cloud_model::utils::id::{HostId, PeId, VmId};
    use crate::domain::cloud_model::vm::Vm;
    use crate::domain::cloud_model::vm_scheduler::time_shared::VmSchedulerTimeShared;
    use crate::domain::cloud_model::vm_scheduler::vm_scheduler_trait::DEFAULT_MIGRATION_OVERHEAD;
    use crate::error::AllocationError;

    /// Hosts that refuse to oversubscribe their PEs.
    fn hosts(pe_counts: &[u64]) -> Vec<Host> {
        pe_counts
            .iter()
            .enumerate()
            .map(|(h, &count)| {
                let pes = (0..count).map(|i| Pe::new(PeId::new(i), 1000.0)).collect();
                Host::new(HostId::new(h as u64), pes, 8192, 10_000, 100_000, Box::new(VmSchedulerTimeShared::new(DEFAULT_MIGRATION_OVERHEAD, 1.0)))
            })
            .collect()
    }

    fn vm(id: u64) -> Vm {
        Vm::with_time_shared(VmId::new(id), 1000.0, 1, 512, 100, 1000)
    }

    fn place_all(policy: VmAllocationPolicyType, pe_counts: &[u64], vms: u64) -> Vec<usize> {
        let mut hosts = hosts(pe_counts);
        let mut policy = policy.get_instance();
        (0..vms).map(|id| policy.allocate_host_for_vm(&mut hosts, &mut vm(id)).unwrap()).collect()
    }

    #[test]
    fn test_first_fit_fills_hosts_in_order() {
        assert_eq!(place_all(VmAllocationPolicyType::FirstFit, &[2, 2], 3), vec![0, 0, 1]);
    }

    #[test]
    fn test_best_fit_prefers_most_loaded_host() {
        // Host 1 has less room from the start, so it is filled first.
        assert_eq!(place_all(VmAllocationPolicyType::BestFit, &[3, 2], 3), vec![1, 1, 0]);
    }

    #[test]
    fn test_worst_fit_prefers_least_loaded_host() {
        assert_eq!(place_all(VmAllocationPolicyType::WorstFit, &[2, 2], 4), vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_round_robin_rotates() {
        assert_eq!(place_all(VmAllocationPolicyType::RoundRobin, &[4, 4, 4], 4), vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_migration_target_skips_the_current_host() {
        let mut hosts = hosts(&[2, 2, 3]);
        let mut vm = vm(0);
        hosts[0].create_vm(&mut vm).unwrap();

        let mut first_fit = VmAllocationPolicyType::FirstFit.get_instance();
        let mut worst_fit = VmAllocationPolicyType::WorstFit.get_instance();

        assert_eq!(first_fit.find_host_for_migration(&hosts, &vm, 0), Some(1));
        assert_eq!(worst_fit.find_host_for_migration(&hosts, &vm, 0), Some(2));
        assert_eq!(worst_fit.find_host_for_migration(&hosts[..1], &vm, 0), None);
    }

    #[test]
    fn test_no_suitable_host_leaves_hosts_untouched() {
        let mut hosts = hosts(&[1]);
        let mut policy = VmAllocationPolicyType::FirstFit.get_instance();
        policy.allocate_host_for_vm(&mut hosts, &mut vm(0)).unwrap();

        let mut rejected = Vm::with_time_shared(VmId::new(1), 1000.0, 2, 512, 100, 1000);
        let result = policy.allocate_host_for_vm(&mut hosts, &mut rejected);

        assert_eq!(result, Err(AllocationError::NoSuitableHost { vm: "1".to_string() }));
        assert_eq!(hosts[0].get_available_ram(), 8192 - 512);
    }

    #[test]
    fn test_unknown_policy_name_is_rejected() {
        assert_eq!("Nearest".parse::<VmAllocationPolicyType>(), Err(ConversionError::UnknownAllocationPolicyType("Nearest".to_string())));
    }
}
