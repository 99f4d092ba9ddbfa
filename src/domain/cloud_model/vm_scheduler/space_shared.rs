use std::any::Any;
use std::collections::BTreeMap;

use crate::domain::cloud_model::resource::mips_share::MipsShare;
use crate::domain::cloud_model::resource::pe::{Pe, PeStatus};
use crate::domain::cloud_model::utils::id::VmId;
use crate::domain::cloud_model::vm_scheduler::vm_scheduler_trait::{VmScheduler, VmSchedulerBase};
use crate::error::AllocationError;

/// Gives every virtual PE a whole physical PE of its own. A PE serves at most one Vm at a time,
/// and a Vm gets either all of its PEs or none.
#[derive(Debug, Clone, Default)]
pub struct VmSchedulerSpaceShared {
    base: VmSchedulerBase,
    /// Indices into the Host's PE list held by each Vm.
    pe_map: BTreeMap<VmId, Vec<usize>>,
}

impl VmSchedulerSpaceShared {
    pub fn new(migration_overhead: f64) -> Self {
        Self { base: VmSchedulerBase::new(migration_overhead), pe_map: BTreeMap::new() }
    }

    pub fn get_pes_of(&self, vm: VmId) -> &[usize] {
        self.pe_map.get(&vm).map(|v| v.as_slice()).unwrap_or(&[])
    }

    fn free_pes_for(pes: &[Pe], per_pe_mips: f64) -> Vec<usize> {
        pes.iter().enumerate().filter(|(_, pe)| pe.is_free() && pe.get_mips() >= per_pe_mips).map(|(index, _)| index).collect()
    }

    fn release(&mut self, pes: &mut [Pe], vm: VmId) -> f64 {
        let mut freed = 0.0;
        for index in self.pe_map.remove(&vm).unwrap_or_default() {
            let pe = &mut pes[index];
            freed += pe.get_provisioner_mut().deallocate(vm);
            if pe.get_status() == PeStatus::Busy {
                pe.set_status(PeStatus::Free);
            }
        }
        freed
    }
}

impl VmScheduler for VmSchedulerSpaceShared {
    fn get_base(&self) -> &VmSchedulerBase {
        &self.base
    }

    fn get_base_mut(&mut self) -> &mut VmSchedulerBase {
        &mut self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_suitable(&self, pes: &[Pe], request: &MipsShare) -> bool {
        !request.is_empty() && Self::free_pes_for(pes, request.max()).len() >= request.len()
    }

    fn allocate_pes(&mut self, pes: &mut [Pe], vm: VmId, request: &MipsShare) -> Result<(), AllocationError> {
        assert!(!request.is_empty(), "Vm {} requested zero PEs", vm);

        // A re-allocation frees the Vm's old PEs first; they are re-taken if the new request fails.
        let previous = self.base.allocated.get(&vm).cloned();
        if previous.is_some() {
            self.release(pes, vm);
        }

        let candidates = Self::free_pes_for(pes, request.max());
        if candidates.len() < request.len() {
            if let Some(previous) = previous {
                let restore = Self::free_pes_for(pes, previous.max());
                self.assign(pes, vm, &previous, &restore);
            }
            log::debug!("SpaceShared: Vm {} needs {} PEs of {} MIPS, only {} free.", vm, request.len(), request.max(), candidates.len());
            return Err(AllocationError::InsufficientPes { requested: request.len(), available: candidates.len() });
        }

        self.assign(pes, vm, request, &candidates);
        self.base.requested.insert(vm, request.clone());
        Ok(())
    }

    fn deallocate_pes(&mut self, pes: &mut [Pe], vm: VmId) -> f64 {
        self.release(pes, vm);
        self.base.forget(vm)
    }

    fn get_available_mips(&self, pes: &[Pe]) -> f64 {
        pes.iter().filter(|pe| pe.is_free()).map(|pe| pe.get_mips()).sum()
    }

    /// Every vPE needs a PE of its own, so vPEs are taken away round-robin in Vm id order until
    /// their sum fits the working PEs.
    fn shed_vpes(&self, working: usize, vpes: &mut BTreeMap<VmId, usize>) {
        let mut to_remove = vpes.values().sum::<usize>().saturating_sub(working);
        while to_remove > 0 {
            let before = to_remove;
            for remaining in vpes.values_mut().filter(|remaining| **remaining > 0) {
                if to_remove == 0 {
                    break;
                }
                *remaining -= 1;
                to_remove -= 1;
            }
            if before == to_remove {
                break;
            }
        }
    }
}

impl VmSchedulerSpaceShared {
    fn assign(&mut self, pes: &mut [Pe], vm: VmId, request: &MipsShare, candidates: &[usize]) {
        let mut chosen = Vec::with_capacity(request.len());
        for (&mips, &index) in request.iter().zip(candidates.iter()) {
            let pe = &mut pes[index];
            let capacity = pe.get_mips();
            if pe.get_provisioner_mut().allocate(vm, mips.min(capacity)) {
                pe.set_status(PeStatus::Busy);
                chosen.push(index);
            }
        }
        self.pe_map.insert(vm, chosen);
        self.base.allocated.insert(vm, request.clone());
    }
}
