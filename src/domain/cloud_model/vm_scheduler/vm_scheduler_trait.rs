use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::cloud_model::resource::mips_share::MipsShare;
use crate::domain::cloud_model::resource::pe::Pe;
use crate::domain::cloud_model::utils::id::VmId;
use crate::error::AllocationError;

/// Fraction of a Vm's MIPS reserved on the target Host while the Vm migrates in, and withheld on
/// the source Host while it migrates out.
pub const DEFAULT_MIGRATION_OVERHEAD: f64 = 0.1;

/// Host-level policy distributing the MIPS of the Host's PEs among its resident Vms.
///
/// The PEs themselves are owned by the Host and passed into every call; the scheduler only keeps
/// the bookkeeping of what each Vm requested and what it got.
pub trait VmScheduler: std::fmt::Debug + Any + Send {
    fn get_base(&self) -> &VmSchedulerBase;

    fn get_base_mut(&mut self) -> &mut VmSchedulerBase;

    fn as_any(&self) -> &dyn Any;

    /// Returns true if `request` could be granted with the current allocations of `pes`.
    fn is_suitable(&self, pes: &[Pe], request: &MipsShare) -> bool;

    /// Grants `request` to the Vm, replacing any previous allocation it held.
    ///
    /// On failure the scheduler and the PEs are left as they were before the call.
    fn allocate_pes(&mut self, pes: &mut [Pe], vm: VmId, request: &MipsShare) -> Result<(), AllocationError>;

    /// Releases everything the Vm holds and returns the freed MIPS. Unknown Vms free nothing.
    fn deallocate_pes(&mut self, pes: &mut [Pe], vm: VmId) -> f64;

    /// MIPS that could still be granted to a new Vm.
    fn get_available_mips(&self, pes: &[Pe]) -> f64;

    /// Lowers the vPE counts in `vpes` until every Vm fits on `working` PEs again.
    fn shed_vpes(&self, working: usize, vpes: &mut BTreeMap<VmId, usize>);

    /// Grants `request` to a Vm that already lived on this Host before it lost PEs.
    fn reallocate_pes(&mut self, pes: &mut [Pe], vm: VmId, request: &MipsShare) -> Result<(), AllocationError> {
        self.allocate_pes(pes, vm, request)
    }

    fn get_allocated_mips(&self, vm: VmId) -> MipsShare {
        self.get_base().allocated.get(&vm).cloned().unwrap_or_default()
    }

    fn get_requested_mips(&self, vm: VmId) -> MipsShare {
        self.get_base().requested.get(&vm).cloned().unwrap_or_default()
    }

    fn get_total_allocated_mips_for(&self, vm: VmId) -> f64 {
        self.get_base().allocated.get(&vm).map(|share| share.total()).unwrap_or(0.0)
    }

    fn get_total_allocated_mips(&self) -> f64 {
        self.get_base().allocated.values().map(|share| share.total()).sum()
    }

    fn get_migration_overhead(&self) -> f64 {
        self.get_base().migration_overhead
    }

    fn is_migrating_in(&self, vm: VmId) -> bool {
        self.get_base().migrating_in.contains(&vm)
    }

    fn is_migrating_out(&self, vm: VmId) -> bool {
        self.get_base().migrating_out.contains(&vm)
    }

    fn get_allocated_vms(&self) -> Vec<VmId> {
        self.get_base().allocated.keys().copied().collect()
    }

    /// Reserves `overhead × request` for a Vm that is about to migrate onto this Host.
    fn allocate_pes_for_migration_in(&mut self, pes: &mut [Pe], vm: VmId, request: &MipsShare) -> Result<(), AllocationError> {
        let reserved = request.scaled(self.get_migration_overhead());

        self.get_base_mut().migrating_in.insert(vm);
        if let Err(e) = self.allocate_pes(pes, vm, &reserved) {
            self.get_base_mut().migrating_in.remove(&vm);
            return Err(e);
        }

        Ok(())
    }

    /// Replaces the migration reservation with the Vm's full request.
    fn finish_migration_in(&mut self, pes: &mut [Pe], vm: VmId, request: &MipsShare) -> Result<(), AllocationError> {
        self.get_base_mut().migrating_in.remove(&vm);
        self.deallocate_pes(pes, vm);
        self.allocate_pes(pes, vm, request)
    }

    /// Reduces the Vm's allocation to `(1 − overhead) × allocation` while it migrates away.
    fn mark_migrating_out(&mut self, pes: &mut [Pe], vm: VmId) -> Result<(), AllocationError> {
        let current = self.get_allocated_mips(vm);
        if current.is_empty() {
            return Err(AllocationError::InvalidVmState { vm: vm.to_string(), state: "not allocated on this host".to_string() });
        }

        let reduced = current.scaled(1.0 - self.get_migration_overhead());
        self.allocate_pes(pes, vm, &reduced)?;
        self.get_base_mut().migrating_out.insert(vm);
        Ok(())
    }

    /// Gives a Vm whose migration was called off its full request back.
    fn cancel_migrating_out(&mut self, pes: &mut [Pe], vm: VmId, request: &MipsShare) -> Result<(), AllocationError> {
        if !self.get_base_mut().migrating_out.remove(&vm) {
            return Err(AllocationError::InvalidVmState { vm: vm.to_string(), state: "not migrating out of this host".to_string() });
        }
        if let Err(e) = self.allocate_pes(pes, vm, request) {
            self.get_base_mut().migrating_out.insert(vm);
            return Err(e);
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct VmSchedulerBase {
    pub requested: BTreeMap<VmId, MipsShare>,
    pub allocated: BTreeMap<VmId, MipsShare>,
    pub migrating_in: BTreeSet<VmId>,
    pub migrating_out: BTreeSet<VmId>,
    pub migration_overhead: f64,
}

impl VmSchedulerBase {
    pub fn new(migration_overhead: f64) -> Self {
        assert!((0.0..1.0).contains(&migration_overhead), "Migration overhead must be in [0, 1), got {}", migration_overhead);
        Self {
            requested: BTreeMap::new(),
            allocated: BTreeMap::new(),
            migrating_in: BTreeSet::new(),
            migrating_out: BTreeSet::new(),
            migration_overhead,
        }
    }

    /// Drops every trace of the Vm and returns what it had been granted.
    pub fn forget(&mut self, vm: VmId) -> f64 {
        self.requested.remove(&vm);
        self.migrating_in.remove(&vm);
        self.migrating_out.remove(&vm);
        self.allocated.remove(&vm).map(|share| share.total()).unwrap_or(0.0)
    }
}

impl Default for VmSchedulerBase {
    fn default() -> Self {
        VmSchedulerBase::new(DEFAULT_MIGRATION_OVERHEAD)
    }
}
