use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::api::cloud_dto::datacenter_dto::HostDto;

use crate::domain::cloud_model::resource::mips_share::MipsShare;
use crate::domain::cloud_model::resource::pe::{Pe, PeStatus};
use crate::domain::cloud_model::resource::provisioner::Provisioner;
use crate::domain::cloud_model::resource::resource_trait::Resource;
use crate::domain::cloud_model::utils::id::{HostId, PeId, VmId};
use crate::domain::cloud_model::vm::{Vm, VmState};
use crate::domain::cloud_model::vm_scheduler::VmSchedulerType;
use crate::domain::cloud_model::vm_scheduler::vm_scheduler_trait::VmScheduler;
use crate::error::{AllocationError, ConversionError, Error};

/// What a PE failure did to the Vms of a Host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeFailureOutcome {
    /// Vms left with no vPE (or that could not be re-placed on the surviving PEs).
    pub failed_vms: Vec<VmId>,
    /// Vms that lost some, but not all, of their vPEs.
    pub degraded_vms: Vec<VmId>,
    /// Vms that were migrating here and no longer fit.
    pub aborted_migrations: Vec<VmId>,
    pub failed_pes: usize,
}

/// A physical machine. Owns its PEs, the RAM/BW/storage provisioners and the VmScheduler that
/// shares the PEs. The Vms themselves live in the Datacenter; the Host only keeps their ids.
#[derive(Debug)]
pub struct Host {
    pub id: HostId,
    pes: Vec<Pe>,
    ram: Provisioner<VmId, u64>,
    bw: Provisioner<VmId, u64>,
    storage: Provisioner<VmId, u64>,
    vm_scheduler: Box<dyn VmScheduler>,
    vms: BTreeSet<VmId>,
    vms_migrating_in: BTreeSet<VmId>,
}

impl Host {
    pub fn new(id: HostId, pes: Vec<Pe>, ram: u64, bw: u64, storage: u64, vm_scheduler: Box<dyn VmScheduler>) -> Self {
        assert!(!pes.is_empty(), "Host {} needs at least one PE", id);

        Self {
            id,
            pes,
            ram: Provisioner::new(ram),
            bw: Provisioner::new(bw),
            storage: Provisioner::new(storage),
            vm_scheduler,
            vms: BTreeSet::new(),
            vms_migrating_in: BTreeSet::new(),
        }
    }

    pub fn get_pes(&self) -> &[Pe] {
        &self.pes
    }

    pub fn get_working_pes(&self) -> usize {
        self.pes.iter().filter(|pe| pe.is_working()).count()
    }

    pub fn get_failed_pes(&self) -> usize {
        self.pes.len() - self.get_working_pes()
    }

    pub fn get_busy_pes(&self) -> usize {
        self.pes.iter().filter(|pe| pe.get_status() == PeStatus::Busy).count()
    }

    pub fn is_failed(&self) -> bool {
        self.get_working_pes() == 0
    }

    pub fn get_total_mips(&self) -> f64 {
        self.pes.iter().filter(|pe| pe.is_working()).map(|pe| pe.get_mips()).sum()
    }

    pub fn get_max_pe_mips(&self) -> f64 {
        self.pes.iter().filter(|pe| pe.is_working()).map(|pe| pe.get_mips()).fold(0.0, f64::max)
    }

    pub fn get_available_mips(&self) -> f64 {
        self.vm_scheduler.get_available_mips(&self.pes)
    }

    pub fn get_available_ram(&self) -> u64 {
        self.ram.get_available()
    }

    pub fn get_available_bw(&self) -> u64 {
        self.bw.get_available()
    }

    pub fn get_available_storage(&self) -> u64 {
        self.storage.get_available()
    }

    pub fn get_ram(&self) -> &Provisioner<VmId, u64> {
        &self.ram
    }

    pub fn get_bw(&self) -> &Provisioner<VmId, u64> {
        &self.bw
    }

    pub fn get_storage(&self) -> &Provisioner<VmId, u64> {
        &self.storage
    }

    pub fn get_vm_scheduler(&self) -> &dyn VmScheduler {
        self.vm_scheduler.as_ref()
    }

    /// Fraction of the working MIPS currently granted to Vms.
    pub fn get_cpu_utilization(&self) -> f64 {
        let total = self.get_total_mips();
        if total <= 0.0 { 0.0 } else { (self.vm_scheduler.get_total_allocated_mips() / total).min(1.0) }
    }

    pub fn get_vms(&self) -> &BTreeSet<VmId> {
        &self.vms
    }

    pub fn hosts_vm(&self, vm: VmId) -> bool {
        self.vms.contains(&vm) || self.vms_migrating_in.contains(&vm)
    }

    pub fn get_allocated_mips_for(&self, vm: VmId) -> MipsShare {
        self.vm_scheduler.get_allocated_mips(vm)
    }

    /// Checks every resource the Vm needs without reserving anything.
    pub fn check_suitability(&self, vm: &Vm) -> Result<(), AllocationError> {
        if self.is_failed() {
            return Err(AllocationError::HostFailed { host: self.id.to_string() });
        }

        let request = vm.get_requested_mips();
        if !self.vm_scheduler.is_suitable(&self.pes, &request) {
            let working = self.get_working_pes();
            if request.len() > working {
                return Err(AllocationError::InsufficientPes { requested: request.len(), available: working });
            }
            return Err(AllocationError::InsufficientMips { requested: request.total(), available: self.get_available_mips() });
        }

        if !self.ram.is_suitable(vm.id, vm.get_ram()) {
            return Err(AllocationError::InsufficientRam { requested: vm.get_ram(), available: self.ram.get_available() });
        }
        if !self.bw.is_suitable(vm.id, vm.get_bw()) {
            return Err(AllocationError::InsufficientBw { requested: vm.get_bw(), available: self.bw.get_available() });
        }
        if !self.storage.is_suitable(vm.id, vm.get_size()) {
            return Err(AllocationError::InsufficientStorage { requested: vm.get_size(), available: self.storage.get_available() });
        }

        Ok(())
    }

    pub fn is_suitable(&self, vm: &Vm) -> bool {
        self.check_suitability(vm).is_ok()
    }

    /// Reserves RAM, BW, storage and PEs for the Vm and binds it to this Host.
    ///
    /// All-or-nothing: if any step fails, everything reserved so far is released again.
    pub fn create_vm(&mut self, vm: &mut Vm) -> Result<(), AllocationError> {
        if self.hosts_vm(vm.id) || vm.is_created() {
            return Err(AllocationError::InvalidVmState { vm: vm.id.to_string(), state: format!("{:?}", vm.get_state()) });
        }

        self.reserve(vm, &vm.get_requested_mips(), false)?;

        self.vms.insert(vm.id);
        vm.set_host(Some(self.id));
        vm.set_state(VmState::Created);
        log::debug!("Host {}: Vm {} created ({} PEs x {} MIPS, {} MB RAM).", self.id, vm.id, vm.get_pes(), vm.get_mips(), vm.get_ram());
        Ok(())
    }

    fn reserve(&mut self, vm: &Vm, request: &MipsShare, migration: bool) -> Result<(), AllocationError> {
        self.check_suitability(vm)?;

        let id = vm.id;
        if !self.ram.allocate(id, vm.get_ram()) {
            return Err(AllocationError::InsufficientRam { requested: vm.get_ram(), available: self.ram.get_available() });
        }
        if !self.bw.allocate(id, vm.get_bw()) {
            self.ram.deallocate(id);
            return Err(AllocationError::InsufficientBw { requested: vm.get_bw(), available: self.bw.get_available() });
        }
        if !self.storage.allocate(id, vm.get_size()) {
            self.ram.deallocate(id);
            self.bw.deallocate(id);
            return Err(AllocationError::InsufficientStorage { requested: vm.get_size(), available: self.storage.get_available() });
        }

        let pes_result = if migration {
            self.vm_scheduler.allocate_pes_for_migration_in(&mut self.pes, id, request)
        } else {
            self.vm_scheduler.allocate_pes(&mut self.pes, id, request)
        };
        if let Err(e) = pes_result {
            self.ram.deallocate(id);
            self.bw.deallocate(id);
            self.storage.deallocate(id);
            return Err(e);
        }

        Ok(())
    }

    /// Releases everything the Vm holds here. Returns false if the Vm was not on this Host.
    pub fn deallocate_vm(&mut self, vm: VmId) -> bool {
        let present = self.vms.remove(&vm) | self.vms_migrating_in.remove(&vm);
        self.vm_scheduler.deallocate_pes(&mut self.pes, vm);
        self.ram.deallocate(vm);
        self.bw.deallocate(vm);
        self.storage.deallocate(vm);
        present
    }

    pub fn destroy_vm(&mut self, vm: &mut Vm) {
        if self.deallocate_vm(vm.id) {
            log::debug!("Host {}: Vm {} destroyed.", self.id, vm.id);
        }
        vm.set_host(None);
        vm.set_state(VmState::Destroyed);
    }

    /// Reserves the full RAM/BW/storage of an incoming Vm but only the migration overhead of
    /// its MIPS.
    pub fn add_migrating_in_vm(&mut self, vm: &Vm) -> Result<(), AllocationError> {
        if self.hosts_vm(vm.id) {
            return Err(AllocationError::InvalidVmState { vm: vm.id.to_string(), state: "already on the target host".to_string() });
        }

        self.reserve(vm, &vm.get_requested_mips(), true)?;
        self.vms_migrating_in.insert(vm.id);
        Ok(())
    }

    /// Turns the migration reservation into a regular allocation and binds the Vm here.
    pub fn finish_migration_in(&mut self, vm: &mut Vm) -> Result<(), AllocationError> {
        if !self.vms_migrating_in.remove(&vm.id) {
            return Err(AllocationError::InvalidVmState { vm: vm.id.to_string(), state: "not migrating to this host".to_string() });
        }

        if let Err(e) = self.vm_scheduler.finish_migration_in(&mut self.pes, vm.id, &vm.get_requested_mips()) {
            self.deallocate_vm(vm.id);
            return Err(e);
        }

        self.vms.insert(vm.id);
        vm.set_host(Some(self.id));
        vm.set_state(VmState::Created);
        Ok(())
    }

    pub fn mark_migrating_out(&mut self, vm: VmId) -> Result<(), AllocationError> {
        self.vm_scheduler.mark_migrating_out(&mut self.pes, vm)
    }

    /// Hands a Vm whose migration was called off its full request back.
    pub fn cancel_migrating_out(&mut self, vm: &Vm) -> Result<(), AllocationError> {
        self.vm_scheduler.cancel_migrating_out(&mut self.pes, vm.id, &vm.get_requested_mips())
    }

    /// Fails `count` working PEs, free ones first, and shrinks the resident Vms to fit the
    /// remaining PEs.
    ///
    /// Every Vm is released, then the VmScheduler decides how many vPEs each resident keeps.
    /// Residents are placed again first, with a migrating-out Vm going back to its reduced share.
    /// Incoming migrations are re-reserved last and called off if they no longer fit. Vms that
    /// end up with no vPE, or that cannot be placed again, fail and lose all their resources here.
    pub fn fail_pes(&mut self, count: usize, vms: &mut BTreeMap<VmId, Vm>) -> PeFailureOutcome {
        let mut victims: Vec<usize> = self.pes.iter().enumerate().filter(|(_, pe)| pe.is_free()).map(|(i, _)| i).collect();
        victims.extend(self.pes.iter().enumerate().filter(|(_, pe)| pe.get_status() == PeStatus::Busy).map(|(i, _)| i));
        victims.truncate(count);

        let mut outcome = PeFailureOutcome { failed_pes: victims.len(), ..Default::default() };
        if victims.is_empty() {
            return outcome;
        }

        let residents: Vec<VmId> = self.vms.iter().copied().collect();
        let incoming: Vec<VmId> = self.vms_migrating_in.iter().copied().collect();
        let leaving: BTreeSet<VmId> = residents.iter().copied().filter(|id| self.vm_scheduler.is_migrating_out(*id)).collect();

        let mut vpes: BTreeMap<VmId, usize> = BTreeMap::new();
        for id in residents.iter() {
            self.vm_scheduler.deallocate_pes(&mut self.pes, *id);
            vpes.insert(*id, vms.get(id).map(|vm| vm.get_working_pes()).unwrap_or(0));
        }
        for id in incoming.iter() {
            self.vm_scheduler.deallocate_pes(&mut self.pes, *id);
        }

        for index in victims.iter() {
            self.pes[*index].fail();
        }
        log::warn!("Host {}: {} PE(s) failed, {} of {} still working.", self.id, victims.len(), self.get_working_pes(), self.pes.len());

        self.vm_scheduler.shed_vpes(self.get_working_pes(), &mut vpes);

        for id in residents {
            let Some(vm) = vms.get_mut(&id) else {
                continue;
            };
            let original = vm.get_working_pes();
            let left = vpes.get(&id).copied().unwrap_or(0);

            let placed = left > 0 && {
                vm.set_working_pes(left);
                self.vm_scheduler.reallocate_pes(&mut self.pes, id, &vm.get_requested_mips()).is_ok()
            };

            if !placed {
                self.deallocate_vm(id);
                outcome.failed_vms.push(id);
                continue;
            }
            if left < original {
                outcome.degraded_vms.push(id);
            }
            if leaving.contains(&id) {
                if let Err(e) = self.vm_scheduler.mark_migrating_out(&mut self.pes, id) {
                    log::warn!("Host {}: Vm {} keeps its full share while migrating out: {}", self.id, id, e);
                }
            }
        }

        for id in incoming {
            let reserved = match vms.get(&id) {
                Some(vm) => self.vm_scheduler.allocate_pes_for_migration_in(&mut self.pes, id, &vm.get_requested_mips()).is_ok(),
                None => false,
            };
            if !reserved {
                self.deallocate_vm(id);
                outcome.aborted_migrations.push(id);
            }
        }

        outcome
    }
}

impl TryFrom<HostDto> for Host {
    type Error = Error;

    fn try_from(dto: HostDto) -> Result<Self, Self::Error> {
        let invalid = |field: &str, reason: &str| ConversionError::InvalidValue { field: format!("hosts[{}].{}", dto.id, field), reason: reason.to_string() };

        if dto.pes.is_empty() {
            return Err(invalid("pes", "a Host needs at least one PE").into());
        }
        if dto.pes.iter().any(|mips| !(*mips > 0.0 && mips.is_finite())) {
            return Err(invalid("pes", "every PE needs positive MIPS").into());
        }
        if !(0.0..1.0).contains(&dto.migration_overhead) {
            return Err(invalid("migrationOverhead", "must be in [0, 1)").into());
        }
        if !(0.0..=1.0).contains(&dto.min_share_fraction) {
            return Err(invalid("minShareFraction", "must be in [0, 1]").into());
        }

        let scheduler = VmSchedulerType::from_str(&dto.vm_scheduler)?.get_instance(dto.migration_overhead, dto.min_share_fraction);
        let pes = dto.pes.iter().enumerate().map(|(index, mips)| Pe::new(PeId::new(index as u64), *mips)).collect();

        Ok(Host::new(HostId::new(dto.id), pes, dto.ram, dto.bw, dto.storage, scheduler))
    }
}
