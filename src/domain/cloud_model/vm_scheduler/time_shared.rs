use std::any::Any;
use std::collections::BTreeMap;

use crate::domain::cloud_model::resource::mips_share::MipsShare;
use crate::domain::cloud_model::resource::pe::{Pe, PeStatus};
use crate::domain::cloud_model::resource::resource_trait::Resource;
use crate::domain::cloud_model::utils::id::VmId;
use crate::domain::cloud_model::vm_scheduler::vm_scheduler_trait::{DEFAULT_MIGRATION_OVERHEAD, VmScheduler, VmSchedulerBase};
use crate::error::AllocationError;

const EPSILON: f64 = 1e-9;

/// Shares the MIPS of all working PEs among the resident Vms.
///
/// While the summed request fits the capacity every Vm gets exactly what it asked for. Beyond
/// that every Vm is scaled by the same factor `capacity / demand`, so each one keeps making
/// progress proportional to its request.
#[derive(Debug, Clone)]
pub struct VmSchedulerTimeShared {
    base: VmSchedulerBase,
    /// A new Vm is refused if admitting it would push the share factor below this value.
    min_share_fraction: f64,
}

impl Default for VmSchedulerTimeShared {
    fn default() -> Self {
        VmSchedulerTimeShared::new(DEFAULT_MIGRATION_OVERHEAD, 0.0)
    }
}

impl VmSchedulerTimeShared {
    pub fn new(migration_overhead: f64, min_share_fraction: f64) -> Self {
        assert!((0.0..=1.0).contains(&min_share_fraction), "Minimum share fraction must be in [0, 1], got {}", min_share_fraction);
        Self { base: VmSchedulerBase::new(migration_overhead), min_share_fraction }
    }

    pub fn get_min_share_fraction(&self) -> f64 {
        self.min_share_fraction
    }

    fn capacity(pes: &[Pe]) -> f64 {
        pes.iter().filter(|pe| pe.is_working()).map(|pe| pe.get_mips()).sum()
    }

    fn share_factor(capacity: f64, demand: f64) -> f64 {
        if demand <= 0.0 { 1.0 } else { (capacity / demand).min(1.0) }
    }

    /// Checks a request against the Host, ignoring whatever `replacing` currently holds.
    fn check(&self, pes: &[Pe], request: &MipsShare, replacing: Option<VmId>) -> Result<(), AllocationError> {
        let working = pes.iter().filter(|pe| pe.is_working()).count();
        if request.is_empty() || request.len() > working {
            return Err(AllocationError::InsufficientPes { requested: request.len(), available: working });
        }

        let max_pe_mips = pes.iter().filter(|pe| pe.is_working()).map(|pe| pe.get_mips()).fold(0.0, f64::max);
        if request.max() > max_pe_mips + EPSILON {
            return Err(AllocationError::InsufficientMips { requested: request.max(), available: max_pe_mips });
        }

        let capacity = Self::capacity(pes);
        let others: f64 = self.base.requested.iter().filter(|(vm, _)| Some(**vm) != replacing).map(|(_, share)| share.total()).sum();
        let factor = Self::share_factor(capacity, others + request.total());
        if factor <= 0.0 || factor + EPSILON < self.min_share_fraction {
            return Err(AllocationError::InsufficientMips { requested: request.total(), available: (capacity - others).max(0.0) });
        }

        Ok(())
    }

    /// Recomputes every Vm's share from the requests and pours the shares onto the working PEs
    /// in Vm id order.
    fn redistribute(&mut self, pes: &mut [Pe]) {
        for pe in pes.iter_mut() {
            pe.get_provisioner_mut().deallocate_all();
        }

        let capacity = Self::capacity(pes);
        let demand: f64 = self.base.requested.values().map(|share| share.total()).sum();
        let factor = Self::share_factor(capacity, demand);

        let mut allocated = BTreeMap::new();
        let mut pe_cursor = 0;
        let mut pe_left = pes.first().map(|pe| if pe.is_working() { pe.get_mips() } else { 0.0 }).unwrap_or(0.0);

        for (vm, request) in self.base.requested.iter() {
            let share = request.scaled(factor);
            let mut per_pe: BTreeMap<usize, f64> = BTreeMap::new();

            for &mips in share.iter() {
                let mut remaining = mips;
                while remaining > EPSILON && pe_cursor < pes.len() {
                    if pe_left <= EPSILON {
                        pe_cursor += 1;
                        pe_left = pes.get(pe_cursor).map(|pe| if pe.is_working() { pe.get_mips() } else { 0.0 }).unwrap_or(0.0);
                        continue;
                    }
                    let take = remaining.min(pe_left);
                    *per_pe.entry(pe_cursor).or_insert(0.0) += take;
                    remaining -= take;
                    pe_left -= take;
                }
            }

            for (index, amount) in per_pe {
                let provisioner = pes[index].get_provisioner_mut();
                if !provisioner.allocate(*vm, amount) {
                    // Rounding left the PE a hair short.
                    let available = provisioner.get_available();
                    provisioner.allocate(*vm, amount.min(available));
                }
            }

            allocated.insert(*vm, share);
        }

        for pe in pes.iter_mut().filter(|pe| pe.is_working()) {
            let status = if pe.get_provisioner().consumers().next().is_some() { PeStatus::Busy } else { PeStatus::Free };
            pe.set_status(status);
        }

        if factor < 1.0 {
            log::debug!("TimeShared: demand {:.2} MIPS exceeds capacity {:.2} MIPS, every Vm scaled by {:.4}.", demand, capacity, factor);
        }

        self.base.allocated = allocated;
    }
}

impl VmScheduler for VmSchedulerTimeShared {
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
        self.check(pes, request, None).is_ok()
    }

    fn allocate_pes(&mut self, pes: &mut [Pe], vm: VmId, request: &MipsShare) -> Result<(), AllocationError> {
        self.check(pes, request, Some(vm))?;
        self.base.requested.insert(vm, request.clone());
        self.redistribute(pes);
        Ok(())
    }

    fn deallocate_pes(&mut self, pes: &mut [Pe], vm: VmId) -> f64 {
        if !self.base.requested.contains_key(&vm) && !self.base.allocated.contains_key(&vm) {
            return 0.0;
        }

        let freed = self.base.forget(vm);
        self.redistribute(pes);
        freed
    }

    fn get_available_mips(&self, pes: &[Pe]) -> f64 {
        let requested: f64 = self.base.requested.values().map(|share| share.total()).sum();
        (Self::capacity(pes) - requested).max(0.0)
    }

    /// Vms share PEs, so only a Vm wider than the working PEs loses vPEs. The lost MIPS are
    /// absorbed by the share factor.
    fn shed_vpes(&self, working: usize, vpes: &mut BTreeMap<VmId, usize>) {
        for remaining in vpes.values_mut() {
            *remaining = (*remaining).min(working);
        }
    }

    /// Skips the admission limits for new Vms; a resident only needs its vPEs to fit.
    fn reallocate_pes(&mut self, pes: &mut [Pe], vm: VmId, request: &MipsShare) -> Result<(), AllocationError> {
        let working = pes.iter().filter(|pe| pe.is_working()).count();
        if request.is_empty() || request.len() > working {
            return Err(AllocationError::InsufficientPes { requested: request.len(), available: working });
        }

        self.base.requested.insert(vm, request.clone());
        self.redistribute(pes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cloud_model::utils::id::PeId;

    fn pes(count: u64, mips: f64) -> Vec<Pe> {
        (0..count).map(|i| Pe::new(PeId::new(i), mips)).collect()
    }

    fn pe_allocated(pes: &[Pe]) -> f64 {
        pes.iter().map(|pe| pe.get_provisioner().get_allocated()).sum()
    }

    #[test]
    fn test_requests_within_capacity_are_granted_in_full() {
        let mut host_pes = pes(2, 1000.0);
        let mut scheduler = VmSchedulerTimeShared::default();

        scheduler.allocate_pes(&mut host_pes, VmId::new(1), &MipsShare::uniform(1, 500.0)).unwrap();
        scheduler.allocate_pes(&mut host_pes, VmId::new(2), &MipsShare::uniform(1, 1000.0)).unwrap();

        assert_eq!(scheduler.get_total_allocated_mips_for(VmId::new(1)), 500.0);
        assert_eq!(scheduler.get_total_allocated_mips_for(VmId::new(2)), 1000.0);
        assert!((pe_allocated(&host_pes) - 1500.0).abs() < 1e-6);
        assert!((scheduler.get_available_mips(&host_pes) - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_oversubscription_scales_every_vm_fairly() {
        let mut host_pes = pes(1, 1000.0);
        let mut scheduler = VmSchedulerTimeShared::default();

        for vm in 1..=4 {
            scheduler.allocate_pes(&mut host_pes, VmId::new(vm), &MipsShare::uniform(1, 1000.0)).unwrap();
        }

        for vm in 1..=4 {
            assert!((scheduler.get_total_allocated_mips_for(VmId::new(vm)) - 250.0).abs() < 1e-9);
        }
        assert!(pe_allocated(&host_pes) <= 1000.0 + 1e-6);
    }

    #[test]
    fn test_min_share_fraction_rejects_overcrowding() {
        let mut host_pes = pes(1, 1000.0);
        let mut scheduler = VmSchedulerTimeShared::new(DEFAULT_MIGRATION_OVERHEAD, 0.5);

        scheduler.allocate_pes(&mut host_pes, VmId::new(1), &MipsShare::uniform(1, 1000.0)).unwrap();
        scheduler.allocate_pes(&mut host_pes, VmId::new(2), &MipsShare::uniform(1, 1000.0)).unwrap();
        let third = scheduler.allocate_pes(&mut host_pes, VmId::new(3), &MipsShare::uniform(1, 1000.0));

        assert!(matches!(third, Err(AllocationError::InsufficientMips { .. })));
        assert!((scheduler.get_total_allocated_mips_for(VmId::new(1)) - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_more_vpes_than_working_pes_is_refused() {
        let mut host_pes = pes(2, 1000.0);
        host_pes[1].fail();
        let scheduler = VmSchedulerTimeShared::default();

        assert!(!scheduler.is_suitable(&host_pes, &MipsShare::uniform(2, 100.0)));
        assert!(scheduler.is_suitable(&host_pes, &MipsShare::uniform(1, 100.0)));
        assert!(!scheduler.is_suitable(&host_pes, &MipsShare::uniform(1, 1500.0)));
    }

    #[test]
    fn test_deallocate_restores_full_share_of_remaining_vms() {
        let mut host_pes = pes(1, 1000.0);
        let mut scheduler = VmSchedulerTimeShared::default();
        scheduler.allocate_pes(&mut host_pes, VmId::new(1), &MipsShare::uniform(1, 1000.0)).unwrap();
        scheduler.allocate_pes(&mut host_pes, VmId::new(2), &MipsShare::uniform(1, 1000.0)).unwrap();

        assert!((scheduler.deallocate_pes(&mut host_pes, VmId::new(2)) - 500.0).abs() < 1e-9);
        assert_eq!(scheduler.deallocate_pes(&mut host_pes, VmId::new(2)), 0.0);
        assert_eq!(scheduler.get_total_allocated_mips_for(VmId::new(1)), 1000.0);
    }

    #[test]
    fn test_shedding_only_narrows_vms_wider_than_the_host() {
        let scheduler = VmSchedulerTimeShared::default();
        let mut vpes = BTreeMap::from([(VmId::new(1), 3), (VmId::new(2), 1), (VmId::new(3), 2)]);

        scheduler.shed_vpes(2, &mut vpes);

        assert_eq!(vpes, BTreeMap::from([(VmId::new(1), 2), (VmId::new(2), 1), (VmId::new(3), 2)]));
    }

    #[test]
    fn test_reallocation_ignores_the_min_share_fraction() {
        let mut host_pes = pes(2, 1000.0);
        let mut scheduler = VmSchedulerTimeShared::new(DEFAULT_MIGRATION_OVERHEAD, 0.9);
        scheduler.allocate_pes(&mut host_pes, VmId::new(1), &MipsShare::uniform(1, 1000.0)).unwrap();
        host_pes[1].fail();

        assert!(!scheduler.is_suitable(&host_pes, &MipsShare::uniform(1, 1000.0)));
        scheduler.reallocate_pes(&mut host_pes, VmId::new(2), &MipsShare::uniform(1, 1000.0)).unwrap();

        assert!((scheduler.get_total_allocated_mips_for(VmId::new(1)) - 500.0).abs() < 1e-9);
        assert!((scheduler.get_total_allocated_mips_for(VmId::new(2)) - 500.0).abs() < 1e-9);
        assert!(scheduler.reallocate_pes(&mut host_pes, VmId::new(3), &MipsShare::uniform(2, 100.0)).is_err());
    }

    #[test]
    fn test_migrating_out_vm_keeps_ninety_percent() {
        let mut host_pes = pes(1, 1000.0);
        let mut scheduler = VmSchedulerTimeShared::default();
        scheduler.allocate_pes(&mut host_pes, VmId::new(1), &MipsShare::uniform(1, 800.0)).unwrap();

        scheduler.mark_migrating_out(&mut host_pes, VmId::new(1)).unwrap();

        assert!(scheduler.is_migrating_out(VmId::new(1)));
        assert!((scheduler.get_total_allocated_mips_for(VmId::new(1)) - 720.0).abs() < 1e-9);
    }
}
