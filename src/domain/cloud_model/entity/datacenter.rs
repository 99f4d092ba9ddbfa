use std::any::Any;
use std::collections::BTreeMap;
use std::str::FromStr;

use slotmap::Key;

use crate::api::cloud_dto::datacenter_dto::DatacenterDto;
use crate::domain::cloud_model::allocation::VmAllocationPolicyType;
use crate::domain::cloud_model::allocation::vm_allocation_policy_trait::VmAllocationPolicy;
use crate::domain::cloud_model::cloudlet::{Cloudlet, CloudletStatus};
use crate::domain::cloud_model::host::Host;
use crate::domain::cloud_model::resource::resource_trait::Resource;
use crate::domain::cloud_model::utils::id::{CloudletId, HostId, VmId};
use crate::domain::cloud_model::vm::{Vm, VmState};
use crate::domain::simulator::sim_entity::{EntityId, SimContext, SimEntity};
use crate::domain::simulator::sim_event::SimEvent;
use crate::domain::simulator::sim_message::SimMessage;
use crate::error::{AllocationError, ConversionError, Error};

/// Share of the target Host's bandwidth a live migration may use.
const MIGRATION_BW_FRACTION: f64 = 0.5;

/// A set of Hosts under one VmAllocationPolicy.
///
/// The Datacenter owns every Vm placed here, drives Cloudlet processing through self-scheduled
/// `UpdateProcessing` events and returns finished Cloudlets to the broker that submitted them.
/// With a scheduling interval of 0 processing is only updated at the next Cloudlet completion;
/// with a positive interval it is also updated at least every interval.
#[derive(Debug)]
pub struct Datacenter {
    hosts: Vec<Host>,
    vms: BTreeMap<VmId, Vm>,
    allocation_policy: Box<dyn VmAllocationPolicy>,
    scheduling_interval: f64,
    last_process_time: f64,
    migrations: usize,
}

impl Datacenter {
    pub fn new(hosts: Vec<Host>, allocation_policy: Box<dyn VmAllocationPolicy>) -> Self {
        Self { hosts, vms: BTreeMap::new(), allocation_policy, scheduling_interval: 0.0, last_process_time: 0.0, migrations: 0 }
    }

    pub fn with_scheduling_interval(mut self, scheduling_interval: f64) -> Self {
        assert!(scheduling_interval >= 0.0, "Scheduling interval must be non-negative, got {}", scheduling_interval);
        self.scheduling_interval = scheduling_interval;
        self
    }

    pub fn get_hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn get_host(&self, id: HostId) -> Option<&Host> {
        self.hosts.iter().find(|host| host.id == id)
    }

    pub fn get_vm(&self, id: VmId) -> Option<&Vm> {
        self.vms.get(&id)
    }

    pub fn get_vms(&self) -> impl Iterator<Item = &Vm> {
        self.vms.values()
    }

    pub fn get_allocation_policy(&self) -> &dyn VmAllocationPolicy {
        self.allocation_policy.as_ref()
    }

    pub fn get_scheduling_interval(&self) -> f64 {
        self.scheduling_interval
    }

    pub fn get_last_process_time(&self) -> f64 {
        self.last_process_time
    }

    pub fn get_migration_count(&self) -> usize {
        self.migrations
    }

    fn host_index(&self, id: HostId) -> Option<usize> {
        self.hosts.iter().position(|host| host.id == id)
    }

    fn has_running_cloudlets(&self) -> bool {
        self.vms.values().any(|vm| vm.is_created() && !vm.get_cloudlet_scheduler().get_exec_list().is_empty())
    }

    fn vm_holding(&mut self, cloudlet_id: CloudletId) -> Option<&mut Vm> {
        self.vms.values_mut().find(|vm| vm.get_cloudlet_scheduler().find(cloudlet_id).is_some())
    }

    fn reply(ctx: &mut SimContext, destination: Option<EntityId>, message: SimMessage) {
        match destination {
            Some(destination) if !destination.is_null() => ctx.schedule_now(destination, message),
            _ => log::debug!("{:.2}: {}: nobody to notify about {}.", ctx.clock(), ctx.name(), message.as_str()),
        }
    }

    fn return_cloudlet(ctx: &mut SimContext, cloudlet: Cloudlet) {
        log::debug!(
            "{:.2}: {}: Cloudlet {} returned with status {:?} ({:.2} of {:.2} MI).",
            ctx.clock(),
            ctx.name(),
            cloudlet.id,
            cloudlet.get_status(),
            cloudlet.get_finished_length(),
            cloudlet.get_length()
        );
        let broker = cloudlet.get_broker();
        Datacenter::reply(ctx, broker, SimMessage::CloudletReturn { cloudlet: Box::new(cloudlet) });
    }

    fn process_vm_create(&mut self, ctx: &mut SimContext, source: EntityId, mut vm: Vm) {
        if !source.is_null() {
            vm.set_broker(Some(source));
        }

        // Vm ids key the Host ledgers, so a second live Vm with the same id is refused.
        let placement = if self.vms.get(&vm.id).is_some_and(|live| live.is_created()) {
            Err(AllocationError::InvalidVmState { vm: vm.id.to_string(), state: "id already in use in this Datacenter".to_string() })
        } else {
            self.allocation_policy.allocate_host_for_vm(&mut self.hosts, &mut vm)
        };

        match placement {
            Ok(index) => {
                let host_id = self.hosts[index].id;
                log::info!("{:.2}: {}: Vm {} created on Host {}.", ctx.clock(), ctx.name(), vm.id, host_id);
                let (vm_id, broker) = (vm.id, vm.get_broker());
                self.vms.insert(vm_id, vm);
                Datacenter::reply(ctx, broker, SimMessage::VmCreated { vm_id, host_id });
                self.update_cloudlet_processing(ctx);
            }
            Err(reason) => {
                log::warn!("VmCreationFailed: {:.2}: {}: Vm {} could not be placed: {}", ctx.clock(), ctx.name(), vm.id, reason);
                let broker = vm.get_broker();
                Datacenter::reply(ctx, broker, SimMessage::VmCreateFailed { vm: Box::new(vm), reason });
            }
        }
    }

    fn process_vm_destroy(&mut self, ctx: &mut SimContext, vm_id: VmId) {
        let now = ctx.clock();
        self.update_cloudlet_processing(ctx);

        let Some(vm) = self.vms.get_mut(&vm_id) else {
            log::warn!("{:.2}: {}: cannot destroy unknown Vm {}.", now, ctx.name(), vm_id);
            return;
        };
        if !vm.is_created() {
            log::debug!("{:.2}: {}: Vm {} is already {:?}.", now, ctx.name(), vm_id, vm.get_state());
            return;
        }

        let orphans = vm.get_cloudlet_scheduler_mut().fail_all(now);
        if !orphans.is_empty() {
            log::warn!("{:.2}: {}: Vm {} destroyed with {} unfinished Cloudlet(s).", now, ctx.name(), vm_id, orphans.len());
        }
        self.allocation_policy.deallocate_host_for_vm(&mut self.hosts, vm);
        log::info!("{:.2}: {}: Vm {} destroyed.", now, ctx.name(), vm_id);

        for cloudlet in orphans {
            Datacenter::return_cloudlet(ctx, cloudlet);
        }
        self.update_cloudlet_processing(ctx);
    }

    fn process_vm_migrate(&mut self, ctx: &mut SimContext, vm_id: VmId, target: Option<HostId>) {
        let now = ctx.clock();
        let Some(vm) = self.vms.get(&vm_id).filter(|vm| vm.get_state() == VmState::Created) else {
            log::warn!("{:.2}: {}: Vm {} is not running here and cannot migrate.", now, ctx.name(), vm_id);
            return;
        };
        let Some(source_index) = vm.get_host().and_then(|host| self.host_index(host)) else {
            log::warn!("{:.2}: {}: Vm {} has no Host.", now, ctx.name(), vm_id);
            return;
        };
        let target_index = match target {
            Some(target) => self.host_index(target).filter(|index| *index != source_index),
            None => self.allocation_policy.find_host_for_migration(&self.hosts, vm, source_index),
        };
        let Some(target_index) = target_index else {
            log::warn!("{:.2}: {}: no valid migration target ({:?}) for Vm {}.", now, ctx.name(), target, vm_id);
            return;
        };
        let target = self.hosts[target_index].id;

        // Progress so far runs at the full share.
        self.update_cloudlet_processing(ctx);

        let Some(vm) = self.vms.get_mut(&vm_id) else {
            return;
        };
        if let Err(e) = self.hosts[target_index].add_migrating_in_vm(vm) {
            log::warn!("{:.2}: {}: migration of Vm {} to Host {} refused: {}", now, ctx.name(), vm_id, target, e);
            return;
        }
        if let Err(e) = self.hosts[source_index].mark_migrating_out(vm_id) {
            self.hosts[target_index].deallocate_vm(vm_id);
            log::warn!("{:.2}: {}: Vm {} cannot leave its Host: {}", now, ctx.name(), vm_id, e);
            return;
        }
        vm.set_state(VmState::Migrating);

        let bw = self.hosts[target_index].get_bw().get_capacity() as f64;
        let delay = if bw > 0.0 { vm.get_ram() as f64 / (bw * MIGRATION_BW_FRACTION / 8.0) } else { 0.0 };
        let source = self.hosts[source_index].id;
        log::info!("{:.2}: {}: migrating Vm {} from Host {} to Host {}, ETA {:.2}.", now, ctx.name(), vm_id, source, target, now + delay);

        ctx.schedule_self(delay, SimMessage::VmMigrationComplete { vm_id, source, target });
        self.update_cloudlet_processing(ctx);
    }

    fn process_vm_migration_complete(&mut self, ctx: &mut SimContext, vm_id: VmId, source: HostId, target: HostId) {
        let now = ctx.clock();
        self.update_cloudlet_processing(ctx);

        let (Some(source_index), Some(target_index)) = (self.host_index(source), self.host_index(target)) else {
            log::warn!("{:.2}: {}: migration of Vm {} refers to unknown Hosts.", now, ctx.name(), vm_id);
            return;
        };
        let Some(vm) = self.vms.get_mut(&vm_id) else {
            return;
        };
        if vm.get_state() != VmState::Migrating {
            // The Vm failed or was destroyed on the way.
            self.hosts[target_index].deallocate_vm(vm_id);
            return;
        }

        self.hosts[source_index].deallocate_vm(vm_id);
        match self.hosts[target_index].finish_migration_in(vm) {
            Ok(()) => {
                self.migrations += 1;
                log::info!("{:.2}: {}: Vm {} migrated from Host {} to Host {}.", now, ctx.name(), vm_id, source, target);
            }
            Err(e) => {
                log::error!("{:.2}: {}: Vm {} lost during migration to Host {}: {}", now, ctx.name(), vm_id, target, e);
                let broker = vm.get_broker();
                let failed = vm.set_failed(now);
                Datacenter::reply(ctx, broker, SimMessage::VmFailed { vm_id, host_id: target });
                for cloudlet in failed {
                    Datacenter::return_cloudlet(ctx, cloudlet);
                }
            }
        }

        self.update_cloudlet_processing(ctx);
    }

    fn process_cloudlet_submit(&mut self, ctx: &mut SimContext, source: EntityId, mut cloudlet: Cloudlet) {
        let now = ctx.clock();
        if cloudlet.get_broker().is_none() && !source.is_null() {
            cloudlet.set_broker(Some(source));
        }

        let target = cloudlet.get_vm().and_then(|id| self.vms.get_mut(&id)).filter(|vm| vm.is_created());
        match target {
            Some(vm) => {
                log::debug!("{:.2}: {}: Cloudlet {} submitted to Vm {}.", now, ctx.name(), cloudlet.id, vm.id);
                vm.submit_cloudlet(cloudlet, now);
                self.update_cloudlet_processing(ctx);
            }
            None => {
                log::warn!("{:.2}: {}: Cloudlet {} targets Vm {:?}, which is not running here.", now, ctx.name(), cloudlet.id, cloudlet.get_vm());
                cloudlet.abort(CloudletStatus::Failed, now);
                Datacenter::return_cloudlet(ctx, cloudlet);
            }
        }
    }

    fn process_cloudlet_cancel(&mut self, ctx: &mut SimContext, cloudlet_id: CloudletId) {
        let now = ctx.clock();
        let canceled = self.vm_holding(cloudlet_id).and_then(|vm| vm.get_cloudlet_scheduler_mut().cancel(cloudlet_id, now));
        match canceled {
            Some(cloudlet) => Datacenter::return_cloudlet(ctx, cloudlet),
            None => log::warn!("{:.2}: {}: Cloudlet {} cannot be canceled.", now, ctx.name(), cloudlet_id),
        }
        self.update_cloudlet_processing(ctx);
    }

    fn process_cloudlet_pause(&mut self, ctx: &mut SimContext, cloudlet_id: CloudletId, pause: bool) {
        let now = ctx.clock();
        let done = self
            .vm_holding(cloudlet_id)
            .map(|vm| {
                let scheduler = vm.get_cloudlet_scheduler_mut();
                if pause { scheduler.pause(cloudlet_id, now) } else { scheduler.resume(cloudlet_id, now) }
            })
            .unwrap_or(false);

        if !done {
            log::warn!("{:.2}: {}: Cloudlet {} cannot be {}.", now, ctx.name(), cloudlet_id, if pause { "paused" } else { "resumed" });
        }
        self.update_cloudlet_processing(ctx);
    }

    fn process_host_pe_failure(&mut self, ctx: &mut SimContext, host_id: HostId, pes: usize) {
        let now = ctx.clock();
        let Some(index) = self.host_index(host_id) else {
            log::warn!("{:.2}: {}: PE failure for unknown Host {}.", now, ctx.name(), host_id);
            return;
        };

        let outcome = self.hosts[index].fail_pes(pes, &mut self.vms);
        if self.hosts[index].is_failed() {
            log::error!("{:.2}: {}: Host {} failed completely.", now, ctx.name(), host_id);
        }

        for vm_id in outcome.degraded_vms.iter() {
            log::warn!("{:.2}: {}: Vm {} degraded after PE failure on Host {}.", now, ctx.name(), vm_id, host_id);
        }

        for vm_id in outcome.aborted_migrations {
            self.abort_migration(ctx, vm_id, host_id);
        }

        for vm_id in outcome.failed_vms {
            let Some(vm) = self.vms.get_mut(&vm_id) else {
                continue;
            };
            log::error!("{:.2}: {}: Vm {} failed: no PE left on Host {}.", now, ctx.name(), vm_id, host_id);
            let broker = vm.get_broker();
            let failed = vm.set_failed(now);
            Datacenter::reply(ctx, broker, SimMessage::VmFailed { vm_id, host_id });
            for cloudlet in failed {
                Datacenter::return_cloudlet(ctx, cloudlet);
            }
        }

        self.update_cloudlet_processing(ctx);
    }

    /// Calls off the migration of a Vm whose reservation on `target` was lost. The Vm stays on
    /// its source Host with its full share.
    fn abort_migration(&mut self, ctx: &mut SimContext, vm_id: VmId, target: HostId) {
        let now = ctx.clock();
        ctx.cancel_own(|event| matches!(event.message, SimMessage::VmMigrationComplete { vm_id: id, .. } if id == vm_id));

        let Some(vm) = self.vms.get_mut(&vm_id).filter(|vm| vm.get_state() == VmState::Migrating) else {
            return;
        };
        let Some(source_index) = vm.get_host().and_then(|host| self.hosts.iter().position(|h| h.id == host)) else {
            return;
        };
        if let Err(e) = self.hosts[source_index].cancel_migrating_out(vm) {
            log::error!("{:.2}: {}: Vm {} cannot get its share back: {}", now, ctx.name(), vm_id, e);
        }
        vm.set_state(VmState::Created);
        log::warn!("{:.2}: {}: migration of Vm {} to Host {} aborted after PE failure.", now, ctx.name(), vm_id, target);
    }

    /// Brings every running Vm up to the current clock, returns finished Cloudlets and schedules
    /// the next processing update.
    fn update_cloudlet_processing(&mut self, ctx: &mut SimContext) {
        let now = ctx.clock();
        let mut next_completion: Option<f64> = None;
        let mut finished = Vec::new();

        for vm in self.vms.values_mut().filter(|vm| vm.is_created()) {
            let Some(host) = vm.get_host().and_then(|id| self.hosts.iter().find(|host| host.id == id)) else {
                continue;
            };
            let share = host.get_allocated_mips_for(vm.id);
            if let Some(time) = vm.update_processing(now, &share) {
                next_completion = Some(next_completion.map_or(time, |next| next.min(time)));
            }
            finished.extend(vm.get_cloudlet_scheduler_mut().take_finished());
        }
        self.last_process_time = now;

        for cloudlet in finished {
            Datacenter::return_cloudlet(ctx, cloudlet);
        }

        ctx.cancel_own(|event| matches!(event.message, SimMessage::UpdateProcessing));
        let delay = match (next_completion, self.scheduling_interval > 0.0) {
            (Some(time), true) => (time - now).max(0.0).min(self.scheduling_interval),
            (Some(time), false) => (time - now).max(0.0),
            (None, true) if self.has_running_cloudlets() => self.scheduling_interval,
            _ => return,
        };
        ctx.schedule_self(delay, SimMessage::UpdateProcessing);
    }
}

impl SimEntity for Datacenter {
    fn on_start(&mut self, ctx: &mut SimContext) {
        log::info!("{:.2}: {} is starting with {} Host(s) under {}.", ctx.clock(), ctx.name(), self.hosts.len(), self.allocation_policy.get_name());
    }

    fn on_event(&mut self, ctx: &mut SimContext, event: SimEvent) {
        let source = event.source;
        match event.message {
            SimMessage::VmCreate { vm } => self.process_vm_create(ctx, source, *vm),
            SimMessage::VmDestroy { vm_id } => self.process_vm_destroy(ctx, vm_id),
            SimMessage::VmMigrate { vm_id, target } => self.process_vm_migrate(ctx, vm_id, target),
            SimMessage::VmMigrationComplete { vm_id, source, target } => self.process_vm_migration_complete(ctx, vm_id, source, target),
            SimMessage::CloudletSubmit { cloudlet } => self.process_cloudlet_submit(ctx, source, *cloudlet),
            SimMessage::CloudletCancel { cloudlet_id } => self.process_cloudlet_cancel(ctx, cloudlet_id),
            SimMessage::CloudletPause { cloudlet_id } => self.process_cloudlet_pause(ctx, cloudlet_id, true),
            SimMessage::CloudletResume { cloudlet_id } => self.process_cloudlet_pause(ctx, cloudlet_id, false),
            SimMessage::UpdateProcessing => self.update_cloudlet_processing(ctx),
            SimMessage::HostPeFailure { host_id, pes } => self.process_host_pe_failure(ctx, host_id, pes),
            SimMessage::EndOfSimulation => {}
            other => log::debug!("{:.2}: {} ignores {}.", ctx.clock(), ctx.name(), other.as_str()),
        }
    }

    /// Releases whatever the Vms still hold.
    fn on_shutdown(&mut self, ctx: &mut SimContext) {
        let mut released = 0;
        for vm in self.vms.values_mut().filter(|vm| vm.is_created()) {
            self.allocation_policy.deallocate_host_for_vm(&mut self.hosts, vm);
            released += 1;
        }
        log::info!("{:.2}: {} is shutting down; {} Vm(s) released, {} migration(s) done.", ctx.clock(), ctx.name(), released, self.migrations);
    }

    fn has_pending_work(&self) -> bool {
        self.vms.values().any(|vm| vm.is_created() && vm.get_cloudlet_scheduler().has_unfinished())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl TryFrom<DatacenterDto> for Datacenter {
    type Error = Error;

    fn try_from(dto: DatacenterDto) -> Result<Self, Self::Error> {
        if !(dto.scheduling_interval >= 0.0 && dto.scheduling_interval.is_finite()) {
            return Err(ConversionError::InvalidValue { field: format!("{}.schedulingInterval", dto.name), reason: "must be a non-negative number".to_string() }.into());
        }

        let policy = VmAllocationPolicyType::from_str(&dto.allocation_policy)?.get_instance();
        let mut hosts = Vec::with_capacity(dto.hosts.len());
        for host_dto in dto.hosts {
            if hosts.iter().any(|host: &Host| host.id == HostId::new(host_dto.id)) {
                return Err(ConversionError::InvalidValue { field: format!("{}.hosts", dto.name), reason: format!("Host id {} is used twice", host_dto.id) }.into());
            }
            hosts.push(Host::try_from(host_dto)?);
        }

        Ok(Datacenter::new(hosts, policy).with_scheduling_interval(dto.scheduling_interval))
    }
}
