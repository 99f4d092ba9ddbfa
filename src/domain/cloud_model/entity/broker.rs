use std::any::Any;

use crate::api::cloud_dto::workload_dto::BrokerDto;
use crate::domain::cloud_model::cloudlet::{Cloudlet, CloudletStatus};
use crate::domain::cloud_model::utils::id::VmId;
use crate::domain::cloud_model::vm::Vm;
use crate::domain::simulator::sim_entity::{EntityId, SimContext, SimEntity};
use crate::domain::simulator::sim_event::SimEvent;
use crate::domain::simulator::sim_message::SimMessage;
use crate::error::Error;

/// Acts on behalf of a user: asks one Datacenter to create its Vms, submits its Cloudlets once
/// every Vm request has been answered and destroys the Vms after the last Cloudlet came back.
///
/// Cloudlets bound to a Vm that was created go to that Vm; all others are spread round-robin
/// over the created Vms in creation order.
#[derive(Debug)]
pub struct DatacenterBroker {
    datacenter_name: String,
    datacenter: Option<EntityId>,
    vm_list: Vec<Vm>,
    cloudlet_list: Vec<Cloudlet>,
    pending_vm_requests: usize,
    created_vms: Vec<VmId>,
    failed_vms: Vec<Vm>,
    lost_vms: Vec<VmId>,
    submitted_cloudlets: usize,
    finished_cloudlets: Vec<Cloudlet>,
    next_vm: usize,
    destroy_idle_vms: bool,
}

impl DatacenterBroker {
    pub fn new(datacenter_name: &str) -> Self {
        Self {
            datacenter_name: datacenter_name.to_string(),
            datacenter: None,
            vm_list: Vec::new(),
            cloudlet_list: Vec::new(),
            pending_vm_requests: 0,
            created_vms: Vec::new(),
            failed_vms: Vec::new(),
            lost_vms: Vec::new(),
            submitted_cloudlets: 0,
            finished_cloudlets: Vec::new(),
            next_vm: 0,
            destroy_idle_vms: true,
        }
    }

    pub fn submit_vm_list(&mut self, vms: impl IntoIterator<Item = Vm>) {
        self.vm_list.extend(vms);
    }

    pub fn submit_cloudlet_list(&mut self, cloudlets: impl IntoIterator<Item = Cloudlet>) {
        self.cloudlet_list.extend(cloudlets);
    }

    /// Keeps the Vms running after the last Cloudlet returned.
    pub fn keep_vms_alive(mut self) -> Self {
        self.destroy_idle_vms = false;
        self
    }

    pub fn get_datacenter_name(&self) -> &str {
        &self.datacenter_name
    }

    pub fn get_created_vms(&self) -> &[VmId] {
        &self.created_vms
    }

    /// Vms no Host could take, handed back by the Datacenter.
    pub fn get_failed_vms(&self) -> &[Vm] {
        &self.failed_vms
    }

    /// Vms that were created but failed later, e.g. because their Host lost its PEs.
    pub fn get_lost_vms(&self) -> &[VmId] {
        &self.lost_vms
    }

    pub fn get_finished_cloudlets(&self) -> &[Cloudlet] {
        &self.finished_cloudlets
    }

    pub fn get_unsubmitted_cloudlets(&self) -> &[Cloudlet] {
        &self.cloudlet_list
    }

    pub fn count_cloudlets_with_status(&self, status: CloudletStatus) -> usize {
        self.finished_cloudlets.iter().filter(|c| c.get_status() == status).count()
    }

    fn all_cloudlets_returned(&self) -> bool {
        self.cloudlet_list.is_empty() && self.finished_cloudlets.len() == self.submitted_cloudlets
    }

    fn select_vm(&mut self, cloudlet: &Cloudlet) -> Option<VmId> {
        if let Some(bound) = cloudlet.get_vm().filter(|vm| self.created_vms.contains(vm)) {
            return Some(bound);
        }
        if self.created_vms.is_empty() {
            return None;
        }

        let vm = self.created_vms[self.next_vm % self.created_vms.len()];
        self.next_vm += 1;
        Some(vm)
    }

    fn submit_cloudlets(&mut self, ctx: &mut SimContext, datacenter: EntityId) {
        if self.cloudlet_list.is_empty() {
            return;
        }
        if self.created_vms.is_empty() {
            log::error!("{:.2}: {}: no Vm was created; {} Cloudlet(s) cannot run.", ctx.clock(), ctx.name(), self.cloudlet_list.len());
            return;
        }

        for mut cloudlet in std::mem::take(&mut self.cloudlet_list) {
            let vm = self.select_vm(&cloudlet);
            cloudlet.set_vm(vm);
            cloudlet.set_broker(Some(ctx.id()));
            log::debug!("{:.2}: {}: sending Cloudlet {} to Vm {:?}.", ctx.clock(), ctx.name(), cloudlet.id, vm);
            ctx.schedule_now(datacenter, SimMessage::CloudletSubmit { cloudlet: Box::new(cloudlet) });
            self.submitted_cloudlets += 1;
        }
        log::info!("{:.2}: {}: {} Cloudlet(s) submitted to {} Vm(s).", ctx.clock(), ctx.name(), self.submitted_cloudlets, self.created_vms.len());
    }

    fn destroy_vms(&mut self, ctx: &mut SimContext, datacenter: EntityId) {
        for vm_id in self.created_vms.iter() {
            ctx.schedule_now(datacenter, SimMessage::VmDestroy { vm_id: *vm_id });
        }
        log::info!("{:.2}: {}: all Cloudlets returned, destroying {} Vm(s).", ctx.clock(), ctx.name(), self.created_vms.len());
    }

    fn vm_request_answered(&mut self, ctx: &mut SimContext, datacenter: EntityId) {
        self.pending_vm_requests = self.pending_vm_requests.saturating_sub(1);
        if self.pending_vm_requests == 0 {
            self.submit_cloudlets(ctx, datacenter);
        }
    }
}

impl SimEntity for DatacenterBroker {
    fn on_start(&mut self, ctx: &mut SimContext) {
        let Some(datacenter) = ctx.entity_by_name(&self.datacenter_name) else {
            log::error!("{:.2}: {}: Datacenter '{}' is not registered.", ctx.clock(), ctx.name(), self.datacenter_name);
            return;
        };
        self.datacenter = Some(datacenter);

        self.pending_vm_requests = self.vm_list.len();
        for vm in self.vm_list.drain(..) {
            ctx.schedule_now(datacenter, SimMessage::VmCreate { vm: Box::new(vm) });
        }
        log::info!("{:.2}: {}: requested {} Vm(s) from '{}'.", ctx.clock(), ctx.name(), self.pending_vm_requests, self.datacenter_name);

        if self.pending_vm_requests == 0 && !self.cloudlet_list.is_empty() {
            self.submit_cloudlets(ctx, datacenter);
        }
    }

    fn on_event(&mut self, ctx: &mut SimContext, event: SimEvent) {
        let Some(datacenter) = self.datacenter else {
            return;
        };

        match event.message {
            SimMessage::VmCreated { vm_id, host_id } => {
                log::debug!("{:.2}: {}: Vm {} runs on Host {}.", ctx.clock(), ctx.name(), vm_id, host_id);
                self.created_vms.push(vm_id);
                self.vm_request_answered(ctx, datacenter);
            }
            SimMessage::VmCreateFailed { vm, reason } => {
                log::warn!("{:.2}: {}: Vm {} rejected: {}", ctx.clock(), ctx.name(), vm.id, reason);
                self.failed_vms.push(*vm);
                self.vm_request_answered(ctx, datacenter);
            }
            SimMessage::VmFailed { vm_id, host_id } => {
                log::warn!("{:.2}: {}: Vm {} failed on Host {}.", ctx.clock(), ctx.name(), vm_id, host_id);
                self.created_vms.retain(|id| *id != vm_id);
                self.lost_vms.push(vm_id);
            }
            SimMessage::CloudletReturn { cloudlet } => {
                log::info!(
                    "{:.2}: {}: Cloudlet {} returned from Vm {:?} with status {:?}.",
                    ctx.clock(),
                    ctx.name(),
                    cloudlet.id,
                    cloudlet.get_vm(),
                    cloudlet.get_status()
                );
                self.finished_cloudlets.push(*cloudlet);
                if self.all_cloudlets_returned() && self.destroy_idle_vms {
                    self.destroy_vms(ctx, datacenter);
                }
            }
            other => log::debug!("{:.2}: {} ignores {}.", ctx.clock(), ctx.name(), other.as_str()),
        }
    }

    fn has_pending_work(&self) -> bool {
        !self.all_cloudlets_returned()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl TryFrom<BrokerDto> for DatacenterBroker {
    type Error = Error;

    fn try_from(dto: BrokerDto) -> Result<Self, Self::Error> {
        let mut broker = DatacenterBroker::new(&dto.datacenter);
        broker.submit_vm_list(dto.vms.into_iter().map(Vm::try_from).collect::<Result<Vec<_>, _>>()?);
        broker.submit_cloudlet_list(dto.cloudlets.into_iter().map(Cloudlet::try_from).collect::<Result<Vec<_>, _>>()?);
        Ok(broker)
    }
}
