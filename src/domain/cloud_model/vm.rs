use std::str::FromStr;

use crate::api::cloud_dto::workload_dto::VmDto;
use crate::domain::cloud_model::cloudlet::Cloudlet;
use crate::domain::cloud_model::cloudlet_scheduler::cloudlet_scheduler_trait::CloudletScheduler;
use crate::domain::cloud_model::cloudlet_scheduler::time_shared::CloudletSchedulerTimeShared;
use crate::domain::cloud_model::cloudlet_scheduler::CloudletSchedulerType;
use crate::domain::cloud_model::resource::mips_share::MipsShare;
use crate::domain::cloud_model::utils::id::{HostId, VmId};
use crate::domain::simulator::sim_entity::EntityId;
use crate::error::{ConversionError, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    /// Not placed on any Host yet.
    Waiting,
    Created,
    Migrating,
    Failed,
    Destroyed,
}

/// A virtual machine: the resources it asks a Host for plus the Cloudlets running inside it.
#[derive(Debug)]
pub struct Vm {
    pub id: VmId,
    mips: f64,
    pes: usize,
    /// vPEs still alive after PE failures on the Host; equals `pes` unless degraded.
    working_pes: usize,
    ram: u64,
    bw: u64,
    size: u64,
    broker: Option<EntityId>,
    host: Option<HostId>,
    state: VmState,
    cloudlet_scheduler: Box<dyn CloudletScheduler>,
}

impl Vm {
    pub fn new(id: VmId, mips: f64, pes: usize, ram: u64, bw: u64, size: u64, cloudlet_scheduler: Box<dyn CloudletScheduler>) -> Self {
        assert!(mips > 0.0 && mips.is_finite(), "Vm {} must request positive MIPS per PE, got {}", id, mips);
        assert!(pes > 0, "Vm {} must request at least one PE", id);

        Self { id, mips, pes, working_pes: pes, ram, bw, size, broker: None, host: None, state: VmState::Waiting, cloudlet_scheduler }
    }

    /// A Vm with the default time-shared Cloudlet scheduler.
    pub fn with_time_shared(id: VmId, mips: f64, pes: usize, ram: u64, bw: u64, size: u64) -> Self {
        Vm::new(id, mips, pes, ram, bw, size, Box::new(CloudletSchedulerTimeShared::new()))
    }

    pub fn get_mips(&self) -> f64 {
        self.mips
    }

    pub fn get_pes(&self) -> usize {
        self.pes
    }

    pub fn get_working_pes(&self) -> usize {
        self.working_pes
    }

    pub fn set_working_pes(&mut self, working_pes: usize) {
        assert!(working_pes <= self.pes, "Vm {} cannot have {} working PEs out of {}", self.id, working_pes, self.pes);
        self.working_pes = working_pes;
    }

    pub fn is_degraded(&self) -> bool {
        self.working_pes < self.pes && self.state != VmState::Failed
    }

    pub fn get_ram(&self) -> u64 {
        self.ram
    }

    pub fn get_bw(&self) -> u64 {
        self.bw
    }

    pub fn get_size(&self) -> u64 {
        self.size
    }

    /// One entry of `mips` per working vPE.
    pub fn get_requested_mips(&self) -> MipsShare {
        MipsShare::uniform(self.working_pes, self.mips)
    }

    pub fn get_total_mips(&self) -> f64 {
        self.mips * self.working_pes as f64
    }

    pub fn get_broker(&self) -> Option<EntityId> {
        self.broker
    }

    pub fn set_broker(&mut self, broker: Option<EntityId>) {
        self.broker = broker;
    }

    pub fn get_host(&self) -> Option<HostId> {
        self.host
    }

    pub fn set_host(&mut self, host: Option<HostId>) {
        self.host = host;
    }

    pub fn get_state(&self) -> VmState {
        self.state
    }

    pub fn set_state(&mut self, state: VmState) {
        self.state = state;
    }

    pub fn is_created(&self) -> bool {
        matches!(self.state, VmState::Created | VmState::Migrating)
    }

    pub fn is_failed(&self) -> bool {
        self.state == VmState::Failed
    }

    pub fn get_cloudlet_scheduler(&self) -> &dyn CloudletScheduler {
        self.cloudlet_scheduler.as_ref()
    }

    pub fn get_cloudlet_scheduler_mut(&mut self) -> &mut dyn CloudletScheduler {
        self.cloudlet_scheduler.as_mut()
    }

    pub fn submit_cloudlet(&mut self, mut cloudlet: Cloudlet, now: f64) {
        cloudlet.set_vm(Some(self.id));
        self.cloudlet_scheduler.submit(cloudlet, now);
    }

    /// Advances the Cloudlets to `now` with the MIPS the Host currently grants. Returns the next
    /// completion time, if any Cloudlet is running.
    pub fn update_processing(&mut self, now: f64, share: &MipsShare) -> Option<f64> {
        self.cloudlet_scheduler.update_processing(now, share)
    }

    /// Marks the Vm failed and fails every Cloudlet it still runs, returning those.
    pub fn set_failed(&mut self, now: f64) -> Vec<Cloudlet> {
        self.state = VmState::Failed;
        self.working_pes = 0;
        self.host = None;
        self.cloudlet_scheduler.fail_all(now)
    }
}

impl TryFrom<VmDto> for Vm {
    type Error = Error;

    fn try_from(dto: VmDto) -> Result<Self, Self::Error> {
        if !(dto.mips > 0.0 && dto.mips.is_finite()) {
            return Err(ConversionError::InvalidValue { field: format!("vms[{}].mips", dto.id), reason: "must be positive".to_string() }.into());
        }
        if dto.pes == 0 {
            return Err(ConversionError::InvalidValue { field: format!("vms[{}].pes", dto.id), reason: "must be at least 1".to_string() }.into());
        }

        let scheduler = CloudletSchedulerType::from_str(&dto.cloudlet_scheduler)?.get_instance();
        Ok(Vm::new(VmId::new(dto.id), dto.mips, dto.pes, dto.ram, dto.bw, dto.size, scheduler))
    }
}
