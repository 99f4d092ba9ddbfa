use crate::domain::cloud_model::cloudlet::Cloudlet;
use crate::domain::cloud_model::utils::id::{CloudletId, HostId, VmId};
use crate::domain::cloud_model::vm::Vm;
use crate::domain::simulator::sim_event::EventPriority;
use crate::error::AllocationError;

/// Every message entities can exchange. Objects travel by value: a Vm or Cloudlet is owned by
/// exactly one party at a time.
#[derive(Debug)]
pub enum SimMessage {
    /// Broker → Datacenter: place this Vm.
    VmCreate { vm: Box<Vm> },
    /// Datacenter → Broker: the Vm runs on `host_id`.
    VmCreated { vm_id: VmId, host_id: HostId },
    /// Datacenter → Broker: no Host could take the Vm; it is handed back.
    VmCreateFailed { vm: Box<Vm>, reason: AllocationError },
    VmDestroy { vm_id: VmId },
    /// Start a live migration of the Vm to `target`, or to a Host the allocation policy picks.
    VmMigrate { vm_id: VmId, target: Option<HostId> },
    /// Datacenter → itself once the migration delay has passed.
    VmMigrationComplete { vm_id: VmId, source: HostId, target: HostId },
    /// Datacenter → Broker: the Vm lost all its PEs.
    VmFailed { vm_id: VmId, host_id: HostId },
    CloudletSubmit { cloudlet: Box<Cloudlet> },
    CloudletCancel { cloudlet_id: CloudletId },
    CloudletPause { cloudlet_id: CloudletId },
    CloudletResume { cloudlet_id: CloudletId },
    /// Datacenter → Broker: the Cloudlet reached a terminal state.
    CloudletReturn { cloudlet: Box<Cloudlet> },
    /// Datacenter → itself: advance Cloudlet processing.
    UpdateProcessing,
    /// Fail `pes` working PEs of the Host.
    HostPeFailure { host_id: HostId, pes: usize },
    /// Free-form message for user entities.
    Custom { tag: u32, data: String },
    /// Ends the run after the current batch of events.
    EndOfSimulation,
}

impl SimMessage {
    pub fn priority(&self) -> EventPriority {
        match self {
            SimMessage::HostPeFailure { .. } => EventPriority::High,
            SimMessage::EndOfSimulation => EventPriority::Low,
            _ => EventPriority::Normal,
        }
    }

    /// Returns string representation of the message kind for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SimMessage::VmCreate { .. } => "VmCreate",
            SimMessage::VmCreated { .. } => "VmCreated",
            SimMessage::VmCreateFailed { .. } => "VmCreateFailed",
            SimMessage::VmDestroy { .. } => "VmDestroy",
            SimMessage::VmMigrate { .. } => "VmMigrate",
            SimMessage::VmMigrationComplete { .. } => "VmMigrationComplete",
            SimMessage::VmFailed { .. } => "VmFailed",
            SimMessage::CloudletSubmit { .. } => "CloudletSubmit",
            SimMessage::CloudletCancel { .. } => "CloudletCancel",
            SimMessage::CloudletPause { .. } => "CloudletPause",
            SimMessage::CloudletResume { .. } => "CloudletResume",
            SimMessage::CloudletReturn { .. } => "CloudletReturn",
            SimMessage::UpdateProcessing => "UpdateProcessing",
            SimMessage::HostPeFailure { .. } => "HostPeFailure",
            SimMessage::Custom { .. } => "Custom",
            SimMessage::EndOfSimulation => "EndOfSimulation",
        }
    }
}
