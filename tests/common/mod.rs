#![allow(dead_code)]

use cloudsim_kernel::domain::cloud_model::allocation::VmAllocationPolicyType;
use cloudsim_kernel::domain::cloud_model::cloudlet::Cloudlet;
use cloudsim_kernel::domain::cloud_model::entity::broker::DatacenterBroker;
use cloudsim_kernel::domain::cloud_model::entity::datacenter::Datacenter;
use cloudsim_kernel::domain::cloud_model::host::Host;
use cloudsim_kernel::domain::cloud_model::resource::pe::Pe;
use cloudsim_kernel::domain::cloud_model::utils::id::{CloudletId, HostId, PeId, VmId};
use cloudsim_kernel::domain::cloud_model::vm::Vm;
use cloudsim_kernel::domain::cloud_model::vm_scheduler::VmSchedulerType;
use cloudsim_kernel::domain::cloud_model::vm_scheduler::vm_scheduler_trait::DEFAULT_MIGRATION_OVERHEAD;
use cloudsim_kernel::domain::simulator::sim_entity::EntityId;
use cloudsim_kernel::domain::simulator::simulation::Simulation;

pub const DATACENTER: &str = "datacenter-0";
pub const BROKER: &str = "broker-0";

pub fn host(id: u64, pes: u64, mips: f64, scheduler: VmSchedulerType) -> Host {
    let pes = (0..pes).map(|i| Pe::new(PeId::new(i), mips)).collect();
    Host::new(HostId::new(id), pes, 16_384, 100_000, 1_000_000, scheduler.get_instance(DEFAULT_MIGRATION_OVERHEAD, 0.0))
}

pub fn vm(id: u64, pes: usize, mips: f64) -> Vm {
    Vm::with_time_shared(VmId::new(id), mips, pes, 1024, 1000, 10_000)
}

pub fn cloudlet(id: u64, length: f64, pes: usize) -> Cloudlet {
    Cloudlet::new(CloudletId::new(id), length, pes)
}

pub struct Scenario {
    pub simulation: Simulation,
    pub datacenter: EntityId,
    pub broker: EntityId,
}

/// One Datacenter under first-fit plus one broker owning the given workload.
pub fn scenario(hosts: Vec<Host>, vms: Vec<Vm>, cloudlets: Vec<Cloudlet>) -> Scenario {
    let mut simulation = Simulation::new();
    let datacenter = simulation.add_entity(DATACENTER, Datacenter::new(hosts, VmAllocationPolicyType::FirstFit.get_instance())).unwrap();

    let mut broker = DatacenterBroker::new(DATACENTER);
    broker.submit_vm_list(vms);
    broker.submit_cloudlet_list(cloudlets);
    let broker = simulation.add_entity(BROKER, broker).unwrap();

    Scenario { simulation, datacenter, broker }
}

impl Scenario {
    pub fn broker(&self) -> &DatacenterBroker {
        self.simulation.entity::<DatacenterBroker>(self.broker).unwrap()
    }

    pub fn datacenter(&self) -> &Datacenter {
        self.simulation.entity::<Datacenter>(self.datacenter).unwrap()
    }

    pub fn finish_time_of(&self, id: u64) -> Option<f64> {
        self.broker().get_finished_cloudlets().iter().find(|c| c.id == CloudletId::new(id)).and_then(|c| c.get_finish_time())
    }
}
