mod common;

use std::sync::{Arc, Mutex};

use cloudsim_kernel::domain::cloud_model::allocation::VmAllocationPolicyType;
use cloudsim_kernel::domain::cloud_model::cloudlet::{CloudletFinishInfo, CloudletStatus};
use cloudsim_kernel::domain::cloud_model::cloudlet_scheduler::space_shared::CloudletSchedulerSpaceShared;
use cloudsim_kernel::domain::cloud_model::entity::broker::DatacenterBroker;
use cloudsim_kernel::domain::cloud_model::entity::datacenter::Datacenter;
use cloudsim_kernel::domain::cloud_model::utils::id::{CloudletId, HostId, VmId};
use cloudsim_kernel::domain::cloud_model::vm::{Vm, VmState};
use cloudsim_kernel::domain::cloud_model::vm_scheduler::VmSchedulerType;
use cloudsim_kernel::domain::simulator::sim_entity::EntityState;
use cloudsim_kernel::domain::simulator::simulation::{Simulation, SimulationState};

use common::{cloudlet, host, scenario, vm, BROKER, DATACENTER};

#[test]
fn test_single_cloudlet_finishes_at_length_over_mips() {
    let mut s = scenario(vec![host(0, 1, 1000.0, VmSchedulerType::TimeShared)], vec![vm(0, 1, 1000.0)], vec![cloudlet(0, 40_000.0, 1)]);

    let end = s.simulation.start();

    assert_eq!(end, 40.0);
    assert_eq!(s.simulation.get_state(), SimulationState::Terminated);
    assert_eq!(s.finish_time_of(0), Some(40.0));

    let finished = &s.broker().get_finished_cloudlets()[0];
    assert_eq!(finished.get_status(), CloudletStatus::Success);
    assert_eq!(finished.get_finished_length(), 40_000.0);
    assert_eq!(finished.get_exec_start_time(), Some(0.0));
    assert_eq!(finished.get_vm(), Some(VmId::new(0)));

    // The broker destroyed its Vm once the work was done.
    let datacenter = s.datacenter();
    assert_eq!(datacenter.get_vm(VmId::new(0)).map(|vm| vm.get_state()), Some(VmState::Destroyed));
    assert_eq!(datacenter.get_host(HostId::new(0)).map(|h| h.get_available_mips()), Some(1000.0));
    assert_eq!(s.simulation.entity_state(s.broker), Some(EntityState::Finished));
}

#[test]
fn test_time_shared_cloudlets_share_the_vm() {
    let mut s = scenario(
        vec![host(0, 1, 1000.0, VmSchedulerType::TimeShared)],
        vec![vm(0, 1, 1000.0)],
        vec![cloudlet(0, 40_000.0, 1), cloudlet(1, 40_000.0, 1)],
    );

    assert_eq!(s.simulation.start(), 80.0);
    assert_eq!(s.finish_time_of(0), Some(80.0));
    assert_eq!(s.finish_time_of(1), Some(80.0));
}

#[test]
fn test_space_shared_cloudlets_run_one_after_another() {
    let vm = Vm::new(VmId::new(0), 1000.0, 1, 1024, 1000, 10_000, Box::new(CloudletSchedulerSpaceShared::new()));
    let mut s = scenario(vec![host(0, 1, 1000.0, VmSchedulerType::SpaceShared)], vec![vm], vec![cloudlet(0, 40_000.0, 1), cloudlet(1, 20_000.0, 1)]);

    s.simulation.start();

    assert_eq!(s.finish_time_of(0), Some(40.0));
    assert_eq!(s.finish_time_of(1), Some(60.0));
    let second = s.broker().get_finished_cloudlets().iter().find(|c| c.id == CloudletId::new(1)).and_then(|c| c.get_exec_start_time());
    assert_eq!(second, Some(40.0));
}

#[test]
fn test_scheduling_interval_does_not_delay_completion() {
    let mut simulation = Simulation::new();
    let datacenter = Datacenter::new(vec![host(0, 1, 1000.0, VmSchedulerType::TimeShared)], VmAllocationPolicyType::FirstFit.get_instance())
        .with_scheduling_interval(15.0);
    simulation.add_entity(DATACENTER, datacenter).unwrap();

    let mut broker = DatacenterBroker::new(DATACENTER);
    broker.submit_vm_list(vec![vm(0, 1, 1000.0)]);
    broker.submit_cloudlet_list(vec![cloudlet(0, 40_000.0, 1)]);
    let broker = simulation.add_entity(BROKER, broker).unwrap();

    assert_eq!(simulation.start(), 40.0);
    let finished = simulation.entity::<DatacenterBroker>(broker).unwrap().get_finished_cloudlets();
    assert_eq!(finished[0].get_finish_time(), Some(40.0));
}

#[test]
fn test_finish_listener_fires_once_with_the_finish_time() {
    let seen: Arc<Mutex<Vec<CloudletFinishInfo>>> = Arc::new(Mutex::new(Vec::new()));
    let mut job = cloudlet(7, 10_000.0, 1);
    let sink = Arc::clone(&seen);
    job.add_on_finish_listener(Box::new(move |info: &CloudletFinishInfo| sink.lock().unwrap().push(info.clone())));

    let mut s = scenario(vec![host(0, 2, 1000.0, VmSchedulerType::TimeShared)], vec![vm(0, 2, 500.0)], vec![job]);
    s.simulation.start();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].cloudlet_id, CloudletId::new(7));
    assert_eq!(seen[0].finish_time, 20.0);
    assert_eq!(seen[0].vm_id, Some(VmId::new(0)));
}

#[test]
fn test_unplaceable_vm_is_returned_and_the_run_continues() {
    let mut s = scenario(
        vec![host(0, 1, 1000.0, VmSchedulerType::SpaceShared)],
        vec![vm(0, 1, 1000.0), vm(1, 1, 1000.0)],
        vec![cloudlet(0, 10_000.0, 1), cloudlet(1, 10_000.0, 1)],
    );

    assert_eq!(s.simulation.start(), 20.0);

    let broker = s.broker();
    assert_eq!(broker.get_created_vms(), &[VmId::new(0)]);
    assert_eq!(broker.get_failed_vms().len(), 1);
    assert_eq!(broker.get_failed_vms()[0].id, VmId::new(1));
    assert_eq!(broker.count_cloudlets_with_status(CloudletStatus::Success), 2);
    assert!(broker.get_finished_cloudlets().iter().all(|c| c.get_vm() == Some(VmId::new(0))));
}

#[test]
fn test_second_live_vm_with_a_taken_id_is_refused() {
    let mut s = scenario(
        vec![host(0, 1, 1000.0, VmSchedulerType::SpaceShared), host(1, 1, 1000.0, VmSchedulerType::SpaceShared)],
        vec![vm(0, 1, 1000.0)],
        vec![cloudlet(0, 10_000.0, 1)],
    );
    let mut other = DatacenterBroker::new(DATACENTER);
    other.submit_vm_list(vec![vm(0, 1, 1000.0)]);
    let other = s.simulation.add_entity("broker-1", other).unwrap();

    assert_eq!(s.simulation.start(), 10.0);

    assert_eq!(s.broker().get_created_vms(), &[VmId::new(0)]);
    let refused = s.simulation.entity::<DatacenterBroker>(other).unwrap();
    assert!(refused.get_created_vms().is_empty());
    assert_eq!(refused.get_failed_vms().len(), 1);

    let datacenter = s.datacenter();
    assert_eq!(datacenter.get_vms().count(), 1);
    for host in datacenter.get_hosts() {
        assert!(host.get_vms().is_empty());
        assert_eq!(host.get_available_ram(), 16_384);
    }
}

#[test]
fn test_bound_cloudlets_stay_on_their_vm() {
    let mut bound = cloudlet(0, 10_000.0, 1);
    bound.set_vm(Some(VmId::new(1)));
    let mut s = scenario(
        vec![host(0, 2, 1000.0, VmSchedulerType::TimeShared)],
        vec![vm(0, 1, 1000.0), vm(1, 1, 1000.0)],
        vec![bound, cloudlet(1, 10_000.0, 1), cloudlet(2, 10_000.0, 1)],
    );

    s.simulation.start();

    let on = |id: u64| s.broker().get_finished_cloudlets().iter().find(|c| c.id == CloudletId::new(id)).and_then(|c| c.get_vm());
    assert_eq!(on(0), Some(VmId::new(1)));
    assert_eq!(on(1), Some(VmId::new(0)));
    assert_eq!(on(2), Some(VmId::new(1)));
}

#[test]
fn test_identical_scenarios_replay_identically() {
    let run = || {
        let mut s = scenario(
            vec![host(0, 2, 1000.0, VmSchedulerType::TimeShared), host(1, 1, 2000.0, VmSchedulerType::TimeShared)],
            vec![vm(0, 2, 1000.0), vm(1, 1, 1500.0), vm(2, 1, 500.0)],
            (0..9).map(|i| cloudlet(i, 5_000.0 * (i + 1) as f64, 1)).collect(),
        );
        let end = s.simulation.start();
        let finish: Vec<(u64, Option<f64>)> = (0..9).map(|i| (i, s.finish_time_of(i))).collect();
        (end, s.simulation.get_processed_events(), finish)
    };

    assert_eq!(run(), run());
}
