mod common;

use cloudsim_kernel::domain::cloud_model::cloudlet::CloudletStatus;
use cloudsim_kernel::domain::cloud_model::entity::fault_injector::{FaultInjector, ScheduledFault};
use cloudsim_kernel::domain::cloud_model::utils::id::{CloudletId, HostId, VmId};
use cloudsim_kernel::domain::cloud_model::vm::VmState;
use cloudsim_kernel::domain::cloud_model::vm_scheduler::VmSchedulerType;
use cloudsim_kernel::domain::simulator::sim_message::SimMessage;

use common::{cloudlet, host, scenario, vm, DATACENTER};

const EPSILON: f64 = 1e-6;

fn bound(id: u64, length: f64, vm: u64) -> cloudsim_kernel::domain::cloud_model::cloudlet::Cloudlet {
    let mut c = cloudlet(id, length, 1);
    c.set_vm(Some(VmId::new(vm)));
    c
}

#[test]
fn test_losing_one_of_two_pes_fails_exactly_one_vm() {
    let mut s = scenario(
        vec![host(0, 2, 1000.0, VmSchedulerType::SpaceShared)],
        vec![vm(0, 1, 1000.0), vm(1, 1, 1000.0)],
        vec![bound(0, 40_000.0, 0), bound(1, 40_000.0, 1)],
    );
    let faults = FaultInjector::new(DATACENTER, vec![ScheduledFault { delay: 10.0, host_id: HostId::new(0), pes: 1 }]);
    s.simulation.add_entity("faults", faults).unwrap();

    assert_eq!(s.simulation.start(), 40.0);

    let broker = s.broker();
    assert_eq!(broker.get_lost_vms(), &[VmId::new(0)]);

    let status = |id: u64| broker.get_finished_cloudlets().iter().find(|c| c.id == CloudletId::new(id)).map(|c| (c.get_status(), c.get_finish_time()));
    assert_eq!(status(0), Some((CloudletStatus::Failed, Some(10.0))));
    assert_eq!(status(1), Some((CloudletStatus::Success, Some(40.0))));

    let failed = broker.get_finished_cloudlets().iter().find(|c| c.id == CloudletId::new(0)).unwrap();
    assert_eq!(failed.get_finished_length(), 10_000.0);

    let datacenter = s.datacenter();
    let host = datacenter.get_host(HostId::new(0)).unwrap();
    assert_eq!(host.get_failed_pes(), 1);
    assert!(!host.is_failed());
    assert_eq!(datacenter.get_vm(VmId::new(0)).unwrap().get_state(), VmState::Failed);
}

#[test]
fn test_degraded_vm_keeps_running_slower() {
    // A 2-vPE Vm on a 2-PE Host loses one vPE and continues at half speed.
    let mut s = scenario(vec![host(0, 2, 1000.0, VmSchedulerType::TimeShared)], vec![vm(0, 2, 1000.0)], vec![cloudlet(0, 40_000.0, 2)]);
    let faults = FaultInjector::new(DATACENTER, vec![ScheduledFault { delay: 10.0, host_id: HostId::new(0), pes: 1 }]);
    s.simulation.add_entity("faults", faults).unwrap();

    s.simulation.start();

    // 20000 MI done by t=10, the remaining 20000 MI at 1000 MIPS.
    assert_eq!(s.finish_time_of(0), Some(30.0));
    assert!(s.broker().get_lost_vms().is_empty());
}

#[test]
fn test_whole_host_failure_fails_every_vm() {
    let mut s = scenario(
        vec![host(0, 2, 1000.0, VmSchedulerType::SpaceShared)],
        vec![vm(0, 1, 1000.0), vm(1, 1, 1000.0)],
        vec![bound(0, 40_000.0, 0), bound(1, 40_000.0, 1)],
    );
    let faults = FaultInjector::new(DATACENTER, vec![ScheduledFault { delay: 5.0, host_id: HostId::new(0), pes: 2 }]);
    s.simulation.add_entity("faults", faults).unwrap();

    assert_eq!(s.simulation.start(), 5.0);

    let broker = s.broker();
    assert_eq!(broker.get_lost_vms(), &[VmId::new(0), VmId::new(1)]);
    assert_eq!(broker.count_cloudlets_with_status(CloudletStatus::Failed), 2);
    assert!(s.datacenter().get_host(HostId::new(0)).unwrap().is_failed());
}

#[test]
fn test_failure_of_unknown_host_is_ignored() {
    let mut s = scenario(vec![host(0, 1, 1000.0, VmSchedulerType::TimeShared)], vec![vm(0, 1, 1000.0)], vec![cloudlet(0, 40_000.0, 1)]);
    let faults = FaultInjector::new(DATACENTER, vec![ScheduledFault { delay: 5.0, host_id: HostId::new(9), pes: 1 }]);
    s.simulation.add_entity("faults", faults).unwrap();

    assert_eq!(s.simulation.start(), 40.0);
    assert_eq!(s.broker().count_cloudlets_with_status(CloudletStatus::Success), 1);
}

#[test]
fn test_oversubscribed_time_shared_host_loses_a_pe_without_losing_vms() {
    let vms = (0..6).map(|id| vm(id, 1, 100.0)).collect();
    let cloudlets = (0..6).map(|id| bound(id, 2000.0, id)).collect();
    let mut s = scenario(vec![host(0, 4, 1000.0, VmSchedulerType::TimeShared)], vms, cloudlets);
    let faults = FaultInjector::new(DATACENTER, vec![ScheduledFault { delay: 5.0, host_id: HostId::new(0), pes: 1 }]);
    s.simulation.add_entity("faults", faults).unwrap();

    assert_eq!(s.simulation.start(), 20.0);

    let broker = s.broker();
    assert!(broker.get_lost_vms().is_empty());
    assert_eq!(broker.count_cloudlets_with_status(CloudletStatus::Success), 6);
    for id in 0..6 {
        assert_eq!(s.finish_time_of(id), Some(20.0));
    }
    assert_eq!(s.datacenter().get_host(HostId::new(0)).unwrap().get_working_pes(), 3);
}

#[test]
fn test_pe_failure_on_the_target_calls_the_migration_off() {
    let mut s = scenario(
        vec![host(0, 1, 1000.0, VmSchedulerType::TimeShared), host(1, 1, 1000.0, VmSchedulerType::SpaceShared)],
        vec![vm(0, 1, 1000.0)],
        vec![cloudlet(0, 40_000.0, 1)],
    );
    let datacenter = s.datacenter;
    s.simulation.send(datacenter, 10.0, SimMessage::VmMigrate { vm_id: VmId::new(0), target: Some(HostId::new(1)) });
    let faults = FaultInjector::new(DATACENTER, vec![ScheduledFault { delay: 10.1, host_id: HostId::new(1), pes: 1 }]);
    s.simulation.add_entity("faults", faults).unwrap();

    s.simulation.pause(10.1);
    s.simulation.start();
    {
        let dc = s.datacenter();
        let vm = dc.get_vm(VmId::new(0)).unwrap();
        assert_eq!(vm.get_state(), VmState::Created);
        assert_eq!(vm.get_host(), Some(HostId::new(0)));

        let source = dc.get_host(HostId::new(0)).unwrap();
        assert!(!source.get_vm_scheduler().is_migrating_out(VmId::new(0)));
        assert!((source.get_allocated_mips_for(VmId::new(0)).total() - 1000.0).abs() < EPSILON);

        let target = dc.get_host(HostId::new(1)).unwrap();
        assert!(target.is_failed());
        assert!(!target.hosts_vm(VmId::new(0)));
    }
    s.simulation.resume();

    // 900 MIPS while the migration was under way, the full share again afterwards.
    let expected = 10.1 + (40_000.0 - 10_000.0 - 900.0 * (10.1 - 10.0)) / 1000.0;
    let finish = s.finish_time_of(0).unwrap();
    assert!((finish - expected).abs() < EPSILON, "finished at {}, expected {}", finish, expected);
    assert_eq!(s.datacenter().get_migration_count(), 0);
    assert!(s.broker().get_lost_vms().is_empty());
}
