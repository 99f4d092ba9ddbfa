mod common;

use cloudsim_kernel::domain::cloud_model::vm_scheduler::VmSchedulerType;
use common::{cloudlet, host, scenario, vm};

// logtest installs a process-wide logger, so this file holds a single test.
#[test]
fn test_rejected_vm_is_reported_as_warning() {
    let mut logger = logtest::Logger::start();

    let hosts = vec![host(0, 1, 1000.0, VmSchedulerType::SpaceShared)];
    let mut s = scenario(hosts, vec![vm(0, 2, 1000.0)], vec![cloudlet(0, 1000.0, 1)]);
    s.simulation.start();

    assert_eq!(s.broker().get_failed_vms().len(), 1);

    let mut warned = false;
    while let Some(record) = logger.pop() {
        if record.level() == log::Level::Warn && record.args().contains("VmCreationFailed") {
            warned = true;
        }
    }
    assert!(warned, "expected a VmCreationFailed warning");
}
