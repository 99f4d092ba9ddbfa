pub mod space_shared;
pub mod time_shared;
pub mod vm_scheduler_trait;

use std::str::FromStr;

use crate::domain::cloud_model::vm_scheduler::space_shared::VmSchedulerSpaceShared;
use crate::domain::cloud_model::vm_scheduler::time_shared::VmSchedulerTimeShared;
use crate::domain::cloud_model::vm_scheduler::vm_scheduler_trait::VmScheduler;
use crate::error::ConversionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmSchedulerType {
    SpaceShared,
    TimeShared,
}

impl FromStr for VmSchedulerType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SpaceShared" | "VmSchedulerSpaceShared" => Ok(VmSchedulerType::SpaceShared),
            "TimeShared" | "VmSchedulerTimeShared" => Ok(VmSchedulerType::TimeShared),
            _ => Err(ConversionError::UnknownVmSchedulerType(s.to_string())),
        }
    }
}

impl VmSchedulerType {
    // Factory method to create a concrete VmScheduler implementation
    pub fn get_instance(&self, migration_overhead: f64, min_share_fraction: f64) -> Box<dyn VmScheduler> {
        match self {
            VmSchedulerType::SpaceShared => Box::new(VmSchedulerSpaceShared::new(migration_overhead)),
            VmSchedulerType::TimeShared => Box::new(VmSchedulerTimeShared::new(migration_overhead, min_share_fraction)),
        }
    }
}
