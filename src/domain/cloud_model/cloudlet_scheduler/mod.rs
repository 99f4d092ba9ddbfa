pub mod cloudlet_scheduler_trait;
pub mod space_shared;
pub mod time_shared;

use std::str::FromStr;

use crate::domain::cloud_model::cloudlet_scheduler::cloudlet_scheduler_trait::CloudletScheduler;
use crate::domain::cloud_model::cloudlet_scheduler::space_shared::CloudletSchedulerSpaceShared;
use crate::domain::cloud_model::cloudlet_scheduler::time_shared::CloudletSchedulerTimeShared;
use crate::error::ConversionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloudletSchedulerType {
    SpaceShared,
    #[default]
    TimeShared,
}

impl FromStr for CloudletSchedulerType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SpaceShared" | "CloudletSchedulerSpaceShared" => Ok(CloudletSchedulerType::SpaceShared),
            "TimeShared" | "CloudletSchedulerTimeShared" => Ok(CloudletSchedulerType::TimeShared),
            _ => Err(ConversionError::UnknownCloudletSchedulerType(s.to_string())),
        }
    }
}

impl CloudletSchedulerType {
    pub fn get_instance(&self) -> Box<dyn CloudletScheduler> {
        match self {
            CloudletSchedulerType::SpaceShared => Box::new(CloudletSchedulerSpaceShared::new()),
            CloudletSchedulerType::TimeShared => Box::new(CloudletSchedulerTimeShared::new()),
        }
    }
}
