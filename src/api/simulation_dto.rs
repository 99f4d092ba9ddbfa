use serde::{Deserialize, Serialize};

use crate::api::cloud_dto::datacenter_dto::DatacenterDto;
use crate::api::cloud_dto::workload_dto::{BrokerDto, FaultDto};

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationDto {
    pub datacenters: Vec<DatacenterDto>,
    #[serde(default)]
    pub brokers: Vec<BrokerDto>,
    #[serde(default)]
    pub faults: Vec<FaultDto>,
    pub terminate_at: Option<f64>,
}
