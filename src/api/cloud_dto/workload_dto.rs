use serde::{Deserialize, Serialize};

fn default_cloudlet_scheduler() -> String {
    "TimeShared".to_string()
}

fn default_file_size() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerDto {
    pub name: String,
    pub datacenter: String,
    #[serde(default)]
    pub vms: Vec<VmDto>,
    #[serde(default)]
    pub cloudlets: Vec<CloudletDto>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmDto {
    pub id: u64,
    pub mips: f64,
    pub pes: usize,
    pub ram: u64,
    pub bw: u64,
    pub size: u64,
    #[serde(default = "default_cloudlet_scheduler")]
    pub cloudlet_scheduler: String,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudletDto {
    pub id: u64,
    pub length: f64,
    pub pes: usize,
    #[serde(default = "default_file_size")]
    pub file_size: u64,
    #[serde(default = "default_file_size")]
    pub output_size: u64,
    /// Binds the Cloudlet to a Vm; unbound Cloudlets are spread round-robin.
    pub vm_id: Option<u64>,
    pub utilization_cpu: Option<UtilizationModelDto>,
    pub utilization_ram: Option<UtilizationModelDto>,
    pub utilization_bw: Option<UtilizationModelDto>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationModelDto {
    pub typ: String,
    #[serde(default)]
    pub initial: f64,
    #[serde(default)]
    pub increment: f64,
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultDto {
    pub datacenter: String,
    pub delay: f64,
    pub host_id: u64,
    pub pes: usize,
}
