use serde::{Deserialize, Serialize};

fn default_allocation_policy() -> String {
    "FirstFit".to_string()
}

fn default_vm_scheduler() -> String {
    "TimeShared".to_string()
}

fn default_migration_overhead() -> f64 {
    0.1
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterDto {
    pub name: String,
    #[serde(default = "default_allocation_policy")]
    pub allocation_policy: String,
    /// 0 updates processing only at Cloudlet completions.
    #[serde(default)]
    pub scheduling_interval: f64,
    pub hosts: Vec<HostDto>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostDto {
    pub id: u64,
    /// MIPS of every PE of the Host.
    pub pes: Vec<f64>,
    pub ram: u64,
    pub bw: u64,
    pub storage: u64,
    #[serde(default = "default_vm_scheduler")]
    pub vm_scheduler: String,
    #[serde(default = "default_migration_overhead")]
    pub migration_overhead: f64,
    #[serde(default)]
    pub min_share_fraction: f64,
}
