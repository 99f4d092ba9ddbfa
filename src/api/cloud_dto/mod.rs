pub mod datacenter_dto;
pub mod workload_dto;
