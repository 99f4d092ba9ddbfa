pub mod allocation;
pub mod cloudlet;
pub mod cloudlet_scheduler;
pub mod entity;
pub mod host;
pub mod resource;
pub mod utilization_model;
pub mod utils;
pub mod vm;
pub mod vm_scheduler;
