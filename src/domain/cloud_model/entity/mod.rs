pub mod broker;
pub mod datacenter;
pub mod fault_injector;
