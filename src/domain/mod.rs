pub mod cloud_model;
pub mod simulator;
