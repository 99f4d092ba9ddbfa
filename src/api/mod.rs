pub mod cloud_dto;
pub mod simulation_dto;
