pub mod event_queue;
pub mod sim_entity;
pub mod sim_event;
pub mod sim_message;
pub mod simulation;
