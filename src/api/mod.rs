pub mod endpoint;
pub mod orchestrator_dto;
pub mod supervisor_dto;
