pub mod api_trait;
pub mod orchestrator_client;
pub mod supervisor_client;
