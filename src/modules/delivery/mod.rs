pub mod isolate;
pub mod orchestrator;
