pub mod config;
pub mod lifecycle;
pub mod orchestrator;
pub mod registration;
pub mod store;
pub mod terminal;
