//! Configuration types for the epoch prover and its client binary.

mod config;
mod orchestrator;

pub use config::{ClientConfig, LoggingConfig, SimulationConfig};
pub use orchestrator::OrchestratorConfig;
