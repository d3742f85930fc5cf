pub mod audit;
pub mod context;
pub mod degradation;
pub mod feedback;
pub mod orchestrator;
pub mod patient;
pub mod ranking;
pub mod retrieval;
pub mod safety;
pub mod synthesis;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::{DifferentialPipeline, PipelineError};
