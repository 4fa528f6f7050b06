//! pipeline-launcher - register and run a preprocessing + training pipeline on an ML orchestration backend

pub mod backend;
pub mod cli;
pub mod core;
pub mod execution;

// Re-export commonly used types
pub use backend::{BackendError, OrchestrationBackend, HttpBackend, InMemoryBackend};
pub use core::{Pipeline, PipelineConfig, Step, ExecutionStatus, ExecutionDescription};
pub use execution::{Launcher, LaunchError, LaunchEvent};
