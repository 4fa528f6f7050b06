//! Orchestration backends the launcher registers and runs pipelines on

pub mod client;
pub mod http;
pub mod memory;

use crate::core::{ExecutionDescription, ExecutionParameters, Pipeline};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::{BackendClientConfig, WaitPolicy};
pub use http::HttpBackend;
pub use memory::{BackendCall, ExecutionOutcome, InMemoryBackend};

/// Error types for backend operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("definition rejected: {0}")]
    InvalidDefinition(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("execution still running after {attempts} status checks")]
    WaitTimeout { attempts: u32 },

    #[error("unexpected backend response: {0}")]
    Protocol(String),

    #[error("backend misconfigured: {0}")]
    Configuration(String),
}

/// A pipeline definition registered in the backend catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineHandle {
    pub pipeline_name: String,
    pub pipeline_arn: String,
}

/// A started execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionHandle {
    pub pipeline_name: String,
    pub execution_arn: String,
}

/// A backend that can register pipelines and run them
#[async_trait]
pub trait OrchestrationBackend: Send + Sync {
    /// Create or replace the named pipeline definition under `role_arn`
    async fn register(
        &self,
        pipeline: &Pipeline,
        role_arn: &str,
    ) -> Result<PipelineHandle, BackendError>;

    /// Start an execution of a registered pipeline
    async fn start(
        &self,
        pipeline_name: &str,
        parameters: &ExecutionParameters,
    ) -> Result<ExecutionHandle, BackendError>;

    /// Block until the execution reaches a terminal status
    async fn wait(&self, execution: &ExecutionHandle) -> Result<ExecutionDescription, BackendError>;
}
