//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a pipeline execution as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Execution is running
    Executing,
    /// A stop was requested and is in progress
    Stopping,
    /// Execution was stopped before finishing
    Stopped,
    /// A step failed
    Failed,
    /// Every step succeeded
    Succeeded,
}

impl ExecutionStatus {
    /// Check if the execution can no longer change state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Stopped | ExecutionStatus::Failed | ExecutionStatus::Succeeded
        )
    }

    pub fn is_success(&self) -> bool {
        *self == ExecutionStatus::Succeeded
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Status of one step within an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Starting,
    Executing,
    Stopping,
    Stopped,
    Failed,
    Succeeded,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Stopped | StepStatus::Failed | StepStatus::Succeeded
        )
    }
}

/// Per-step result within an execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StepExecution {
    pub step_name: String,
    pub step_status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Snapshot of an execution returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionDescription {
    /// Backend identifier of the execution
    pub execution_arn: String,

    /// Pipeline the execution belongs to
    pub pipeline_name: String,

    pub status: ExecutionStatus,

    /// Reason reported by the backend for a non-success outcome
    pub failure_reason: Option<String>,

    /// Step results in the order the backend reported them
    pub steps: Vec<StepExecution>,

    pub started_at: Option<DateTime<Utc>>,

    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionDescription {
    /// First step that failed, if any
    pub fn failed_step(&self) -> Option<&StepExecution> {
        self.steps
            .iter()
            .find(|s| s.step_status == StepStatus::Failed)
    }

    /// Status of the named step, if the backend reported it
    pub fn step_status(&self, step_name: &str) -> Option<StepStatus> {
        self.steps
            .iter()
            .find(|s| s.step_name == step_name)
            .map(|s| s.step_status)
    }
}
