//! In-process backend (for testing and dry runs)

use crate::backend::{BackendError, ExecutionHandle, OrchestrationBackend, PipelineHandle};
use crate::core::{
    ExecutionDescription, ExecutionParameters, ExecutionStatus, Pipeline, StepExecution,
    StepStatus,
};
use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

fn pipeline_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9](-*[a-zA-Z0-9]){0,255}$").expect("pipeline name pattern")
    })
}

fn role_arn_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^arn:aws[a-z\-]*:iam::\d{12}:role/\S+$").expect("role ARN pattern")
    })
}

/// How simulated executions end
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExecutionOutcome {
    /// Every step succeeds
    #[default]
    Succeed,
    /// The named step fails; later steps never start
    FailAt { step: String, reason: String },
    /// The execution is stopped before its first step finishes
    Stop,
}

/// A call made against the backend, recorded in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Register { pipeline_name: String, role_arn: String },
    Start { pipeline_name: String, parameters: ExecutionParameters },
    Wait { execution_arn: String },
}

#[derive(Debug, Clone)]
struct RegisteredPipeline {
    arn: String,
    role_arn: String,
    definition: Value,
    parameter_names: HashSet<String>,
    execution_order: Vec<String>,
    version: u32,
}

#[derive(Debug, Clone)]
struct ExecutionRecord {
    pipeline_name: String,
    execution_order: Vec<String>,
    started_at: chrono::DateTime<Utc>,
}

/// Backend that keeps its catalog in memory and simulates executions
pub struct InMemoryBackend {
    pipelines: RwLock<HashMap<String, RegisteredPipeline>>,
    executions: RwLock<HashMap<String, ExecutionRecord>>,
    calls: RwLock<Vec<BackendCall>>,
    outcome: ExecutionOutcome,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            pipelines: RwLock::new(HashMap::new()),
            executions: RwLock::new(HashMap::new()),
            calls: RwLock::new(Vec::new()),
            outcome: ExecutionOutcome::Succeed,
        }
    }

    /// Set how every execution started on this backend ends
    pub fn with_outcome(mut self, outcome: ExecutionOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Every call made so far, oldest first
    pub async fn calls(&self) -> Vec<BackendCall> {
        self.calls.read().await.clone()
    }

    /// Names of all registered pipelines, sorted
    pub async fn pipeline_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pipelines.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered definition document for a pipeline
    pub async fn definition(&self, pipeline_name: &str) -> Option<Value> {
        self.pipelines
            .read()
            .await
            .get(pipeline_name)
            .map(|p| p.definition.clone())
    }

    /// Role a pipeline was last registered under
    pub async fn role_arn(&self, pipeline_name: &str) -> Option<String> {
        self.pipelines
            .read()
            .await
            .get(pipeline_name)
            .map(|p| p.role_arn.clone())
    }

    /// How many times a pipeline has been registered (1 after creation)
    pub async fn version(&self, pipeline_name: &str) -> Option<u32> {
        self.pipelines
            .read()
            .await
            .get(pipeline_name)
            .map(|p| p.version)
    }

    /// Number of executions started across all pipelines
    pub async fn execution_count(&self) -> usize {
        self.executions.read().await.len()
    }

    async fn record(&self, call: BackendCall) {
        self.calls.write().await.push(call);
    }

    fn simulate(&self, order: &[String]) -> (ExecutionStatus, Option<String>, Vec<StepExecution>) {
        let mut steps = Vec::new();

        for name in order {
            match &self.outcome {
                ExecutionOutcome::Stop => {
                    steps.push(StepExecution {
                        step_name: name.clone(),
                        step_status: StepStatus::Stopped,
                        failure_reason: None,
                    });
                    return (
                        ExecutionStatus::Stopped,
                        Some("execution stopped".to_string()),
                        steps,
                    );
                }
                ExecutionOutcome::FailAt { step, reason } if step == name => {
                    steps.push(StepExecution {
                        step_name: name.clone(),
                        step_status: StepStatus::Failed,
                        failure_reason: Some(reason.clone()),
                    });
                    return (
                        ExecutionStatus::Failed,
                        Some(format!("Step failure: {}", reason)),
                        steps,
                    );
                }
                _ => steps.push(StepExecution {
                    step_name: name.clone(),
                    step_status: StepStatus::Succeeded,
                    failure_reason: None,
                }),
            }
        }

        (ExecutionStatus::Succeeded, None, steps)
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrchestrationBackend for InMemoryBackend {
    async fn register(
        &self,
        pipeline: &Pipeline,
        role_arn: &str,
    ) -> Result<PipelineHandle, BackendError> {
        self.record(BackendCall::Register {
            pipeline_name: pipeline.name.clone(),
            role_arn: role_arn.to_string(),
        })
        .await;

        if !pipeline_name_pattern().is_match(&pipeline.name) {
            return Err(BackendError::InvalidDefinition(format!(
                "pipeline name '{}' is not valid",
                pipeline.name
            )));
        }
        if !role_arn_pattern().is_match(role_arn) {
            return Err(BackendError::Unauthorized(format!(
                "role '{}' cannot be assumed",
                role_arn
            )));
        }
        if let Some(step) = pipeline.steps.iter().find(|s| s.compute.image_uri.trim().is_empty()) {
            return Err(BackendError::InvalidDefinition(format!(
                "step '{}' has no image",
                step.name
            )));
        }

        let mut pipelines = self.pipelines.write().await;
        let version = pipelines.get(&pipeline.name).map_or(1, |p| p.version + 1);
        let arn = format!("arn:local:pipeline/{}", pipeline.name.to_lowercase());

        pipelines.insert(
            pipeline.name.clone(),
            RegisteredPipeline {
                arn: arn.clone(),
                role_arn: role_arn.to_string(),
                definition: pipeline.definition(),
                parameter_names: pipeline.parameters.iter().map(|p| p.name.clone()).collect(),
                execution_order: pipeline.execution_order().to_vec(),
                version,
            },
        );
        debug!("Registered {} (version {})", pipeline.name, version);

        Ok(PipelineHandle {
            pipeline_name: pipeline.name.clone(),
            pipeline_arn: arn,
        })
    }

    async fn start(
        &self,
        pipeline_name: &str,
        parameters: &ExecutionParameters,
    ) -> Result<ExecutionHandle, BackendError> {
        self.record(BackendCall::Start {
            pipeline_name: pipeline_name.to_string(),
            parameters: parameters.clone(),
        })
        .await;

        let pipelines = self.pipelines.read().await;
        let registered = pipelines
            .get(pipeline_name)
            .ok_or_else(|| BackendError::NotFound(format!("pipeline '{}'", pipeline_name)))?;

        if let Some((name, _)) = parameters
            .iter()
            .find(|(name, _)| !registered.parameter_names.contains(*name))
        {
            return Err(BackendError::InvalidDefinition(format!(
                "unknown parameter '{}'",
                name
            )));
        }

        let execution_arn = format!(
            "{}/execution/{}",
            registered.arn,
            Uuid::new_v4().simple()
        );
        self.executions.write().await.insert(
            execution_arn.clone(),
            ExecutionRecord {
                pipeline_name: pipeline_name.to_string(),
                execution_order: registered.execution_order.clone(),
                started_at: Utc::now(),
            },
        );

        Ok(ExecutionHandle {
            pipeline_name: pipeline_name.to_string(),
            execution_arn,
        })
    }

    async fn wait(&self, execution: &ExecutionHandle) -> Result<ExecutionDescription, BackendError> {
        self.record(BackendCall::Wait {
            execution_arn: execution.execution_arn.clone(),
        })
        .await;

        let record = self
            .executions
            .read()
            .await
            .get(&execution.execution_arn)
            .cloned()
            .ok_or_else(|| {
                BackendError::NotFound(format!("execution '{}'", execution.execution_arn))
            })?;

        let (status, failure_reason, steps) = self.simulate(&record.execution_order);

        Ok(ExecutionDescription {
            execution_arn: execution.execution_arn.clone(),
            pipeline_name: record.pipeline_name,
            status,
            failure_reason,
            steps,
            started_at: Some(record.started_at),
            completed_at: Some(Utc::now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PipelineConfig;

    fn pipeline(name: &str) -> Pipeline {
        let config = PipelineConfig {
            role_arn: "arn:aws:iam::123456789012:role/ml-runner".to_string(),
            bucket: "ml-bucket".to_string(),
            processing_script: "s3://ml-bucket/code/preprocess.py".to_string(),
            utils_location: "s3://ml-bucket/code/utils".to_string(),
            processing_image: "registry.example.com/preprocess:1".to_string(),
            training_image: "registry.example.com/train:1".to_string(),
            pipeline_name: name.to_string(),
            raw_data: "s3://ml-bucket/raw/".to_string(),
            processing_instance_type: "ml.m5.xlarge".to_string(),
            training_instance_type: "ml.p3.2xlarge".to_string(),
            training_data: "s3://ml-bucket/train/".to_string(),
            model_name: "churn".to_string(),
            feature_name: "v2".to_string(),
        };
        Pipeline::from_config(&config).unwrap()
    }

    const ROLE: &str = "arn:aws:iam::123456789012:role/ml-runner";

    #[tokio::test]
    async fn test_register_is_an_upsert() {
        let backend = InMemoryBackend::new();
        let p = pipeline("churn-model");

        backend.register(&p, ROLE).await.unwrap();
        backend.register(&p, ROLE).await.unwrap();
        backend.register(&pipeline("other"), ROLE).await.unwrap();

        assert_eq!(backend.pipeline_names().await, vec!["churn-model", "other"]);
        assert_eq!(backend.version("churn-model").await, Some(2));
        assert_eq!(backend.version("other").await, Some(1));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_role_and_name() {
        let backend = InMemoryBackend::new();

        let err = backend.register(&pipeline("ok"), "not-a-role").await.unwrap_err();
        assert!(matches!(err, BackendError::Unauthorized(_)));

        let err = backend.register(&pipeline("bad_name"), ROLE).await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidDefinition(_)));

        assert!(backend.pipeline_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_unknown_pipeline() {
        let backend = InMemoryBackend::new();
        let err = backend
            .start("missing", &ExecutionParameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
        assert_eq!(backend.execution_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_step_stops_the_execution() {
        let backend = InMemoryBackend::new().with_outcome(ExecutionOutcome::FailAt {
            step: "DataPreprocessing".to_string(),
            reason: "ClientError: no such key".to_string(),
        });
        let p = pipeline("churn-model");
        backend.register(&p, ROLE).await.unwrap();
        let handle = backend
            .start(&p.name, &ExecutionParameters::new())
            .await
            .unwrap();

        let description = backend.wait(&handle).await.unwrap();
        assert_eq!(description.status, ExecutionStatus::Failed);
        assert_eq!(description.steps.len(), 1);
        assert_eq!(
            description.failed_step().unwrap().step_name,
            "DataPreprocessing"
        );
        assert_eq!(description.step_status("ModelTraining"), None);
    }

    #[tokio::test]
    async fn test_successful_execution_runs_in_order() {
        let backend = InMemoryBackend::new();
        let p = pipeline("churn-model");
        backend.register(&p, ROLE).await.unwrap();
        let handle = backend
            .start(&p.name, &Pipeline::execution_parameters(&PipelineConfig {
                raw_data: "s3://x".to_string(),
                training_instance_type: "ml.m5.large".to_string(),
                ..Default::default()
            }))
            .await
            .unwrap();

        let description = backend.wait(&handle).await.unwrap();
        assert_eq!(description.status, ExecutionStatus::Succeeded);
        let names: Vec<&str> = description.steps.iter().map(|s| s.step_name.as_str()).collect();
        assert_eq!(names, vec!["DataPreprocessing", "ModelTraining"]);

        let calls = backend.calls().await;
        assert_eq!(calls.len(), 3);
        assert!(matches!(calls[2], BackendCall::Wait { .. }));
    }
}
