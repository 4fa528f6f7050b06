//! Pipeline launcher - registers the pipeline, starts it and waits for the result

use crate::{
    backend::{BackendError, OrchestrationBackend},
    core::{
        ConfigError, DefinitionError, ExecutionDescription, ExecutionStatus, Pipeline,
        PipelineConfig,
    },
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that end a launch
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("invalid launch configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid pipeline definition: {0}")]
    Definition(#[from] DefinitionError),

    #[error("failed to register pipeline '{pipeline}': {source}")]
    Register {
        pipeline: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to start pipeline '{pipeline}': {source}")]
    Start {
        pipeline: String,
        #[source]
        source: BackendError,
    },

    #[error("failed while waiting for execution {execution_arn}: {source}")]
    Wait {
        execution_arn: String,
        #[source]
        source: BackendError,
    },

    #[error("execution {execution_arn} ended with status {status}{}", failure_detail(.failed_step, .reason))]
    ExecutionFailed {
        execution_arn: String,
        status: ExecutionStatus,
        failed_step: Option<String>,
        reason: Option<String>,
    },
}

fn failure_detail(failed_step: &Option<String>, reason: &Option<String>) -> String {
    match (failed_step, reason) {
        (Some(step), Some(reason)) => format!(" (step {}: {})", step, reason),
        (Some(step), None) => format!(" (step {})", step),
        (None, Some(reason)) => format!(" ({})", reason),
        (None, None) => String::new(),
    }
}

impl LaunchError {
    /// The backend error behind this failure, if any
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            LaunchError::Register { source, .. }
            | LaunchError::Start { source, .. }
            | LaunchError::Wait { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Validate the configuration and build the pipeline without contacting a backend
pub fn prepare_pipeline(config: &PipelineConfig) -> Result<Pipeline, LaunchError> {
    config.validate()?;
    let pipeline = Pipeline::from_config(config)?;
    pipeline.resolve_parameters(&Pipeline::execution_parameters(config))?;
    Ok(pipeline)
}

/// Events emitted while a launch progresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchEvent {
    DefinitionBuilt {
        pipeline_name: String,
        steps: Vec<String>,
    },
    PipelineRegistered {
        pipeline_name: String,
        pipeline_arn: String,
    },
    ExecutionStarted {
        execution_arn: String,
    },
    WaitingForCompletion {
        execution_arn: String,
    },
    ExecutionFinished {
        execution_arn: String,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&LaunchEvent) + Send + Sync>;

/// Launches the preprocessing → training pipeline on a backend
pub struct Launcher<B> {
    backend: B,
    event_handlers: Vec<EventHandler>,
}

impl<B: OrchestrationBackend> Launcher<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            event_handlers: Vec::new(),
        }
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&LaunchEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn emit(&self, event: LaunchEvent) {
        for handler in &self.event_handlers {
            handler(&event);
        }
    }

    /// Register the pipeline, start an execution and block until it finishes
    ///
    /// Returns the terminal description when the execution succeeded. Any
    /// other terminal status is an error; nothing is retried.
    pub async fn launch_and_wait(
        &self,
        config: &PipelineConfig,
    ) -> Result<ExecutionDescription, LaunchError> {
        let pipeline = prepare_pipeline(config)?;
        self.emit(LaunchEvent::DefinitionBuilt {
            pipeline_name: pipeline.name.clone(),
            steps: pipeline.execution_order().to_vec(),
        });

        info!("Registering pipeline {}", pipeline.name);
        let registered = self
            .backend
            .register(&pipeline, &config.role_arn)
            .await
            .map_err(|source| LaunchError::Register {
                pipeline: pipeline.name.clone(),
                source,
            })?;
        debug!("Pipeline registered as {}", registered.pipeline_arn);
        self.emit(LaunchEvent::PipelineRegistered {
            pipeline_name: registered.pipeline_name.clone(),
            pipeline_arn: registered.pipeline_arn.clone(),
        });

        let parameters = Pipeline::execution_parameters(config);
        let execution = self
            .backend
            .start(&pipeline.name, &parameters)
            .await
            .map_err(|source| LaunchError::Start {
                pipeline: pipeline.name.clone(),
                source,
            })?;
        info!("Started execution {}", execution.execution_arn);
        self.emit(LaunchEvent::ExecutionStarted {
            execution_arn: execution.execution_arn.clone(),
        });

        self.emit(LaunchEvent::WaitingForCompletion {
            execution_arn: execution.execution_arn.clone(),
        });
        let description = self
            .backend
            .wait(&execution)
            .await
            .map_err(|source| LaunchError::Wait {
                execution_arn: execution.execution_arn.clone(),
                source,
            })?;
        self.emit(LaunchEvent::ExecutionFinished {
            execution_arn: execution.execution_arn.clone(),
            status: description.status,
        });

        if description.status.is_success() {
            info!("Execution {} succeeded", execution.execution_arn);
            return Ok(description);
        }

        let failed = description.failed_step();
        warn!(
            "Execution {} ended with status {}",
            execution.execution_arn, description.status
        );
        Err(LaunchError::ExecutionFailed {
            execution_arn: execution.execution_arn,
            status: description.status,
            failed_step: failed.map(|s| s.step_name.clone()),
            reason: failed
                .and_then(|s| s.failure_reason.clone())
                .or(description.failure_reason.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ExecutionOutcome, InMemoryBackend};
    use std::sync::Mutex;

    fn config() -> PipelineConfig {
        PipelineConfig {
            role_arn: "arn:aws:iam::123456789012:role/ml-runner".to_string(),
            bucket: "ml-bucket".to_string(),
            processing_script: "s3://ml-bucket/code/preprocess.py".to_string(),
            utils_location: "s3://ml-bucket/code/utils".to_string(),
            processing_image: "registry.example.com/preprocess:1".to_string(),
            training_image: "registry.example.com/train:1".to_string(),
            pipeline_name: "churn-model".to_string(),
            raw_data: "s3://ml-bucket/raw/".to_string(),
            processing_instance_type: "ml.m5.xlarge".to_string(),
            training_instance_type: "ml.p3.2xlarge".to_string(),
            training_data: "s3://ml-bucket/train/".to_string(),
            model_name: "churn".to_string(),
            feature_name: "v2".to_string(),
        }
    }

    #[tokio::test]
    async fn test_events_follow_launch_phases() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let launcher = Launcher::new(InMemoryBackend::new()).with_event_handler(move |event| {
            let label = match event {
                LaunchEvent::DefinitionBuilt { .. } => "built",
                LaunchEvent::PipelineRegistered { .. } => "registered",
                LaunchEvent::ExecutionStarted { .. } => "started",
                LaunchEvent::WaitingForCompletion { .. } => "waiting",
                LaunchEvent::ExecutionFinished { .. } => "finished",
            };
            sink.lock().unwrap().push(label);
        });

        launcher.launch_and_wait(&config()).await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["built", "registered", "started", "waiting", "finished"]
        );
    }

    #[tokio::test]
    async fn test_failure_reports_step_and_reason() {
        let backend = InMemoryBackend::new().with_outcome(ExecutionOutcome::FailAt {
            step: "ModelTraining".to_string(),
            reason: "AlgorithmError: exit 1".to_string(),
        });
        let launcher = Launcher::new(backend);

        let err = launcher.launch_and_wait(&config()).await.unwrap_err();
        match &err {
            LaunchError::ExecutionFailed {
                status,
                failed_step,
                reason,
                ..
            } => {
                assert_eq!(*status, ExecutionStatus::Failed);
                assert_eq!(failed_step.as_deref(), Some("ModelTraining"));
                assert_eq!(reason.as_deref(), Some("AlgorithmError: exit 1"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().contains("step ModelTraining"));
        assert!(err.backend_error().is_none());
    }

    #[tokio::test]
    async fn test_stopped_execution_is_a_failure() {
        let launcher = Launcher::new(InMemoryBackend::new().with_outcome(ExecutionOutcome::Stop));
        let err = launcher.launch_and_wait(&config()).await.unwrap_err();
        assert!(matches!(
            err,
            LaunchError::ExecutionFailed {
                status: ExecutionStatus::Stopped,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_register_rejection_is_wrapped() {
        let mut config = config();
        config.role_arn = "someone-else".to_string();
        let launcher = Launcher::new(InMemoryBackend::new());

        let err = launcher.launch_and_wait(&config).await.unwrap_err();
        assert!(matches!(err, LaunchError::Register { .. }));
        assert!(matches!(
            err.backend_error(),
            Some(BackendError::Unauthorized(_))
        ));
        assert_eq!(launcher.backend().execution_count().await, 0);
    }

    #[test]
    fn test_prepare_pipeline_rejects_missing_fields() {
        let mut config = config();
        config.training_image.clear();
        let err = prepare_pipeline(&config).unwrap_err();
        assert!(matches!(err, LaunchError::Config(_)));
        assert!(err.to_string().contains("-tu"));
    }
}
