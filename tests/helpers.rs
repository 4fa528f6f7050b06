//! Test utility functions for pipeline-launcher
#![allow(dead_code)]

use async_trait::async_trait;
use pipeline_launcher::backend::{
    BackendError, ExecutionHandle, InMemoryBackend, OrchestrationBackend, PipelineHandle,
};
use pipeline_launcher::core::{ExecutionDescription, ExecutionParameters, Pipeline, PipelineConfig};
use pipeline_launcher::execution::{LaunchError, Launcher};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A fully populated launch configuration
pub fn sample_config() -> PipelineConfig {
    PipelineConfig {
        role_arn: "arn:aws:iam::123456789012:role/ml-runner".to_string(),
        bucket: "ml-bucket".to_string(),
        processing_script: "s3://ml-bucket/code/preprocess.py".to_string(),
        utils_location: "s3://ml-bucket/code/utils".to_string(),
        processing_image: "123456789012.dkr.ecr.us-east-1.amazonaws.com/preprocess:latest".to_string(),
        training_image: "123456789012.dkr.ecr.us-east-1.amazonaws.com/train:latest".to_string(),
        pipeline_name: "churn-model".to_string(),
        raw_data: "s3://ml-bucket/raw/".to_string(),
        processing_instance_type: "ml.m5.xlarge".to_string(),
        training_instance_type: "ml.p3.2xlarge".to_string(),
        training_data: "s3://ml-bucket/processed/train/".to_string(),
        model_name: "churn".to_string(),
        feature_name: "customer_v2".to_string(),
    }
}

/// Backend wrapper that logs every phase and can inject failures
///
/// This is useful for:
/// - Asserting the register → start → wait ordering
/// - Checking that nothing is retried after an error
/// - Simulating a slow wait
pub struct RecordingBackend {
    inner: InMemoryBackend,
    log: Arc<Mutex<Vec<String>>>,
    register_error: Option<BackendError>,
    start_error: Option<BackendError>,
    wait_error: Option<BackendError>,
    wait_delay: Option<Duration>,
}

impl RecordingBackend {
    pub fn new(inner: InMemoryBackend) -> Self {
        Self {
            inner,
            log: Arc::new(Mutex::new(Vec::new())),
            register_error: None,
            start_error: None,
            wait_error: None,
            wait_delay: None,
        }
    }

    pub fn failing_register(mut self, error: BackendError) -> Self {
        self.register_error = Some(error);
        self
    }

    pub fn failing_start(mut self, error: BackendError) -> Self {
        self.start_error = Some(error);
        self
    }

    pub fn failing_wait(mut self, error: BackendError) -> Self {
        self.wait_error = Some(error);
        self
    }

    /// Add artificial delay before the wait returns
    pub fn with_wait_delay(mut self, delay: Duration) -> Self {
        self.wait_delay = Some(delay);
        self
    }

    /// Shared handle to the phase log
    pub fn log_handle(&self) -> Arc<Mutex<Vec<String>>> {
        self.log.clone()
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn inner(&self) -> &InMemoryBackend {
        &self.inner
    }

    fn push(&self, entry: &str) {
        self.log.lock().unwrap().push(entry.to_string());
    }
}

#[async_trait]
impl OrchestrationBackend for RecordingBackend {
    async fn register(
        &self,
        pipeline: &Pipeline,
        role_arn: &str,
    ) -> Result<PipelineHandle, BackendError> {
        self.push("register");
        if let Some(err) = &self.register_error {
            return Err(err.clone());
        }
        self.inner.register(pipeline, role_arn).await
    }

    async fn start(
        &self,
        pipeline_name: &str,
        parameters: &ExecutionParameters,
    ) -> Result<ExecutionHandle, BackendError> {
        self.push("start");
        if let Some(err) = &self.start_error {
            return Err(err.clone());
        }
        self.inner.start(pipeline_name, parameters).await
    }

    async fn wait(&self, execution: &ExecutionHandle) -> Result<ExecutionDescription, BackendError> {
        self.push("wait:begin");
        if let Some(delay) = self.wait_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.wait_error {
            self.push("wait:end");
            return Err(err.clone());
        }
        let result = self.inner.wait(execution).await;
        self.push("wait:end");
        result
    }
}

/// Launch a configuration against a backend
pub async fn launch<B: OrchestrationBackend>(
    backend: B,
    config: &PipelineConfig,
) -> (Launcher<B>, Result<ExecutionDescription, LaunchError>) {
    let launcher = Launcher::new(backend);
    let result = launcher.launch_and_wait(config).await;
    (launcher, result)
}

/// Assert a launch ended with the given kind of backend error
pub fn assert_backend_error(result: &Result<ExecutionDescription, LaunchError>, expected: &BackendError) {
    match result {
        Err(err) => assert_eq!(
            err.backend_error(),
            Some(expected),
            "Launch failed with an unexpected error: {}",
            err
        ),
        Ok(description) => panic!(
            "Launch should have failed, but succeeded: {:?}",
            description
        ),
    }
}
