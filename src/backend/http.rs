//! HTTP/JSON client for a remote orchestration service

use crate::backend::{
    BackendClientConfig, BackendError, ExecutionHandle, OrchestrationBackend, PipelineHandle,
    WaitPolicy,
};
use crate::core::{
    ExecutionDescription, ExecutionParameters, ExecutionStatus, ParameterOverride, Pipeline,
    StepExecution,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RegisterRequest<'a> {
    role_arn: &'a str,
    /// The definition document, JSON-encoded as a string
    pipeline_definition: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RegisterResponse {
    pipeline_arn: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartRequest {
    pipeline_parameters: Vec<ParameterOverride>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StartResponse {
    pipeline_execution_arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeResponse {
    pipeline_execution_status: ExecutionStatus,
    #[serde(default)]
    failure_reason: Option<String>,
    #[serde(default)]
    pipeline_name: Option<String>,
    #[serde(default)]
    steps: Vec<StepExecution>,
    #[serde(default)]
    creation_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    last_modified_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// Backend reached over HTTP with JSON bodies
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
    wait: WaitPolicy,
}

impl HttpBackend {
    /// Create a client from configuration; an endpoint is required
    pub fn new(config: BackendClientConfig) -> Result<Self, BackendError> {
        let endpoint = config.endpoint.ok_or_else(|| {
            BackendError::Configuration(
                "no orchestration endpoint configured (use --endpoint or the settings file)"
                    .to_string(),
            )
        })?;
        let base = Url::parse(&endpoint).map_err(|e| {
            BackendError::Configuration(format!("invalid endpoint '{}': {}", endpoint, e))
        })?;
        if base.cannot_be_a_base() {
            return Err(BackendError::Configuration(format!(
                "endpoint '{}' cannot be used as a base URL",
                endpoint
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base,
            wait: config.wait,
        })
    }

    /// Base URL requests are sent to
    pub fn endpoint(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Protocol(e.to_string()))
    }

    /// Fetch the current state of an execution
    pub async fn describe(
        &self,
        execution: &ExecutionHandle,
    ) -> Result<ExecutionDescription, BackendError> {
        let url = self.url(&["executions", execution.execution_arn.as_str()]);
        let response: DescribeResponse = self.send(self.client.get(url)).await?;

        Ok(ExecutionDescription {
            execution_arn: execution.execution_arn.clone(),
            pipeline_name: response
                .pipeline_name
                .unwrap_or_else(|| execution.pipeline_name.clone()),
            status: response.pipeline_execution_status,
            failure_reason: response.failure_reason,
            steps: response.steps,
            started_at: response.creation_time,
            completed_at: response.last_modified_time,
        })
    }
}

/// Map a non-success HTTP status onto a backend error
pub fn status_error(status: StatusCode, body: String) -> BackendError {
    let detail = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body.trim())
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized(detail),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            BackendError::InvalidDefinition(detail)
        }
        StatusCode::NOT_FOUND => BackendError::NotFound(detail),
        StatusCode::TOO_MANY_REQUESTS => BackendError::Unavailable(detail),
        s if s.is_server_error() => BackendError::Unavailable(detail),
        _ => BackendError::Protocol(detail),
    }
}

#[async_trait]
impl OrchestrationBackend for HttpBackend {
    async fn register(
        &self,
        pipeline: &Pipeline,
        role_arn: &str,
    ) -> Result<PipelineHandle, BackendError> {
        let body = RegisterRequest {
            role_arn,
            pipeline_definition: pipeline
                .definition_json()
                .map_err(|e| BackendError::Protocol(e.to_string()))?,
        };
        let url = self.url(&["pipelines", pipeline.name.as_str()]);
        debug!("PUT {}", url);

        let response: RegisterResponse = self.send(self.client.put(url).json(&body)).await?;

        Ok(PipelineHandle {
            pipeline_name: pipeline.name.clone(),
            pipeline_arn: response.pipeline_arn,
        })
    }

    async fn start(
        &self,
        pipeline_name: &str,
        parameters: &ExecutionParameters,
    ) -> Result<ExecutionHandle, BackendError> {
        let body = StartRequest {
            pipeline_parameters: parameters.to_overrides(),
        };
        let url = self.url(&["pipelines", pipeline_name, "executions"]);
        debug!("POST {}", url);

        let response: StartResponse = self.send(self.client.post(url).json(&body)).await?;

        Ok(ExecutionHandle {
            pipeline_name: pipeline_name.to_string(),
            execution_arn: response.pipeline_execution_arn,
        })
    }

    async fn wait(&self, execution: &ExecutionHandle) -> Result<ExecutionDescription, BackendError> {
        let delay = Duration::from_secs(self.wait.delay_secs);
        let mut attempts: u32 = 0;

        loop {
            let description = self.describe(execution).await?;
            attempts += 1;
            debug!(
                "Execution {} is {} (check {})",
                execution.execution_arn, description.status, attempts
            );

            if description.status.is_terminal() {
                info!(
                    "Execution {} finished with status {}",
                    execution.execution_arn, description.status
                );
                return Ok(description);
            }

            if self.wait.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(BackendError::WaitTimeout { attempts });
            }

            tokio::time::sleep(delay).await;
        }
    }
}
