//! Step domain model

use crate::core::{
    config::PipelineConfig,
    parameter::{ValueRef, PARAM_INPUT_DATA, PARAM_INSTANCE_COUNT, PARAM_INSTANCE_TYPE},
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};

/// Name of the preprocessing step
pub const PROCESSING_STEP_NAME: &str = "DataPreprocessing";

/// Name of the training step
pub const TRAINING_STEP_NAME: &str = "ModelTraining";

/// Container path raw data is mounted at during preprocessing
pub const PROCESSING_INPUT_PATH: &str = "/opt/ml/processing/input";

/// Container path the shared utility code is mounted at
pub const PROCESSING_UTILS_PATH: &str = "/opt/ml/processing/input/code/utils";

/// Container path the preprocessing script is mounted at
pub const PROCESSING_CODE_PATH: &str = "/opt/ml/processing/input/code";

/// Container path preprocessing writes its output to
pub const PROCESSING_OUTPUT_PATH: &str = "/opt/ml/processing/output";

/// Output channel produced by preprocessing
pub const PROCESSING_OUTPUT_NAME: &str = "train_data";

/// Input channel consumed by training
pub const TRAINING_CHANNEL: &str = "training";

const VOLUME_SIZE_GB: u32 = 30;
const MAX_TRAINING_RUNTIME_SECS: u64 = 86_400;

/// What kind of remote job a step runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Processing,
    Training,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Processing => "Processing",
            StepKind::Training => "Training",
        }
    }
}

/// A source location bound to a destination inside the job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBinding {
    pub name: String,
    pub source: ValueRef<String>,
    pub destination: String,
}

/// A named output written by a processing job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChannel {
    pub name: String,
    /// Path inside the container
    pub source: String,
    /// Where the backend uploads it
    pub destination: String,
}

/// Image and compute shape a step runs on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeSpec {
    pub image_uri: String,
    pub instance_type: ValueRef<String>,
    pub instance_count: ValueRef<i64>,
}

/// Kind-specific step settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepArguments {
    Processing {
        /// Location of the script the job runs
        code: String,
        inputs: Vec<InputBinding>,
        outputs: Vec<OutputChannel>,
        job_arguments: Vec<String>,
    },
    Training {
        inputs: Vec<InputBinding>,
        hyperparameters: BTreeMap<String, String>,
        output_path: String,
    },
}

/// A single step in a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Unique step name
    pub name: String,

    /// Role the job runs under
    pub role_arn: String,

    /// Image and compute shape
    pub compute: ComputeSpec,

    /// Names of steps that must succeed first
    pub dependencies: Vec<String>,

    pub arguments: StepArguments,
}

impl Step {
    /// Build the preprocessing step
    pub fn processing(config: &PipelineConfig) -> Self {
        let output_destination = format!(
            "s3://{}/{}/{}/output/{}",
            config.bucket_name(),
            config.pipeline_name,
            PROCESSING_STEP_NAME,
            PROCESSING_OUTPUT_NAME
        );

        Step {
            name: PROCESSING_STEP_NAME.to_string(),
            role_arn: config.role_arn.clone(),
            compute: ComputeSpec {
                image_uri: config.processing_image.clone(),
                instance_type: ValueRef::Literal(config.processing_instance_type.clone()),
                instance_count: ValueRef::Literal(1),
            },
            dependencies: vec![],
            arguments: StepArguments::Processing {
                code: config.processing_script.clone(),
                inputs: vec![
                    InputBinding {
                        name: "input-1".to_string(),
                        source: ValueRef::parameter(PARAM_INPUT_DATA),
                        destination: PROCESSING_INPUT_PATH.to_string(),
                    },
                    InputBinding {
                        name: "input-2".to_string(),
                        source: ValueRef::Literal(config.utils_location.clone()),
                        destination: PROCESSING_UTILS_PATH.to_string(),
                    },
                ],
                outputs: vec![OutputChannel {
                    name: PROCESSING_OUTPUT_NAME.to_string(),
                    source: PROCESSING_OUTPUT_PATH.to_string(),
                    destination: output_destination,
                }],
                job_arguments: vec!["--bucket_name".to_string(), config.bucket.clone()],
            },
        }
    }

    /// Build the training step, ordered after `upstream`
    pub fn training(config: &PipelineConfig, upstream: &Step) -> Self {
        let mut hyperparameters = BTreeMap::new();
        hyperparameters.insert("bucket".to_string(), config.bucket.clone());
        hyperparameters.insert("model_name".to_string(), config.model_name.clone());
        hyperparameters.insert("feature".to_string(), config.feature_name.clone());

        Step {
            name: TRAINING_STEP_NAME.to_string(),
            role_arn: config.role_arn.clone(),
            compute: ComputeSpec {
                image_uri: config.training_image.clone(),
                instance_type: ValueRef::parameter(PARAM_INSTANCE_TYPE),
                instance_count: ValueRef::parameter(PARAM_INSTANCE_COUNT),
            },
            dependencies: vec![upstream.name.clone()],
            arguments: StepArguments::Training {
                inputs: vec![InputBinding {
                    name: TRAINING_CHANNEL.to_string(),
                    source: ValueRef::Literal(config.training_data.clone()),
                    destination: format!("/opt/ml/input/data/{}", TRAINING_CHANNEL),
                }],
                hyperparameters,
                output_path: format!(
                    "s3://{}/{}/{}/output",
                    config.bucket_name(),
                    config.pipeline_name,
                    TRAINING_STEP_NAME
                ),
            },
        }
    }

    pub fn kind(&self) -> StepKind {
        match self.arguments {
            StepArguments::Processing { .. } => StepKind::Processing,
            StepArguments::Training { .. } => StepKind::Training,
        }
    }

    /// Input bindings in declaration order
    pub fn inputs(&self) -> &[InputBinding] {
        match &self.arguments {
            StepArguments::Processing { inputs, .. } => inputs,
            StepArguments::Training { inputs, .. } => inputs,
        }
    }

    /// Job arguments (processing steps only)
    pub fn job_arguments(&self) -> &[String] {
        match &self.arguments {
            StepArguments::Processing { job_arguments, .. } => job_arguments,
            StepArguments::Training { .. } => &[],
        }
    }

    /// Hyperparameters (training steps only)
    pub fn hyperparameters(&self) -> Option<&BTreeMap<String, String>> {
        match &self.arguments {
            StepArguments::Training { hyperparameters, .. } => Some(hyperparameters),
            StepArguments::Processing { .. } => None,
        }
    }

    /// Names of every parameter this step reads
    pub fn parameter_refs(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self
            .inputs()
            .iter()
            .filter_map(|input| input.source.parameter_name())
            .collect();
        refs.extend(self.compute.instance_type.parameter_name());
        refs.extend(self.compute.instance_count.parameter_name());
        refs
    }

    /// Check if all dependencies are in the given set of succeeded steps
    pub fn dependencies_met(&self, succeeded: &HashSet<String>) -> bool {
        self.dependencies.iter().all(|dep| succeeded.contains(dep))
    }

    /// Render the step in the backend's pipeline definition format
    pub fn to_definition(&self) -> Value {
        let arguments = match &self.arguments {
            StepArguments::Processing {
                code,
                inputs,
                outputs,
                job_arguments,
            } => {
                let script = code.rsplit('/').next().unwrap_or(code);
                let mut processing_inputs: Vec<Value> = inputs
                    .iter()
                    .map(|input| {
                        json!({
                            "InputName": input.name,
                            "AppManaged": false,
                            "S3Input": {
                                "S3Uri": input.source,
                                "LocalPath": input.destination,
                                "S3DataType": "S3Prefix",
                                "S3InputMode": "File",
                                "S3DataDistributionType": "FullyReplicated",
                                "S3CompressionType": "None",
                            }
                        })
                    })
                    .collect();
                processing_inputs.push(json!({
                    "InputName": "code",
                    "AppManaged": false,
                    "S3Input": {
                        "S3Uri": code,
                        "LocalPath": PROCESSING_CODE_PATH,
                        "S3DataType": "S3Prefix",
                        "S3InputMode": "File",
                        "S3DataDistributionType": "FullyReplicated",
                        "S3CompressionType": "None",
                    }
                }));

                let outputs: Vec<Value> = outputs
                    .iter()
                    .map(|output| {
                        json!({
                            "OutputName": output.name,
                            "AppManaged": false,
                            "S3Output": {
                                "S3Uri": output.destination,
                                "LocalPath": output.source,
                                "S3UploadMode": "EndOfJob",
                            }
                        })
                    })
                    .collect();

                json!({
                    "ProcessingResources": {
                        "ClusterConfig": {
                            "InstanceType": self.compute.instance_type,
                            "InstanceCount": self.compute.instance_count,
                            "VolumeSizeInGB": VOLUME_SIZE_GB,
                        }
                    },
                    "AppSpecification": {
                        "ImageUri": self.compute.image_uri,
                        "ContainerEntrypoint": [
                            "python3",
                            format!("{}/{}", PROCESSING_CODE_PATH, script),
                        ],
                        "ContainerArguments": job_arguments,
                    },
                    "RoleArn": self.role_arn,
                    "ProcessingInputs": processing_inputs,
                    "ProcessingOutputConfig": { "Outputs": outputs },
                })
            }
            StepArguments::Training {
                inputs,
                hyperparameters,
                output_path,
            } => {
                let channels: Vec<Value> = inputs
                    .iter()
                    .map(|input| {
                        json!({
                            "ChannelName": input.name,
                            "DataSource": {
                                "S3DataSource": {
                                    "S3DataType": "S3Prefix",
                                    "S3Uri": input.source,
                                    "S3DataDistributionType": "FullyReplicated",
                                }
                            }
                        })
                    })
                    .collect();

                json!({
                    "AlgorithmSpecification": {
                        "TrainingImage": self.compute.image_uri,
                        "TrainingInputMode": "File",
                    },
                    "OutputDataConfig": { "S3OutputPath": output_path },
                    "StoppingCondition": { "MaxRuntimeInSeconds": MAX_TRAINING_RUNTIME_SECS },
                    "ResourceConfig": {
                        "InstanceType": self.compute.instance_type,
                        "InstanceCount": self.compute.instance_count,
                        "VolumeSizeInGB": VOLUME_SIZE_GB,
                    },
                    "RoleArn": self.role_arn,
                    "InputDataConfig": channels,
                    "HyperParameters": hyperparameters,
                })
            }
        };

        let mut step = json!({
            "Name": self.name,
            "Type": self.kind().as_str(),
            "Arguments": arguments,
        });
        if !self.dependencies.is_empty() {
            step["DependsOn"] = json!(self.dependencies);
        }
        step
    }
}
