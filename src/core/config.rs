//! Launch configuration assembled from the command line

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating a launch configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required value for {field} (flag {flag})")]
    MissingField {
        field: &'static str,
        flag: &'static str,
    },
}

/// Everything needed to define and start one pipeline run
///
/// All values are opaque to the launcher. The only check performed locally is
/// that each of them is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Role credential the backend assumes for both steps
    pub role_arn: String,

    /// Storage bucket passed to both steps
    pub bucket: String,

    /// Location of the preprocessing script
    pub processing_script: String,

    /// Location of the shared utility code
    pub utils_location: String,

    /// Container image for preprocessing
    pub processing_image: String,

    /// Container image for training
    pub training_image: String,

    /// Name the pipeline is registered under
    pub pipeline_name: String,

    /// Raw input data location
    pub raw_data: String,

    /// Compute instance type for preprocessing
    pub processing_instance_type: String,

    /// Compute instance type for training
    pub training_instance_type: String,

    /// Training data location
    pub training_data: String,

    /// Name of the model produced by training
    pub model_name: String,

    /// Feature set used by training
    pub feature_name: String,
}

impl PipelineConfig {
    /// Field name, CLI flag and value for every required entry
    fn required_fields(&self) -> [(&'static str, &'static str, &str); 13] {
        [
            ("role_arn", "-r", &self.role_arn),
            ("bucket", "-s3_bucket", &self.bucket),
            ("processing_script", "-p", &self.processing_script),
            ("utils_location", "-u", &self.utils_location),
            ("processing_image", "-pu", &self.processing_image),
            ("training_image", "-tu", &self.training_image),
            ("pipeline_name", "-pn", &self.pipeline_name),
            ("raw_data", "-rd", &self.raw_data),
            ("processing_instance_type", "-pi", &self.processing_instance_type),
            ("training_instance_type", "-ti", &self.training_instance_type),
            ("training_data", "-prd", &self.training_data),
            ("model_name", "-m", &self.model_name),
            ("feature_name", "-f", &self.feature_name),
        ]
    }

    /// Check that every required value is present
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, flag, value) in self.required_fields() {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField { field, flag });
            }
        }
        Ok(())
    }

    /// Names of every field that is missing, in flag order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.required_fields()
            .iter()
            .filter(|(_, _, value)| value.trim().is_empty())
            .map(|(field, _, _)| *field)
            .collect()
    }

    /// Bucket name without any `s3://` prefix or trailing slash
    pub fn bucket_name(&self) -> &str {
        self.bucket
            .trim()
            .trim_start_matches("s3://")
            .trim_end_matches('/')
    }
}
