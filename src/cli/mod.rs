//! Command-line interface

pub mod output;

use crate::core::PipelineConfig;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

/// Multi-letter flags accepted with a single leading dash
pub const LEGACY_FLAGS: [&str; 8] = ["s3_bucket", "pu", "tu", "pn", "rd", "pi", "ti", "prd"];

/// Launch a preprocessing + training pipeline and wait for it to finish
#[derive(Debug, Parser, Clone)]
#[command(name = "pipeline-launcher")]
#[command(version = "0.1.0")]
#[command(
    about = "Register a preprocessing + training pipeline, start it and wait for the result",
    long_about = None
)]
pub struct Cli {
    /// Storage bucket name
    #[arg(long = "s3_bucket", value_name = "BUCKET")]
    pub s3_bucket: Option<String>,

    /// Preprocessing script location
    #[arg(short = 'p', long = "processing-script", value_name = "URI")]
    pub processing_script: Option<String>,

    /// Shared utility code location
    #[arg(short = 'u', long = "utils", value_name = "URI")]
    pub utils: Option<String>,

    /// Role credential the pipeline runs under
    #[arg(short = 'r', long = "role-arn", value_name = "ARN")]
    pub role_arn: Option<String>,

    /// Preprocessing container image
    #[arg(long = "pu", visible_alias = "processing-image", value_name = "IMAGE")]
    pub processing_image: Option<String>,

    /// Training container image
    #[arg(long = "tu", visible_alias = "training-image", value_name = "IMAGE")]
    pub training_image: Option<String>,

    /// Pipeline name
    #[arg(long = "pn", visible_alias = "pipeline-name", value_name = "NAME")]
    pub pipeline_name: Option<String>,

    /// Raw input data location
    #[arg(long = "rd", visible_alias = "raw-data", value_name = "URI")]
    pub raw_data: Option<String>,

    /// Preprocessing instance type
    #[arg(long = "pi", visible_alias = "processing-instance", value_name = "TYPE")]
    pub processing_instance: Option<String>,

    /// Training instance type
    #[arg(long = "ti", visible_alias = "training-instance", value_name = "TYPE")]
    pub training_instance: Option<String>,

    /// Training data location
    #[arg(long = "prd", visible_alias = "training-data", value_name = "URI")]
    pub training_data: Option<String>,

    /// Feature set name
    #[arg(short = 'f', long = "feature", value_name = "NAME")]
    pub feature: Option<String>,

    /// Output model name
    #[arg(short = 'm', long = "model-name", value_name = "NAME")]
    pub model_name: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to launcher settings file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Orchestration API endpoint (overrides the settings file)
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Run against an in-process backend instead of the remote service
    #[arg(long)]
    pub dry_run: bool,

    /// Print the pipeline definition as JSON and exit
    #[arg(long)]
    pub print_definition: bool,
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse_from(normalize_legacy_flags(std::env::args_os()))
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(normalize_legacy_flags(itr))
    }

    /// Launch configuration built from the flags; absent flags become empty values
    pub fn pipeline_config(&self) -> PipelineConfig {
        let value = |v: &Option<String>| v.clone().unwrap_or_default();

        PipelineConfig {
            role_arn: value(&self.role_arn),
            bucket: value(&self.s3_bucket),
            processing_script: value(&self.processing_script),
            utils_location: value(&self.utils),
            processing_image: value(&self.processing_image),
            training_image: value(&self.training_image),
            pipeline_name: value(&self.pipeline_name),
            raw_data: value(&self.raw_data),
            processing_instance_type: value(&self.processing_instance),
            training_instance_type: value(&self.training_instance),
            training_data: value(&self.training_data),
            model_name: value(&self.model_name),
            feature_name: value(&self.feature),
        }
    }
}

/// Rewrite `-pu`, `-s3_bucket=x` and friends to their `--` form
///
/// Single-letter flags and everything after a bare `--` are left alone.
pub fn normalize_legacy_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let mut passthrough = false;

    args.into_iter()
        .map(Into::into)
        .map(|arg: OsString| {
            if passthrough {
                return arg;
            }
            if arg.as_os_str() == "--" {
                passthrough = true;
                return arg;
            }
            match arg.to_str() {
                Some(s) if is_legacy_flag(s) => OsString::from(format!("-{}", s)),
                _ => arg,
            }
        })
        .collect()
}

fn is_legacy_flag(arg: &str) -> bool {
    let Some(body) = arg.strip_prefix('-') else {
        return false;
    };
    if body.starts_with('-') {
        return false;
    }
    let name = body.split('=').next().unwrap_or(body);
    LEGACY_FLAGS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_args() -> Vec<&'static str> {
        vec![
            "pipeline-launcher",
            "-s3_bucket", "ml-bucket",
            "-p", "s3://ml-bucket/code/preprocess.py",
            "-u", "s3://ml-bucket/code/utils",
            "-r", "arn:aws:iam::123456789012:role/ml-runner",
            "-pu", "registry.example.com/preprocess:1",
            "-tu", "registry.example.com/train:1",
            "-pn", "churn-model",
            "-rd", "s3://ml-bucket/raw/",
            "-pi", "ml.m5.xlarge",
            "-ti", "ml.p3.2xlarge",
            "-prd", "s3://ml-bucket/train/",
            "-f", "v2",
            "-m", "churn",
        ]
    }

    #[test]
    fn test_normalize_legacy_flags() {
        let args = normalize_legacy_flags(["bin", "-pu", "img", "-p", "x", "-s3_bucket=b", "--", "-pn"]);
        assert_eq!(
            args,
            vec!["bin", "--pu", "img", "-p", "x", "--s3_bucket=b", "--", "-pn"]
        );
    }

    #[test]
    fn test_parse_legacy_surface() {
        let cli = Cli::try_parse_from(full_args()).unwrap();
        let config = cli.pipeline_config();

        assert_eq!(config.bucket, "ml-bucket");
        assert_eq!(config.processing_image, "registry.example.com/preprocess:1");
        assert_eq!(config.processing_script, "s3://ml-bucket/code/preprocess.py");
        assert_eq!(config.pipeline_name, "churn-model");
        assert_eq!(config.training_data, "s3://ml-bucket/train/");
        assert_eq!(config.feature_name, "v2");
        assert_eq!(config.model_name, "churn");
        assert!(config.validate().is_ok());
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_long_aliases() {
        let cli = Cli::try_parse_from([
            "pipeline-launcher",
            "--pipeline-name",
            "churn-model",
            "--training-instance",
            "ml.g5.xlarge",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.pipeline_name.as_deref(), Some("churn-model"));
        assert_eq!(cli.training_instance.as_deref(), Some("ml.g5.xlarge"));
        assert!(cli.dry_run);
    }

    #[test]
    fn test_missing_flags_become_empty_values() {
        let cli = Cli::try_parse_from(["pipeline-launcher", "-pn", "churn-model"]).unwrap();
        let config = cli.pipeline_config();
        assert_eq!(config.pipeline_name, "churn-model");
        assert!(config.bucket.is_empty());
        assert!(config.validate().is_err());
    }
}
