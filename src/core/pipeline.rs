//! Pipeline domain model

use crate::core::{
    config::PipelineConfig,
    parameter::{
        ExecutionParameters, ParameterType, ParameterValue, PipelineParameter, PARAM_INPUT_DATA,
        PARAM_INSTANCE_COUNT, PARAM_INSTANCE_TYPE,
    },
    step::Step,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Pipeline definition format version understood by the backend
pub const DEFINITION_VERSION: &str = "2020-12-01";

/// Problems with a pipeline graph or its parameters found before any backend call
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("pipeline has no steps")]
    NoSteps,

    #[error("duplicate step name: {0}")]
    DuplicateStep(String),

    #[error("step '{step}' depends on non-existent step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("dependency cycle through step '{0}'")]
    Cycle(String),

    #[error("duplicate parameter name: {0}")]
    DuplicateParameter(String),

    #[error("'{0}' is not a declared pipeline parameter")]
    UnknownParameter(String),

    #[error("parameter '{name}' expects {expected}, got {actual}")]
    ParameterType {
        name: String,
        expected: ParameterType,
        actual: ParameterType,
    },
}

/// A pipeline definition: named graph of steps plus runtime parameters
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Role the pipeline is registered under
    pub role_arn: String,

    /// Runtime-overridable parameters
    pub parameters: Vec<PipelineParameter>,

    /// Steps in declaration order
    pub steps: Vec<Step>,

    /// Step names in dependency order
    execution_order: Vec<String>,
}

impl Pipeline {
    /// Build the preprocessing → training pipeline from a launch configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self, DefinitionError> {
        let processing = Step::processing(config);
        let training = Step::training(config, &processing);

        let parameters = vec![
            PipelineParameter::string(PARAM_INPUT_DATA, &config.raw_data),
            PipelineParameter::string(PARAM_INSTANCE_TYPE, &config.training_instance_type),
            PipelineParameter::integer(PARAM_INSTANCE_COUNT, 1),
        ];

        Self::new(
            config.pipeline_name.clone(),
            config.role_arn.clone(),
            parameters,
            vec![processing, training],
        )
    }

    /// Assemble and validate a pipeline from its parts
    pub fn new(
        name: String,
        role_arn: String,
        parameters: Vec<PipelineParameter>,
        steps: Vec<Step>,
    ) -> Result<Self, DefinitionError> {
        Self::validate(&parameters, &steps)?;
        let execution_order = Self::topological_sort(&steps)?;

        Ok(Pipeline {
            name,
            role_arn,
            parameters,
            steps,
            execution_order,
        })
    }

    fn validate(parameters: &[PipelineParameter], steps: &[Step]) -> Result<(), DefinitionError> {
        if steps.is_empty() {
            return Err(DefinitionError::NoSteps);
        }

        let mut seen = HashSet::new();
        for step in steps {
            if !seen.insert(step.name.as_str()) {
                return Err(DefinitionError::DuplicateStep(step.name.clone()));
            }
        }

        for step in steps {
            for dep in &step.dependencies {
                if !seen.contains(dep.as_str()) {
                    return Err(DefinitionError::UnknownDependency {
                        step: step.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        let mut declared = HashSet::new();
        for param in parameters {
            if !declared.insert(param.name.as_str()) {
                return Err(DefinitionError::DuplicateParameter(param.name.clone()));
            }
        }

        for step in steps {
            for name in step.parameter_refs() {
                if !declared.contains(name) {
                    return Err(DefinitionError::UnknownParameter(name.to_string()));
                }
            }
            Self::check_ref_type(parameters, step.compute.instance_count.parameter_name(), ParameterType::Integer)?;
            Self::check_ref_type(parameters, step.compute.instance_type.parameter_name(), ParameterType::String)?;
            for input in step.inputs() {
                Self::check_ref_type(parameters, input.source.parameter_name(), ParameterType::String)?;
            }
        }

        Ok(())
    }

    fn check_ref_type(
        parameters: &[PipelineParameter],
        name: Option<&str>,
        expected: ParameterType,
    ) -> Result<(), DefinitionError> {
        let Some(name) = name else {
            return Ok(());
        };
        match parameters.iter().find(|p| p.name == name) {
            Some(param) if param.param_type() != expected => Err(DefinitionError::ParameterType {
                name: name.to_string(),
                expected,
                actual: param.param_type(),
            }),
            Some(_) => Ok(()),
            None => Err(DefinitionError::UnknownParameter(name.to_string())),
        }
    }

    /// Calculate topological order of steps based on dependencies
    fn topological_sort(steps: &[Step]) -> Result<Vec<String>, DefinitionError> {
        let by_name: HashMap<&str, &Step> = steps.iter().map(|s| (s.name.as_str(), s)).collect();
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut in_progress = HashSet::new();

        for step in steps {
            Self::visit(&step.name, &by_name, &mut visited, &mut in_progress, &mut result)?;
        }

        Ok(result)
    }

    fn visit(
        name: &str,
        steps: &HashMap<&str, &Step>,
        visited: &mut HashSet<String>,
        in_progress: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) -> Result<(), DefinitionError> {
        if visited.contains(name) {
            return Ok(());
        }
        if !in_progress.insert(name.to_string()) {
            return Err(DefinitionError::Cycle(name.to_string()));
        }

        if let Some(step) = steps.get(name) {
            for dep in &step.dependencies {
                Self::visit(dep, steps, visited, in_progress, result)?;
            }
        }

        in_progress.remove(name);
        visited.insert(name.to_string());
        result.push(name.to_string());
        Ok(())
    }

    /// Get a step by name
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Get a parameter by name
    pub fn parameter(&self, name: &str) -> Option<&PipelineParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Step names in dependency order
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Runtime values a launch starts its execution with
    pub fn execution_parameters(config: &PipelineConfig) -> ExecutionParameters {
        ExecutionParameters::new()
            .with(PARAM_INPUT_DATA, config.raw_data.as_str())
            .with(PARAM_INSTANCE_TYPE, config.training_instance_type.as_str())
            .with(PARAM_INSTANCE_COUNT, 1)
    }

    /// Merge overrides onto parameter defaults, rejecting unknown or mistyped values
    pub fn resolve_parameters(
        &self,
        overrides: &ExecutionParameters,
    ) -> Result<BTreeMap<String, ParameterValue>, DefinitionError> {
        let mut resolved: BTreeMap<String, ParameterValue> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.default_value.clone()))
            .collect();

        for (name, value) in overrides.iter() {
            let param = self
                .parameter(name)
                .ok_or_else(|| DefinitionError::UnknownParameter(name.clone()))?;
            if param.param_type() != value.param_type() {
                return Err(DefinitionError::ParameterType {
                    name: name.clone(),
                    expected: param.param_type(),
                    actual: value.param_type(),
                });
            }
            resolved.insert(name.clone(), value.clone());
        }

        Ok(resolved)
    }

    /// Render the full definition document registered with the backend
    pub fn definition(&self) -> Value {
        let steps: Vec<Value> = self.steps.iter().map(Step::to_definition).collect();
        json!({
            "Version": DEFINITION_VERSION,
            "Metadata": {},
            "Parameters": self.parameters,
            "PipelineExperimentConfig": {
                "ExperimentName": { "Get": "Execution.PipelineName" },
                "TrialName": { "Get": "Execution.PipelineExecutionId" },
            },
            "Steps": steps,
        })
    }

    /// Definition document as a JSON string
    pub fn definition_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.definition())
    }
}
