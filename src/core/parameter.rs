//! Runtime pipeline parameters and references to them

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Raw input data location, overridable per execution
pub const PARAM_INPUT_DATA: &str = "InputData";

/// Training instance type, overridable per execution
pub const PARAM_INSTANCE_TYPE: &str = "InstanceType";

/// Training instance count, overridable per execution
pub const PARAM_INSTANCE_COUNT: &str = "InstanceCount";

/// Declared type of a pipeline parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterType {
    String,
    Integer,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterType::String => write!(f, "String"),
            ParameterType::Integer => write!(f, "Integer"),
        }
    }
}

/// A concrete parameter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Integer(i64),
    String(String),
}

impl ParameterValue {
    pub fn param_type(&self) -> ParameterType {
        match self {
            ParameterValue::String(_) => ParameterType::String,
            ParameterValue::Integer(_) => ParameterType::Integer,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::String(s) => write!(f, "{}", s),
            ParameterValue::Integer(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::String(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::String(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Integer(value)
    }
}

/// A named runtime parameter declared on the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineParameter {
    pub name: String,
    pub default_value: ParameterValue,
}

impl PipelineParameter {
    pub fn string(name: &str, default_value: &str) -> Self {
        Self {
            name: name.to_string(),
            default_value: ParameterValue::String(default_value.to_string()),
        }
    }

    pub fn integer(name: &str, default_value: i64) -> Self {
        Self {
            name: name.to_string(),
            default_value: ParameterValue::Integer(default_value),
        }
    }

    pub fn param_type(&self) -> ParameterType {
        self.default_value.param_type()
    }
}

impl Serialize for PipelineParameter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("Name", &self.name)?;
        map.serialize_entry("Type", &self.param_type())?;
        map.serialize_entry("DefaultValue", &self.default_value)?;
        map.end()
    }
}

/// A step field that is either fixed in the definition or bound to a parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueRef<T> {
    Literal(T),
    Parameter(String),
}

impl<T> ValueRef<T> {
    pub fn parameter(name: &str) -> Self {
        ValueRef::Parameter(name.to_string())
    }

    /// Name of the referenced parameter, if any
    pub fn parameter_name(&self) -> Option<&str> {
        match self {
            ValueRef::Parameter(name) => Some(name),
            ValueRef::Literal(_) => None,
        }
    }
}

impl<T: Serialize> Serialize for ValueRef<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ValueRef::Literal(value) => value.serialize(serializer),
            ValueRef::Parameter(name) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Get", &format!("Parameters.{}", name))?;
                map.end()
            }
        }
    }
}

/// Concrete values supplied when an execution is started
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionParameters {
    values: BTreeMap<String, ParameterValue>,
}

/// Wire form of one execution parameter; values always travel as strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParameterOverride {
    pub name: String,
    pub value: String,
}

impl ExecutionParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<ParameterValue>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_overrides(&self) -> Vec<ParameterOverride> {
        self.values
            .iter()
            .map(|(name, value)| ParameterOverride {
                name: name.clone(),
                value: value.to_string(),
            })
            .collect()
    }
}
