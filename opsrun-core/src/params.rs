//! Pre-execution checking of caller parameters against declared definitions
//!
//! Script storage declares a parameter schema alongside each script; the
//! orchestrating layer runs this check before building an execution request.
//! The binder itself does not enforce definitions - by the time a parameter
//! map reaches it, the map is assumed to have been checked here.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::validator::ValidationResult;

/// Declared type of one script parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    #[default]
    String,
    Int,
    Bool,
    /// Structured or otherwise untyped; no type check applies.
    Other,
}

impl<'de> Deserialize<'de> for ParameterType {
    // Unrecognized declared types fall back to `other`, matching the
    // original service which only type-checked string/int/bool.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "string" => Self::String,
            "int" => Self::Int,
            "bool" => Self::Bool,
            _ => Self::Other,
        })
    }
}

/// One parameter declaration supplied by the script-storage collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,

    #[serde(rename = "type", default)]
    pub param_type: ParameterType,

    #[serde(default)]
    pub required: bool,

    /// Optional regex a string value must match, anchored at the start.
    #[serde(default)]
    pub pattern: Option<String>,
}

/// Check a parameter map against its declared definitions.
///
/// Reports missing required parameters, type mismatches, and pattern
/// mismatches. Undeclared parameters pass through unchecked; the binder's
/// name sanitization is the defense there.
pub fn validate_parameters(
    parameters: &Map<String, Value>,
    definitions: &[ParameterDefinition],
) -> ValidationResult {
    let mut issues = Vec::new();

    for definition in definitions {
        let Some(value) = parameters.get(&definition.name) else {
            if definition.required {
                issues.push(format!(
                    "Required parameter '{}' is missing",
                    definition.name
                ));
            }
            continue;
        };

        match definition.param_type {
            ParameterType::String => {
                if !value.is_string() {
                    issues.push(format!("Parameter '{}' must be a string", definition.name));
                }
            }
            ParameterType::Int => {
                if !value.is_i64() && !value.is_u64() {
                    issues.push(format!(
                        "Parameter '{}' must be an integer",
                        definition.name
                    ));
                }
            }
            ParameterType::Bool => {
                if !value.is_boolean() {
                    issues.push(format!("Parameter '{}' must be a boolean", definition.name));
                }
            }
            ParameterType::Other => {}
        }

        if let (Some(pattern), Some(text)) = (&definition.pattern, value.as_str()) {
            // Anchored at the start only, preserving the original service's
            // match semantics.
            match Regex::new(&format!("^(?:{pattern})")) {
                Ok(regex) => {
                    if !regex.is_match(text) {
                        issues.push(format!(
                            "Parameter '{}' does not match required pattern",
                            definition.name
                        ));
                    }
                }
                Err(_) => {
                    issues.push(format!(
                        "Parameter '{}' has an invalid pattern",
                        definition.name
                    ));
                }
            }
        }
    }

    ValidationResult::from_issues(issues)
}
