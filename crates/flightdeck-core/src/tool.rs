// ABOUTME: Tool identity, declared input/output schemas, and the structured failure every tool returns.
// ABOUTME: Tools exchange named JSON fields so plan bindings can reference earlier outputs by name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Named parameters handed to a tool.
pub type ToolInput = Map<String, Value>;

/// Named fields produced by a successful tool invocation.
pub type ToolOutput = Map<String, Value>;

/// Field and parameter names shared between tools, the orchestrator and the
/// response assembler.
pub mod fields {
    pub const NATURAL_LANGUAGE_QUERY: &str = "natural_language_query";
    pub const CONVERSATION_CONTEXT: &str = "conversation_context";
    pub const PREVIOUS_SQL: &str = "previous_sql";
    pub const PREVIOUS_ERROR: &str = "previous_error";
    pub const SQL_QUERY: &str = "sql_query";
    pub const ROWS: &str = "rows";
    pub const ROW_COUNT: &str = "row_count";
    pub const TOTAL_ROWS: &str = "total_rows";
    pub const COLUMNS: &str = "columns";
    pub const SUMMARY: &str = "summary";
    pub const ROWS_SUMMARY: &str = "rows_summary";
    pub const VISUALIZATION: &str = "visualization";
    pub const CHART_TYPE: &str = "chart_type";
    pub const QUESTIONS: &str = "questions";
    pub const ANALYSIS: &str = "analysis";
}

/// The closed set of capabilities the orchestrator knows how to sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    GenerateSql,
    ExecuteSql,
    CreateVisualization,
    SuggestFollowUps,
    AnalyzeData,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::GenerateSql,
        ToolName::ExecuteSql,
        ToolName::CreateVisualization,
        ToolName::SuggestFollowUps,
        ToolName::AnalyzeData,
    ];

    /// Wire name of the tool.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::GenerateSql => "generate_sql",
            ToolName::ExecuteSql => "execute_sql",
            ToolName::CreateVisualization => "create_visualization",
            ToolName::SuggestFollowUps => "suggest_follow_ups",
            ToolName::AnalyzeData => "analyze_data",
        }
    }

    /// Whether a failure of this tool ends the turn. Everything else is
    /// absorbed and only drops the tool's contribution from the response.
    pub fn is_essential(&self) -> bool {
        matches!(self, ToolName::GenerateSql | ToolName::ExecuteSql)
    }

    /// The error kind a tool reports when its own work fails (as opposed to
    /// input validation or a timeout imposed from outside).
    pub fn failure_kind(&self) -> ErrorKind {
        match self {
            ToolName::GenerateSql => ErrorKind::Generation,
            ToolName::ExecuteSql => ErrorKind::Backend,
            ToolName::CreateVisualization => ErrorKind::Visualization,
            ToolName::SuggestFollowUps => ErrorKind::FollowUp,
            ToolName::AnalyzeData => ErrorKind::Analysis,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a tool name that is not part of the closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tool not found: {0}")]
pub struct UnknownToolName(pub String);

impl FromStr for ToolName {
    type Err = UnknownToolName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownToolName(s.to_string()))
    }
}

/// JSON type a parameter must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    Array,
    Object,
    Any,
}

impl ParamType {
    /// Returns true if the value has this JSON type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
            ParamType::Any => true,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
            ParamType::Any => "any",
        }
    }
}

/// A declared input parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    pub description: String,
}

/// A declared output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub description: String,
}

/// Declared contract of a tool: its name, inputs and outputs. Used for plan
/// validation and exposed to callers as capability metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: ToolName,
    pub description: String,
    pub inputs: Vec<ParamSpec>,
    pub outputs: Vec<FieldSpec>,
}

impl ToolSchema {
    pub fn new(name: ToolName, description: &str) -> Self {
        Self {
            name,
            description: description.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Declare a required input parameter.
    pub fn required(mut self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.inputs.push(ParamSpec {
            name: name.to_string(),
            param_type,
            required: true,
            description: description.to_string(),
        });
        self
    }

    /// Declare an optional input parameter.
    pub fn optional(mut self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.inputs.push(ParamSpec {
            name: name.to_string(),
            param_type,
            required: false,
            description: description.to_string(),
        });
        self
    }

    /// Declare an output field.
    pub fn output(mut self, name: &str, description: &str) -> Self {
        self.outputs.push(FieldSpec {
            name: name.to_string(),
            description: description.to_string(),
        });
        self
    }

    pub fn input(&self, name: &str) -> Option<&ParamSpec> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|f| f.name == name)
    }

    /// Check that every required parameter is present and that every present
    /// parameter has its declared type. Required strings must not be blank.
    /// Optional parameters may be null.
    pub fn validate_input(&self, input: &ToolInput) -> Result<(), ToolError> {
        for param in &self.inputs {
            match input.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(ToolError::validation(format!(
                        "{}: missing required parameter '{}'",
                        self.name, param.name
                    )));
                }
                None | Some(Value::Null) => {}
                Some(value) if !param.param_type.matches(value) => {
                    return Err(ToolError::validation(format!(
                        "{}: parameter '{}' must be of type {}",
                        self.name,
                        param.name,
                        param.param_type.label()
                    )));
                }
                Some(Value::String(s)) if param.required && s.trim().is_empty() => {
                    return Err(ToolError::validation(format!(
                        "{}: parameter '{}' must not be empty",
                        self.name, param.name
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Machine-readable failure category carried by every tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Generation,
    InvalidSql,
    Timeout,
    Backend,
    Visualization,
    Analysis,
    FollowUp,
    NotFound,
    Session,
    /// The tool panicked; the orchestrator caught it.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Generation => "generation",
            ErrorKind::InvalidSql => "invalid_sql",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Backend => "backend",
            ErrorKind::Visualization => "visualization",
            ErrorKind::Analysis => "analysis",
            ErrorKind::FollowUp => "follow_up",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Session => "session",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured tool failure. Tools return this as data instead of panicking
/// or surfacing opaque errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }
}
