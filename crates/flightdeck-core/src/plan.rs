// ABOUTME: Plan types: an ordered list of tool steps whose inputs are bound to the query or earlier outputs.
// ABOUTME: Validation rejects unknown tools, unbound parameters, and references to steps that have not run yet.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::tool::{ToolName, ToolSchema};

/// Where a step's input value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Binding {
    /// A fixed value chosen at planning time.
    Literal { value: Value },
    /// The user's query text for this turn.
    UserQuery,
    /// Prior turns of the session, oldest first.
    History,
    /// A named output field of an earlier step in the same plan.
    StepOutput { step: usize, field: String },
}

impl Binding {
    pub fn literal(value: impl Into<Value>) -> Self {
        Binding::Literal {
            value: value.into(),
        }
    }

    pub fn output(step: usize, field: &str) -> Self {
        Binding::StepOutput {
            step,
            field: field.to_string(),
        }
    }
}

/// One tool invocation in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub tool: ToolName,
    pub inputs: BTreeMap<String, Binding>,
}

impl PlanStep {
    pub fn new(tool: ToolName) -> Self {
        Self {
            tool,
            inputs: BTreeMap::new(),
        }
    }

    /// Bind a named input parameter.
    pub fn bind(mut self, param: &str, binding: Binding) -> Self {
        self.inputs.insert(param.to_string(), binding);
        self
    }
}

/// A tool the planner deliberately left out, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTool {
    pub tool: ToolName,
    pub reason: String,
}

/// Errors found while validating a plan against the registered tool schemas.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("plan has no steps")]
    Empty,

    #[error("plan must include {0}")]
    MissingEssential(ToolName),

    #[error("step {step}: tool not found: {tool}")]
    ToolNotFound { step: usize, tool: ToolName },

    #[error("step {step}: {tool} has no parameter '{param}'")]
    UnknownParameter {
        step: usize,
        tool: ToolName,
        param: String,
    },

    #[error("step {step}: required parameter '{param}' of {tool} is not bound")]
    UnboundParameter {
        step: usize,
        tool: ToolName,
        param: String,
    },

    #[error("step {step}: references step {referenced}, which has not executed yet")]
    ForwardReference { step: usize, referenced: usize },

    #[error("step {step}: step {referenced} ({tool}) has no output field '{field}'")]
    UnknownField {
        step: usize,
        referenced: usize,
        tool: ToolName,
        field: String,
    },
}

/// Ordered, data-dependent sequence of tool invocations chosen for a turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    pub skipped: Vec<SkippedTool>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step and return its index, for use in later bindings.
    pub fn push(&mut self, step: PlanStep) -> usize {
        self.steps.push(step);
        self.steps.len() - 1
    }

    /// Record that a tool was left out of the plan.
    pub fn skip(&mut self, tool: ToolName, reason: impl Into<String>) {
        self.skipped.push(SkippedTool {
            tool,
            reason: reason.into(),
        });
    }

    pub fn tool_names(&self) -> Vec<ToolName> {
        self.steps.iter().map(|s| s.tool).collect()
    }

    pub fn contains(&self, tool: ToolName) -> bool {
        self.steps.iter().any(|s| s.tool == tool)
    }

    /// Validate the plan against the schemas of the registered tools.
    pub fn validate(&self, schemas: &[ToolSchema]) -> Result<(), PlanError> {
        if self.steps.is_empty() {
            return Err(PlanError::Empty);
        }
        for essential in [ToolName::GenerateSql, ToolName::ExecuteSql] {
            if !self.contains(essential) {
                return Err(PlanError::MissingEssential(essential));
            }
        }

        let schema_for = |tool: ToolName| schemas.iter().find(|s| s.name == tool);

        for (index, step) in self.steps.iter().enumerate() {
            let schema = schema_for(step.tool).ok_or(PlanError::ToolNotFound {
                step: index,
                tool: step.tool,
            })?;

            for param in step.inputs.keys() {
                if schema.input(param).is_none() {
                    return Err(PlanError::UnknownParameter {
                        step: index,
                        tool: step.tool,
                        param: param.clone(),
                    });
                }
            }

            for param in schema.inputs.iter().filter(|p| p.required) {
                if !step.inputs.contains_key(&param.name) {
                    return Err(PlanError::UnboundParameter {
                        step: index,
                        tool: step.tool,
                        param: param.name.clone(),
                    });
                }
            }

            for binding in step.inputs.values() {
                let Binding::StepOutput { step: referenced, field } = binding else {
                    continue;
                };
                if *referenced >= index {
                    return Err(PlanError::ForwardReference {
                        step: index,
                        referenced: *referenced,
                    });
                }
                let referenced_tool = self.steps[*referenced].tool;
                let known = schema_for(referenced_tool).is_some_and(|s| s.has_output(field));
                if !known {
                    return Err(PlanError::UnknownField {
                        step: index,
                        referenced: *referenced,
                        tool: referenced_tool,
                        field: field.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}
