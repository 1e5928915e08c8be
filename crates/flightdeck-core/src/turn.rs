// ABOUTME: Turn and ToolInvocationRecord types capturing one query, its tool calls, and its response.
// ABOUTME: Also defines TurnPhase, the per-turn state machine the orchestrator walks through.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Ulid;

use crate::plan::Plan;
use crate::response::ChatResponse;
use crate::tool::{ToolError, ToolInput, ToolName, ToolOutput, fields};

/// Phases a turn moves through. `Failed` is reachable from the first three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Planning,
    Executing,
    Consolidating,
    Done,
    Failed,
}

impl TurnPhase {
    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: TurnPhase) -> bool {
        matches!(
            (self, next),
            (TurnPhase::Planning, TurnPhase::Executing)
                | (TurnPhase::Executing, TurnPhase::Consolidating)
                | (TurnPhase::Consolidating, TurnPhase::Done)
                | (TurnPhase::Planning, TurnPhase::Failed)
                | (TurnPhase::Executing, TurnPhase::Failed)
                | (TurnPhase::Consolidating, TurnPhase::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnPhase::Done | TurnPhase::Failed)
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TurnPhase::Planning => "planning",
            TurnPhase::Executing => "executing",
            TurnPhase::Consolidating => "consolidating",
            TurnPhase::Done => "done",
            TurnPhase::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Result of a single tool invocation, stored as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { output: ToolOutput },
    Failure { error: ToolError },
}

/// Immutable record of one tool invocation within a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    /// Index of the plan step this invocation served.
    pub step: usize,
    pub tool: ToolName,
    /// 1 for the first call of a step, 2 for a refinement retry.
    pub attempt: u32,
    pub inputs: ToolInput,
    pub outcome: ToolOutcome,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ToolInvocationRecord {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success { .. })
    }

    pub fn output(&self) -> Option<&ToolOutput> {
        match &self.outcome {
            ToolOutcome::Success { output } => Some(output),
            ToolOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ToolError> {
        match &self.outcome {
            ToolOutcome::Success { .. } => None,
            ToolOutcome::Failure { error } => Some(error),
        }
    }

    /// Look up a named field of a successful output.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.output().and_then(|o| o.get(name))
    }
}

/// Condensed form of a prior turn handed to the SQL generator as context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub query: String,
    pub sql_query: Option<String>,
}

/// One user query and its fully assembled response within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub turn_id: Ulid,
    pub query: String,
    pub plan: Plan,
    pub records: Vec<ToolInvocationRecord>,
    pub response: ChatResponse,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(
        query: String,
        plan: Plan,
        records: Vec<ToolInvocationRecord>,
        response: ChatResponse,
    ) -> Self {
        Self {
            turn_id: Ulid::new(),
            query,
            plan,
            records,
            response,
            timestamp: Utc::now(),
        }
    }

    /// The SQL this turn finally ran, taken from the last successful
    /// generate_sql invocation.
    pub fn final_sql(&self) -> Option<&str> {
        self.records
            .iter()
            .rev()
            .filter(|r| r.tool == ToolName::GenerateSql)
            .find_map(|r| r.field(fields::SQL_QUERY).and_then(|v| v.as_str()))
    }

    pub fn context_entry(&self) -> ContextEntry {
        ContextEntry {
            query: self.query.clone(),
            sql_query: self.final_sql().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ErrorKind;
    use serde_json::json;

    fn record(tool: ToolName, attempt: u32, outcome: ToolOutcome) -> ToolInvocationRecord {
        ToolInvocationRecord {
            step: 0,
            tool,
            attempt,
            inputs: ToolInput::new(),
            outcome,
            started_at: Utc::now(),
            duration_ms: 1,
        }
    }

    fn sql_output(sql: &str) -> ToolOutcome {
        ToolOutcome::Success {
            output: json!({ "sql_query": sql }).as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn phase_transitions_follow_the_state_machine() {
        assert!(TurnPhase::Planning.can_transition_to(TurnPhase::Executing));
        assert!(TurnPhase::Executing.can_transition_to(TurnPhase::Consolidating));
        assert!(TurnPhase::Consolidating.can_transition_to(TurnPhase::Done));
        assert!(TurnPhase::Executing.can_transition_to(TurnPhase::Failed));
        assert!(!TurnPhase::Planning.can_transition_to(TurnPhase::Done));
        assert!(!TurnPhase::Done.can_transition_to(TurnPhase::Failed));
        assert!(!TurnPhase::Failed.can_transition_to(TurnPhase::Planning));
        assert!(TurnPhase::Failed.is_terminal());
    }

    #[test]
    fn final_sql_prefers_latest_successful_generation() {
        let records = vec![
            record(ToolName::GenerateSql, 1, sql_output("SELECT bad")),
            record(
                ToolName::ExecuteSql,
                1,
                ToolOutcome::Failure {
                    error: ToolError::new(ErrorKind::InvalidSql, "no such column: bad"),
                },
            ),
            record(ToolName::GenerateSql, 2, sql_output("SELECT carrier FROM airlines")),
        ];
        let turn = Turn::new(
            "carriers".to_string(),
            Plan::new(),
            records,
            ChatResponse::for_session("s1"),
        );

        assert_eq!(turn.final_sql(), Some("SELECT carrier FROM airlines"));
        let entry = turn.context_entry();
        assert_eq!(entry.query, "carriers");
        assert_eq!(entry.sql_query.as_deref(), Some("SELECT carrier FROM airlines"));
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let failure = ToolOutcome::Failure {
            error: ToolError::new(ErrorKind::Timeout, "took too long"),
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["error"]["kind"], "timeout");
    }
}
