// ABOUTME: The Orchestrator runs one chat turn: plan, execute tools in order, consolidate, record history.
// ABOUTME: Tool failures are values; SQL failures get one refinement retry, optional-tool failures are absorbed.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use flightdeck_core::{
    Binding, ChatRequest, ChatResponse, ErrorKind, Plan, PlanError, PlanStep, SessionStore,
    ToolError, ToolInput, ToolInvocationRecord, ToolName, ToolOutcome, ToolOutput, Turn,
    TurnPhase, assemble_response, failure_response, fields,
};
use futures::FutureExt;
use serde_json::Value;
use ulid::Ulid;

use crate::planner::PlanningPolicy;
use crate::tools::ToolRegistry;

/// Orchestrator settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorConfig {
    /// Upper bound on any single tool invocation.
    pub tool_timeout: Duration,
    pub policy: PlanningPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tool_timeout: Duration::from_secs(30),
            policy: PlanningPolicy::default(),
        }
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The turn reached Done. Optional tools may still have failed.
    Completed,
    /// The request itself was invalid; no tool ran and nothing was recorded.
    Rejected(ToolError),
    /// The turn failed fatally in the given phase.
    Failed { phase: TurnPhase, error: ToolError },
}

/// The response for a turn together with how the turn ended.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub response: ChatResponse,
    pub outcome: TurnOutcome,
}

impl TurnReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, TurnOutcome::Completed)
    }
}

/// Mutable bookkeeping for a single turn.
struct TurnState {
    session_id: String,
    query: String,
    history: Value,
    phase: TurnPhase,
    records: Vec<ToolInvocationRecord>,
    outputs: Vec<Option<ToolOutput>>,
}

impl TurnState {
    fn advance(&mut self, next: TurnPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal turn transition {} -> {}",
            self.phase,
            next
        );
        tracing::info!(session_id = %self.session_id, from = %self.phase, to = %next, "turn phase");
        self.phase = next;
    }

    /// Substitute every binding of `step` with its current value. Bindings to
    /// outputs that do not exist (the producing step failed) are left unset,
    /// so the tool's own validation reports them.
    fn resolve(&self, step: &PlanStep) -> ToolInput {
        let mut input = ToolInput::new();
        for (param, binding) in &step.inputs {
            let value = match binding {
                Binding::Literal { value } => Some(value.clone()),
                Binding::UserQuery => Some(Value::String(self.query.clone())),
                Binding::History => Some(self.history.clone()),
                Binding::StepOutput { step, field } => self
                    .outputs
                    .get(*step)
                    .and_then(Option::as_ref)
                    .and_then(|output| output.get(field))
                    .cloned(),
            };
            if let Some(value) = value {
                input.insert(param.clone(), value);
            }
        }
        input
    }
}

/// The generate_sql step feeding an execute_sql step's query, if any.
fn generating_step(plan: &Plan, step: &PlanStep) -> Option<usize> {
    match step.inputs.get(fields::SQL_QUERY) {
        Some(Binding::StepOutput { step, field })
            if field == fields::SQL_QUERY
                && plan.steps.get(*step).map(|s| s.tool) == Some(ToolName::GenerateSql) =>
        {
            Some(*step)
        }
        _ => None,
    }
}

/// Execution failures the model can plausibly fix by rewriting the SQL.
fn is_refinable(error: &ToolError) -> bool {
    matches!(error.kind, ErrorKind::InvalidSql | ErrorKind::Validation)
}

fn plan_failure(err: PlanError) -> ToolError {
    let kind = match err {
        PlanError::ToolNotFound { .. } => ErrorKind::NotFound,
        _ => ErrorKind::Internal,
    };
    ToolError::new(kind, err.to_string())
}

/// Coordinates the registered tools for each chat turn. Holds no
/// per-session state; conversation history lives in the SessionStore the
/// caller passes in.
pub struct Orchestrator {
    registry: Arc<ToolRegistry>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(registry: Arc<ToolRegistry>, config: OrchestratorConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run one turn for `request` against the session it names (or a new
    /// one). Always returns a response carrying a session id.
    pub async fn handle(&self, sessions: &SessionStore, request: ChatRequest) -> TurnReport {
        let query = request.query.trim().to_string();
        if query.is_empty() {
            let session_id = request
                .session_id
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| Ulid::new().to_string());
            let error = ToolError::validation("query must not be empty");
            tracing::warn!(session_id = %session_id, "rejected empty query");
            return TurnReport {
                response: failure_response(&session_id, None, &[], &error.to_string()),
                outcome: TurnOutcome::Rejected(error),
            };
        }

        let (session_id, history) = sessions.get_or_create(request.session_id.as_deref()).await;
        let context: Vec<_> = history.iter().map(Turn::context_entry).collect();
        let mut state = TurnState {
            session_id,
            query,
            history: serde_json::to_value(&context).unwrap_or_else(|_| Value::Array(Vec::new())),
            phase: TurnPhase::Planning,
            records: Vec::new(),
            outputs: Vec::new(),
        };

        // Planning
        let plan = self.config.policy.plan(&state.query, &self.registry);
        if let Err(err) = plan.validate(&self.registry.list()) {
            return self.fail(state, Some(&plan), plan_failure(err));
        }
        tracing::info!(
            session_id = %state.session_id,
            steps = ?plan.tool_names(),
            skipped = plan.skipped.len(),
            history_turns = history.len(),
            "plan chosen"
        );
        state.outputs = vec![None; plan.steps.len()];
        state.advance(TurnPhase::Executing);

        // Executing
        let mut refined = false;
        for (index, step) in plan.steps.iter().enumerate() {
            let input = state.resolve(step);
            tracing::debug!(
                step = index,
                tool = %step.tool,
                params = ?input.keys().collect::<Vec<_>>(),
                "inputs resolved"
            );

            let error = match self.invoke(&mut state, index, step.tool, input, 1).await {
                Ok(output) => {
                    state.outputs[index] = Some(output);
                    continue;
                }
                Err(error) => error,
            };

            if step.tool == ToolName::ExecuteSql
                && !refined
                && is_refinable(&error)
                && let Some(generate) = generating_step(&plan, step)
            {
                refined = true;
                match self.refine(&mut state, &plan, generate, index, &error).await {
                    Ok(output) => {
                        state.outputs[index] = Some(output);
                        continue;
                    }
                    Err(error) => return self.fail(state, Some(&plan), error),
                }
            }

            if step.tool.is_essential() {
                return self.fail(state, Some(&plan), error);
            }

            tracing::warn!(
                session_id = %state.session_id,
                tool = %step.tool,
                kind = %error.kind,
                error = %error.message,
                "optional tool failed, continuing without it"
            );
        }

        // Consolidating
        state.advance(TurnPhase::Consolidating);
        let response = assemble_response(&state.session_id, &plan, &state.records);

        // Done
        state.advance(TurnPhase::Done);
        let turn = Turn::new(state.query, plan, state.records, response.clone());
        if let Err(err) = sessions.append(&state.session_id, turn).await {
            tracing::warn!(session_id = %state.session_id, error = %err, "turn not recorded");
        }

        TurnReport {
            response,
            outcome: TurnOutcome::Completed,
        }
    }

    /// Invoke one tool under the tool timeout, converting panics and
    /// timeouts into failures, and record the invocation.
    async fn invoke(
        &self,
        state: &mut TurnState,
        step: usize,
        tool: ToolName,
        input: ToolInput,
        attempt: u32,
    ) -> Result<ToolOutput, ToolError> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let result = match self.registry.get(tool) {
            Err(err) => Err(ToolError::new(ErrorKind::NotFound, err.to_string())),
            Ok(handle) => {
                let call = AssertUnwindSafe(handle.execute(input.clone())).catch_unwind();
                match tokio::time::timeout(self.config.tool_timeout, call).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => Err(ToolError::new(
                        ErrorKind::Internal,
                        format!("{} panicked", tool),
                    )),
                    Err(_) => Err(ToolError::new(
                        ErrorKind::Timeout,
                        format!(
                            "{} timed out after {}s",
                            tool,
                            self.config.tool_timeout.as_secs_f64()
                        ),
                    )),
                }
            }
        };

        let duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        let outcome = match &result {
            Ok(output) => ToolOutcome::Success {
                output: output.clone(),
            },
            Err(error) => ToolOutcome::Failure {
                error: error.clone(),
            },
        };
        tracing::debug!(
            step,
            tool = %tool,
            attempt,
            duration_ms,
            success = result.is_ok(),
            "tool invoked"
        );
        state.records.push(ToolInvocationRecord {
            step,
            tool,
            attempt,
            inputs: input,
            outcome,
            started_at,
            duration_ms,
        });

        result
    }

    /// Regenerate the SQL with the failed query and its error as extra
    /// context, then run the execute step once more.
    async fn refine(
        &self,
        state: &mut TurnState,
        plan: &Plan,
        generate: usize,
        execute: usize,
        error: &ToolError,
    ) -> Result<ToolOutput, ToolError> {
        let failed_sql = state.outputs[generate]
            .as_ref()
            .and_then(|output| output.get(fields::SQL_QUERY))
            .cloned();

        let mut input = state.resolve(&plan.steps[generate]);
        if let Some(sql) = failed_sql {
            input.insert(fields::PREVIOUS_SQL.to_string(), sql);
        }
        input.insert(
            fields::PREVIOUS_ERROR.to_string(),
            Value::String(error.message.clone()),
        );

        tracing::info!(
            session_id = %state.session_id,
            kind = %error.kind,
            error = %error.message,
            "refining SQL after execution failure"
        );

        let output = self
            .invoke(state, generate, ToolName::GenerateSql, input, 2)
            .await?;
        state.outputs[generate] = Some(output);

        let input = state.resolve(&plan.steps[execute]);
        self.invoke(state, execute, ToolName::ExecuteSql, input, 2)
            .await
    }

    fn fail(&self, mut state: TurnState, plan: Option<&Plan>, error: ToolError) -> TurnReport {
        let phase = state.phase;
        state.advance(TurnPhase::Failed);
        tracing::error!(
            session_id = %state.session_id,
            phase = %phase,
            kind = %error.kind,
            error = %error.message,
            "turn failed"
        );
        let response =
            failure_response(&state.session_id, plan, &state.records, &error.to_string());
        TurnReport {
            response,
            outcome: TurnOutcome::Failed { phase, error },
        }
    }
}
