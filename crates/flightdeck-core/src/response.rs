// ABOUTME: Wire request/response shapes for a chat turn and the pure assembler that builds responses.
// ABOUTME: Absent or failed optional tool outputs are omitted from the response, never emitted as nulls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::plan::{Plan, SkippedTool};
use crate::tool::{ToolName, fields};
use crate::turn::{ToolInvocationRecord, ToolOutcome};

/// Maximum number of follow-up questions surfaced to the caller.
pub const MAX_FOLLOW_UPS: usize = 3;

/// Incoming chat request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Per-tool outcome exposed for transparency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultEntry {
    pub tool: ToolName,
    pub result: Value,
}

/// The chosen plan and the tools it skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub steps: Vec<ToolName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedTool>,
}

impl From<&Plan> for PlanSummary {
    fn from(plan: &Plan) -> Self {
        Self {
            steps: plan.tool_names(),
            skipped: plan.skipped.clone(),
        }
    }
}

/// Externally visible response for one turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<ToolResultEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_questions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    /// An otherwise empty response bound to a session.
    pub fn for_session(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Last successful output field of the given tool, if any.
fn latest_field<'a>(
    records: &'a [ToolInvocationRecord],
    tool: ToolName,
    field: &str,
) -> Option<&'a Value> {
    records
        .iter()
        .rev()
        .filter(|r| r.tool == tool)
        .find_map(|r| r.field(field))
}

fn tool_results(records: &[ToolInvocationRecord]) -> Option<Vec<ToolResultEntry>> {
    if records.is_empty() {
        return None;
    }
    let entries = records
        .iter()
        .map(|record| ToolResultEntry {
            tool: record.tool,
            result: match &record.outcome {
                ToolOutcome::Success { output } => Value::Object(output.clone()),
                ToolOutcome::Failure { error } => serde_json::json!({
                    "error": error.message,
                    "kind": error.kind,
                }),
            },
        })
        .collect();
    Some(entries)
}

/// Build the response for a completed turn from its invocation records.
pub fn assemble_response(
    session_id: &str,
    plan: &Plan,
    records: &[ToolInvocationRecord],
) -> ChatResponse {
    let sql_query = latest_field(records, ToolName::GenerateSql, fields::SQL_QUERY)
        .and_then(Value::as_str)
        .map(str::to_string);

    let data = latest_field(records, ToolName::ExecuteSql, fields::ROWS)
        .and_then(Value::as_array)
        .cloned();

    let visualization = latest_field(records, ToolName::CreateVisualization, fields::VISUALIZATION)
        .filter(|v| !v.is_null())
        .cloned();

    let content = latest_field(records, ToolName::AnalyzeData, fields::ANALYSIS)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let follow_up_questions = latest_field(records, ToolName::SuggestFollowUps, fields::QUESTIONS)
        .and_then(Value::as_array)
        .map(|questions| {
            questions
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .take(MAX_FOLLOW_UPS)
                .collect::<Vec<_>>()
        })
        .filter(|q| !q.is_empty());

    ChatResponse {
        session_id: session_id.to_string(),
        content,
        sql_query,
        data,
        visualization,
        plan: Some(PlanSummary::from(plan)),
        tool_results: tool_results(records),
        follow_up_questions,
        error: None,
    }
}

/// Build the response for a turn that failed fatally. Only the error, the
/// SQL that was attempted (if any) and diagnostic tool results are surfaced.
pub fn failure_response(
    session_id: &str,
    plan: Option<&Plan>,
    records: &[ToolInvocationRecord],
    error: &str,
) -> ChatResponse {
    let sql_query = latest_field(records, ToolName::GenerateSql, fields::SQL_QUERY)
        .and_then(Value::as_str)
        .map(str::to_string);

    ChatResponse {
        session_id: session_id.to_string(),
        sql_query,
        plan: plan.map(PlanSummary::from),
        tool_results: tool_results(records),
        error: Some(error.to_string()),
        ..ChatResponse::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ErrorKind, ToolError, ToolInput};
    use chrono::Utc;
    use serde_json::json;

    fn success(step: usize, tool: ToolName, output: Value) -> ToolInvocationRecord {
        ToolInvocationRecord {
            step,
            tool,
            attempt: 1,
            inputs: ToolInput::new(),
            outcome: ToolOutcome::Success {
                output: output.as_object().cloned().unwrap_or_default(),
            },
            started_at: Utc::now(),
            duration_ms: 3,
        }
    }

    fn failure(step: usize, tool: ToolName, kind: ErrorKind) -> ToolInvocationRecord {
        ToolInvocationRecord {
            step,
            tool,
            attempt: 1,
            inputs: ToolInput::new(),
            outcome: ToolOutcome::Failure {
                error: ToolError::new(kind, "boom"),
            },
            started_at: Utc::now(),
            duration_ms: 3,
        }
    }

    fn sql_records(rows: Value) -> Vec<ToolInvocationRecord> {
        vec![
            success(
                0,
                ToolName::GenerateSql,
                json!({
                    "sql_query": "SELECT carrier, COUNT(*) AS n FROM flights GROUP BY carrier"
                }),
            ),
            success(1, ToolName::ExecuteSql, json!({ "rows": rows, "row_count": 2 })),
        ]
    }

    #[test]
    fn full_turn_fills_every_field() {
        let mut records = sql_records(json!([
            { "carrier": "UA", "n": 10 },
            { "carrier": "DL", "n": 8 }
        ]));
        records.push(success(
            2,
            ToolName::CreateVisualization,
            json!({ "visualization": { "data": [] }, "chart_type": "bar" }),
        ));
        records.push(success(3, ToolName::AnalyzeData, json!({ "analysis": "UA leads." })));
        records.push(success(
            4,
            ToolName::SuggestFollowUps,
            json!({ "questions": ["a?", "b?", "c?", "d?"] }),
        ));

        let resp = assemble_response("s1", &Plan::new(), &records);
        assert_eq!(resp.session_id, "s1");
        assert!(resp.sql_query.unwrap().contains("GROUP BY"));
        assert_eq!(resp.data.unwrap().len(), 2);
        assert!(resp.visualization.is_some());
        assert_eq!(resp.content.as_deref(), Some("UA leads."));
        assert_eq!(resp.follow_up_questions.unwrap().len(), MAX_FOLLOW_UPS);
        assert_eq!(resp.tool_results.unwrap().len(), 5);
        assert!(resp.error.is_none());
    }

    #[test]
    fn failed_optional_tools_are_omitted_not_nulled() {
        let mut records = sql_records(json!([{ "carrier": "UA", "n": 10 }]));
        records.push(failure(2, ToolName::CreateVisualization, ErrorKind::Visualization));
        records.push(failure(3, ToolName::SuggestFollowUps, ErrorKind::FollowUp));

        let resp = assemble_response("s1", &Plan::new(), &records);
        let json = serde_json::to_value(&resp).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("visualization"));
        assert!(!obj.contains_key("follow_up_questions"));
        assert!(!obj.contains_key("content"));
        assert!(!obj.contains_key("error"));
        assert!(obj.contains_key("data"));
    }

    #[test]
    fn empty_rows_still_produce_data_array() {
        let mut records = sql_records(json!([]));
        records.push(success(2, ToolName::CreateVisualization, json!({ "visualization": null })));

        let resp = assemble_response("s1", &Plan::new(), &records);
        assert_eq!(resp.data, Some(vec![]));
        assert!(resp.visualization.is_none());

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["data"], json!([]));
    }

    #[test]
    fn failed_tool_results_carry_error_kind() {
        let records = vec![failure(0, ToolName::GenerateSql, ErrorKind::Generation)];
        let resp = failure_response("s9", None, &records, "generation: boom");
        assert_eq!(resp.error.as_deref(), Some("generation: boom"));
        assert!(resp.sql_query.is_none());
        assert!(resp.data.is_none());
        let results = resp.tool_results.unwrap();
        assert_eq!(results[0].tool, ToolName::GenerateSql);
        assert_eq!(results[0].result["kind"], "generation");
    }

    #[test]
    fn failure_response_keeps_attempted_sql() {
        let records = vec![
            success(0, ToolName::GenerateSql, json!({ "sql_query": "SELEC 1" })),
            failure(1, ToolName::ExecuteSql, ErrorKind::InvalidSql),
        ];
        let resp = failure_response("s9", None, &records, "invalid_sql: boom");
        assert_eq!(resp.sql_query.as_deref(), Some("SELEC 1"));
        assert!(resp.visualization.is_none());
        assert!(resp.follow_up_questions.is_none());
    }

    #[test]
    fn chat_request_session_id_is_optional() {
        let req: ChatRequest = serde_json::from_value(json!({ "query": "hi" })).unwrap();
        assert!(req.session_id.is_none());
    }
}
