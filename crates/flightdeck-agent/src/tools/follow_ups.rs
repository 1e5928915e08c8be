// ABOUTME: suggest_follow_ups tool: asks the language model for follow-up questions about a result.
// ABOUTME: Extracts a JSON array from the reply, keeps string entries, and caps the list.

use std::sync::Arc;

use async_trait::async_trait;
use flightdeck_core::{
    ErrorKind, MAX_FOLLOW_UPS, ParamType, ToolError, ToolInput, ToolName, ToolOutput, ToolSchema,
    fields,
};
use serde_json::Value;

use crate::llm::{CompletionRequest, LlmClient};
use crate::tools::Tool;

const SYSTEM_PROMPT: &str = "You suggest follow-up questions for people exploring the NYC \
flights 2013 dataset (flights, airlines, airports, planes, weather). Reply with a JSON array \
of question strings and nothing else.";

pub fn schema() -> ToolSchema {
    ToolSchema::new(
        ToolName::SuggestFollowUps,
        "Suggest follow-up questions the user could ask next",
    )
    .required(
        fields::NATURAL_LANGUAGE_QUERY,
        ParamType::String,
        "The question just answered",
    )
    .optional(
        fields::ROWS_SUMMARY,
        ParamType::Any,
        "Digest of the result the question produced",
    )
    .output(fields::QUESTIONS, "Up to three follow-up questions")
}

pub struct SuggestFollowUpsTool {
    llm: Arc<dyn LlmClient>,
    count: usize,
}

impl SuggestFollowUpsTool {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            count: MAX_FOLLOW_UPS,
        }
    }

    /// Override how many questions are requested and kept.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count.max(1);
        self
    }

    fn build_prompt(&self, input: &ToolInput) -> String {
        let query = input
            .get(fields::NATURAL_LANGUAGE_QUERY)
            .and_then(Value::as_str)
            .unwrap_or_default();
        let summary = match input.get(fields::ROWS_SUMMARY) {
            Some(Value::Null) | None => "(no result summary available)".to_string(),
            Some(summary) => summary.to_string(),
        };
        format!(
            "User query: {query}\n\nResult summary: {summary}\n\n\
             Generate {count} follow-up questions that deepen the analysis, explore a related \
             aspect, or offer a comparison. Each must be answerable with SQL on this data and \
             different from the user query. If the result was empty, suggest broader questions.",
            count = self.count
        )
    }
}

/// Pull a list of questions out of a model reply that should contain a JSON
/// array, possibly surrounded by prose or markdown fences.
pub fn parse_questions(reply: &str, limit: usize) -> Result<Vec<String>, ToolError> {
    let unparseable = || {
        ToolError::new(
            ErrorKind::FollowUp,
            "model reply did not contain a JSON array of questions",
        )
    };

    let start = reply.find('[').ok_or_else(unparseable)?;
    let end = reply.rfind(']').ok_or_else(unparseable)?;
    if end < start {
        return Err(unparseable());
    }
    let items: Vec<Value> = serde_json::from_str(&reply[start..=end]).map_err(|_| unparseable())?;

    Ok(items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| {
            if q.ends_with('?') {
                q.to_string()
            } else {
                format!("{}?", q.trim_end_matches('.'))
            }
        })
        .take(limit)
        .collect())
}

#[async_trait]
impl Tool for SuggestFollowUpsTool {
    fn schema(&self) -> ToolSchema {
        schema()
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
        schema().validate_input(&input)?;

        let request = CompletionRequest::new(SYSTEM_PROMPT, self.build_prompt(&input))
            .with_max_tokens(400)
            .with_temperature(0.7);
        let reply = self
            .llm
            .complete(&request)
            .await
            .map_err(|e| ToolError::new(ErrorKind::FollowUp, e.to_string()))?;

        let questions = parse_questions(&reply, self.count)?;

        let mut output = ToolOutput::new();
        output.insert(
            fields::QUESTIONS.to_string(),
            Value::Array(questions.into_iter().map(Value::String).collect()),
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlmClient;
    use serde_json::json;

    #[test]
    fn parses_plain_array() {
        let questions =
            parse_questions(r#"["Which month is busiest?", "What about Delta?"]"#, 3).unwrap();
        assert_eq!(questions, vec!["Which month is busiest?", "What about Delta?"]);
    }

    #[test]
    fn parses_array_wrapped_in_prose_and_fences() {
        let reply = "Here you go:\n```json\n\
                     [\"How do delays vary by hour\", 42, \"Which airport is busiest?\"]\n```";
        let questions = parse_questions(reply, 3).unwrap();
        assert_eq!(
            questions,
            vec!["How do delays vary by hour?", "Which airport is busiest?"]
        );
    }

    #[test]
    fn truncates_to_limit() {
        let questions = parse_questions(r#"["a?", "b?", "c?", "d?", "e?"]"#, 3).unwrap();
        assert_eq!(questions.len(), 3);
    }

    #[test]
    fn unparseable_reply_is_follow_up_error() {
        let err = parse_questions("I cannot think of any questions.", 3).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FollowUp);

        let err = parse_questions("] backwards [", 3).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FollowUp);
    }

    #[tokio::test]
    async fn execute_runs_for_empty_results() {
        let llm = Arc::new(ScriptedLlmClient::new());
        llm.push_text(r#"["What about all of 2013?"]"#);
        let tool = SuggestFollowUpsTool::new(llm.clone());

        let input = json!({
            "natural_language_query": "Flights on 2014-01-01",
            "rows_summary": { "row_count": 0, "sample": [] }
        });
        let output = tool.execute(input.as_object().cloned().unwrap()).await.unwrap();
        assert_eq!(output["questions"], json!(["What about all of 2013?"]));
        assert!(llm.prompts()[0].prompt.contains("\"row_count\":0"));
    }

    #[tokio::test]
    async fn model_failure_is_follow_up_error() {
        let llm = Arc::new(ScriptedLlmClient::new());
        llm.push_error(crate::llm::LlmError::Provider("Server error: 500".to_string()));
        let tool = SuggestFollowUpsTool::new(llm).with_count(2);

        let input = json!({ "natural_language_query": "Top carriers" });
        let err = tool.execute(input.as_object().cloned().unwrap()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::FollowUp);
    }
}
