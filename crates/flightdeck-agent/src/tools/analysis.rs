// ABOUTME: analyze_data tool: asks the language model for a short narrative about a query result.
// ABOUTME: Empty results are a no-op; an empty narrative is an analysis failure.

use std::sync::Arc;

use async_trait::async_trait;
use flightdeck_core::{
    ErrorKind, ParamType, ToolError, ToolInput, ToolName, ToolOutput, ToolSchema, fields,
};
use serde_json::Value;

use crate::llm::{CompletionRequest, LlmClient};
use crate::tools::Tool;

const SYSTEM_PROMPT: &str = "You are a data analyst. Given a question about NYC flights in 2013 \
and the data that answers it, write two to four plain sentences summarising what the data \
shows. Mention concrete numbers. Do not invent values that are not in the data.";

/// Rows passed to the model when no summary is bound.
const SAMPLE_ROWS: usize = 10;

pub fn schema() -> ToolSchema {
    ToolSchema::new(
        ToolName::AnalyzeData,
        "Write a short natural-language analysis of a query result",
    )
    .required(fields::ROWS, ParamType::Array, "Result records to analyse")
    .required(
        fields::NATURAL_LANGUAGE_QUERY,
        ParamType::String,
        "The question the rows answer",
    )
    .optional(fields::ROWS_SUMMARY, ParamType::Any, "Digest of the result")
    .output(fields::ANALYSIS, "Narrative, or null when there was nothing to analyse")
}

pub struct AnalyzeDataTool {
    llm: Arc<dyn LlmClient>,
}

impl AnalyzeDataTool {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Tool for AnalyzeDataTool {
    fn schema(&self) -> ToolSchema {
        schema()
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
        schema().validate_input(&input)?;

        let mut output = ToolOutput::new();
        let rows = input
            .get(fields::ROWS)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if rows.is_empty() {
            output.insert(fields::ANALYSIS.to_string(), Value::Null);
            return Ok(output);
        }

        let query = input
            .get(fields::NATURAL_LANGUAGE_QUERY)
            .and_then(Value::as_str)
            .unwrap_or_default();
        let data = match input.get(fields::ROWS_SUMMARY) {
            Some(summary) if !summary.is_null() => summary.to_string(),
            _ => Value::Array(rows.iter().take(SAMPLE_ROWS).cloned().collect()).to_string(),
        };

        let prompt = format!("Question: {}\n\nData: {}\n\nAnalysis:", query, data);
        let request = CompletionRequest::new(SYSTEM_PROMPT, prompt)
            .with_max_tokens(400)
            .with_temperature(0.3);
        let reply = self
            .llm
            .complete(&request)
            .await
            .map_err(|e| ToolError::new(ErrorKind::Analysis, e.to_string()))?;

        let narrative = reply.trim();
        if narrative.is_empty() {
            return Err(ToolError::new(
                ErrorKind::Analysis,
                "model returned an empty analysis",
            ));
        }

        output.insert(
            fields::ANALYSIS.to_string(),
            Value::String(narrative.to_string()),
        );
        Ok(output)
    }
}
