// ABOUTME: generate_sql tool: asks the language model to translate a question into one SQLite SELECT.
// ABOUTME: Prompts carry the dataset schema, prior turns, and on refinement the failed SQL and its error.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use flightdeck_core::{
    ContextEntry, ErrorKind, ParamType, ToolError, ToolInput, ToolName, ToolOutput, ToolSchema,
    fields,
};
use flightdeck_store::SCHEMA_CONTEXT;
use serde_json::Value;

use crate::llm::{CompletionRequest, LlmClient};
use crate::tools::Tool;

const SYSTEM_PROMPT: &str = "You are an expert data analyst who writes SQLite queries. \
Given a question about the NYC flights 2013 dataset, reply with exactly one SQL SELECT \
statement that answers it. Use only the tables and columns described. Do not explain, \
do not wrap the query in markdown.";

pub fn schema() -> ToolSchema {
    ToolSchema::new(
        ToolName::GenerateSql,
        "Translate a natural-language question about the flights dataset into a SQL query",
    )
    .required(
        fields::NATURAL_LANGUAGE_QUERY,
        ParamType::String,
        "The user's question",
    )
    .optional(
        fields::CONVERSATION_CONTEXT,
        ParamType::Array,
        "Prior turns of the conversation, oldest first",
    )
    .optional(
        fields::PREVIOUS_SQL,
        ParamType::String,
        "SQL from a failed attempt to refine",
    )
    .optional(
        fields::PREVIOUS_ERROR,
        ParamType::String,
        "Error the failed SQL produced",
    )
    .output(fields::SQL_QUERY, "A single SQLite SELECT statement")
}

/// Language-model backed SQL generator.
pub struct GenerateSqlTool {
    llm: Arc<dyn LlmClient>,
}

impl GenerateSqlTool {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

fn str_field<'a>(input: &'a ToolInput, name: &str) -> Option<&'a str> {
    input
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Render the user prompt for one generation attempt.
pub fn build_prompt(input: &ToolInput) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "{}", SCHEMA_CONTEXT);

    let history: Vec<ContextEntry> = input
        .get(fields::CONVERSATION_CONTEXT)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    if !history.is_empty() {
        let _ = writeln!(prompt, "Previous conversation:");
        for entry in &history {
            let _ = writeln!(prompt, "User: {}", entry.query);
            if let Some(sql) = &entry.sql_query {
                let _ = writeln!(prompt, "SQL generated: {}", sql);
            }
        }
        let _ = writeln!(prompt);
    }

    if let Some(previous_sql) = str_field(input, fields::PREVIOUS_SQL) {
        let _ = writeln!(prompt, "A previous attempt produced this SQL:\n{}", previous_sql);
        if let Some(error) = str_field(input, fields::PREVIOUS_ERROR) {
            let _ = writeln!(prompt, "It failed with: {}", error);
        }
        let _ = writeln!(prompt, "Write a corrected query.\n");
    }

    let question = str_field(input, fields::NATURAL_LANGUAGE_QUERY).unwrap_or_default();
    let _ = write!(prompt, "Question: {}\nSQL:", question);
    prompt
}

/// Strip markdown fences and a leading `sql` tag, then keep only the first
/// statement. Semicolons inside quoted literals do not end a statement.
pub fn clean_sql(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let end = after.find("```").unwrap_or(after.len());
        text = after[..end].trim();
    }

    if let Some(tag) = text.get(..3)
        && tag.eq_ignore_ascii_case("sql")
        && (text[3..].is_empty() || text[3..].starts_with(char::is_whitespace))
    {
        text = text[3..].trim_start();
    }

    let mut in_single = false;
    let mut in_double = false;
    let mut end = text.len();
    for (i, c) in text.char_indices() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            ';' if !in_single && !in_double => {
                end = i;
                break;
            }
            _ => {}
        }
    }

    text[..end].trim().to_string()
}

#[async_trait]
impl Tool for GenerateSqlTool {
    fn schema(&self) -> ToolSchema {
        schema()
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
        schema().validate_input(&input)?;

        let request =
            CompletionRequest::new(SYSTEM_PROMPT, build_prompt(&input)).with_max_tokens(512);
        let reply = self
            .llm
            .complete(&request)
            .await
            .map_err(|e| ToolError::new(ErrorKind::Generation, e.to_string()))?;

        let sql = clean_sql(&reply);
        if sql.is_empty() {
            return Err(ToolError::new(
                ErrorKind::Generation,
                "model returned no SQL",
            ));
        }

        tracing::debug!(model = self.llm.model_name(), sql = %sql, "sql generated");

        let mut output = ToolOutput::new();
        output.insert(fields::SQL_QUERY.to_string(), Value::String(sql));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlmClient;
    use serde_json::json;

    fn input(value: Value) -> ToolInput {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn clean_sql_strips_fences_and_tag() {
        let raw = "```sql\nSELECT carrier, COUNT(*) FROM flights GROUP BY carrier;\n```";
        assert_eq!(clean_sql(raw), "SELECT carrier, COUNT(*) FROM flights GROUP BY carrier");

        let raw = "SQL SELECT 1";
        assert_eq!(clean_sql(raw), "SELECT 1");
    }

    #[test]
    fn clean_sql_keeps_first_statement_only() {
        let raw = "SELECT name FROM airlines WHERE name = 'A;B'; DROP TABLE flights;";
        assert_eq!(clean_sql(raw), "SELECT name FROM airlines WHERE name = 'A;B'");
    }

    #[test]
    fn clean_sql_leaves_plain_sql_alone() {
        assert_eq!(clean_sql("  SELECT * FROM planes  "), "SELECT * FROM planes");
        assert_eq!(clean_sql("```\n```"), "");
        assert_eq!(clean_sql("```sql\n```"), "");
        assert_eq!(clean_sql("sql"), "");
        assert_eq!(clean_sql("sqlite_master"), "sqlite_master");
    }

    #[test]
    fn prompt_includes_schema_history_and_refinement() {
        let prompt = build_prompt(&input(json!({
            "natural_language_query": "and for Delta?",
            "conversation_context": [
                {
                    "query": "How many United flights?",
                    "sql_query": "SELECT COUNT(*) FROM flights WHERE carrier = 'UA'"
                }
            ],
            "previous_sql": "SELECT COUNT(*) FROM flight",
            "previous_error": "no such table: flight"
        })));

        assert!(prompt.contains("airlines"));
        assert!(prompt.contains("User: How many United flights?"));
        assert!(
            prompt.contains("SQL generated: SELECT COUNT(*) FROM flights WHERE carrier = 'UA'")
        );
        assert!(prompt.contains("no such table: flight"));
        assert!(prompt.ends_with("Question: and for Delta?\nSQL:"));
    }

    #[test]
    fn prompt_without_history_has_no_conversation_section() {
        let prompt = build_prompt(&input(json!({ "natural_language_query": "Top carriers" })));
        assert!(!prompt.contains("Previous conversation"));
        assert!(!prompt.contains("previous attempt"));
    }

    #[tokio::test]
    async fn execute_returns_cleaned_sql() {
        let llm = Arc::new(ScriptedLlmClient::new());
        llm.push_text("```sql\nSELECT COUNT(*) FROM flights;\n```");
        let tool = GenerateSqlTool::new(llm.clone());

        let output = tool
            .execute(input(json!({ "natural_language_query": "How many flights?" })))
            .await
            .unwrap();
        assert_eq!(output["sql_query"], "SELECT COUNT(*) FROM flights");

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].prompt.contains("How many flights?"));
    }

    #[tokio::test]
    async fn model_failure_is_generation_error() {
        let llm = Arc::new(ScriptedLlmClient::new());
        llm.push_error(crate::llm::LlmError::RateLimited);
        let tool = GenerateSqlTool::new(llm);

        let err = tool
            .execute(input(json!({ "natural_language_query": "How many flights?" })))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Generation);
    }

    #[tokio::test]
    async fn empty_reply_is_generation_error() {
        let llm = Arc::new(ScriptedLlmClient::new());
        llm.push_text("```sql\n```");
        let tool = GenerateSqlTool::new(llm);

        let err = tool
            .execute(input(json!({ "natural_language_query": "How many flights?" })))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Generation);
    }

    #[tokio::test]
    async fn blank_question_is_validation_error() {
        let tool = GenerateSqlTool::new(Arc::new(ScriptedLlmClient::new()));
        let err = tool
            .execute(input(json!({ "natural_language_query": "  " })))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
