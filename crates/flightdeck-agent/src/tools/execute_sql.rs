// ABOUTME: execute_sql tool: runs one read-only statement against the flights database.
// ABOUTME: Distinguishes invalid SQL, timeouts and backend failures; zero rows is a success.

use async_trait::async_trait;
use flightdeck_core::{
    ErrorKind, ParamType, ToolError, ToolInput, ToolName, ToolOutput, ToolSchema, fields,
};
use flightdeck_store::{FlightsDb, QueryError};
use serde_json::Value;

use crate::tools::Tool;

/// Rows included in the summary handed to downstream tools.
const SUMMARY_SAMPLE_ROWS: usize = 5;

pub fn schema() -> ToolSchema {
    ToolSchema::new(
        ToolName::ExecuteSql,
        "Run a read-only SQL query against the NYC flights 2013 database",
    )
    .required(fields::SQL_QUERY, ParamType::String, "A single SELECT statement")
    .output(fields::ROWS, "Result records with uniform field names")
    .output(fields::ROW_COUNT, "Number of rows returned")
    .output(fields::TOTAL_ROWS, "Number of rows the query produced before the row cap")
    .output(fields::COLUMNS, "Column names with inferred kinds")
    .output(fields::SUMMARY, "Compact digest of the result for downstream tools")
}

pub struct ExecuteSqlTool {
    db: FlightsDb,
}

impl ExecuteSqlTool {
    pub fn new(db: FlightsDb) -> Self {
        Self { db }
    }
}

fn query_failure(err: QueryError) -> ToolError {
    let kind = match &err {
        QueryError::Rejected(_) => ErrorKind::Validation,
        QueryError::InvalidSql(_) => ErrorKind::InvalidSql,
        QueryError::Timeout(_) => ErrorKind::Timeout,
        QueryError::Backend(_) => ErrorKind::Backend,
    };
    ToolError::new(kind, err.to_string())
}

#[async_trait]
impl Tool for ExecuteSqlTool {
    fn schema(&self) -> ToolSchema {
        schema()
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
        schema().validate_input(&input)?;
        let sql = input
            .get(fields::SQL_QUERY)
            .and_then(Value::as_str)
            .unwrap_or_default();

        let result = self.db.query(sql).await.map_err(query_failure)?;
        tracing::debug!(
            row_count = result.row_count(),
            total_rows = result.total_rows,
            "query executed"
        );

        let mut output = ToolOutput::new();
        output.insert(fields::SUMMARY.to_string(), result.summary(SUMMARY_SAMPLE_ROWS));
        output.insert(fields::ROW_COUNT.to_string(), Value::from(result.row_count()));
        output.insert(fields::TOTAL_ROWS.to_string(), Value::from(result.total_rows));
        output.insert(
            fields::COLUMNS.to_string(),
            serde_json::to_value(&result.columns)
                .map_err(|e| ToolError::new(ErrorKind::Internal, e.to_string()))?,
        );
        output.insert(
            fields::ROWS.to_string(),
            Value::Array(result.rows.into_iter().map(Value::Object).collect()),
        );
        Ok(output)
    }
}
