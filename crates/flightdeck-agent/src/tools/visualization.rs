// ABOUTME: create_visualization tool: picks a chart for a result set and emits a Plotly figure.
// ABOUTME: Returns a no-op (null visualization) when the data shape is not chartable.

use async_trait::async_trait;
use flightdeck_core::{
    ErrorKind, ParamType, ToolError, ToolInput, ToolName, ToolOutput, ToolSchema, fields,
};
use serde_json::{Map, Value, json};

use crate::tools::Tool;

const TEMPORAL_NAMES: [&str; 6] = ["year", "month", "day", "hour", "date", "week"];
const TREND_PHRASES: [&str; 4] = ["trend", "over time", "by month", "per month"];

pub fn schema() -> ToolSchema {
    ToolSchema::new(
        ToolName::CreateVisualization,
        "Choose a chart for a query result and produce a Plotly figure",
    )
    .required(fields::ROWS, ParamType::Array, "Result records to chart")
    .optional(
        fields::NATURAL_LANGUAGE_QUERY,
        ParamType::String,
        "The user's question, used for chart-type hints",
    )
    .output(fields::VISUALIZATION, "Plotly figure, or null when the data is not chartable")
    .output(fields::CHART_TYPE, "bar, line, scatter or pie; null for no chart")
}

/// Supported chart shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartType {
    Bar,
    Line,
    Scatter,
    Pie,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Scatter => "scatter",
            ChartType::Pie => "pie",
        }
    }
}

/// A chosen chart: its type and the x/y columns it plots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartChoice {
    pub chart_type: ChartType,
    pub x: String,
    pub y: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnShape {
    Numeric,
    Categorical,
    Empty,
}

fn column_shape(rows: &[&Map<String, Value>], column: &str) -> ColumnShape {
    let mut shape = ColumnShape::Empty;
    for row in rows {
        match row.get(column) {
            Some(Value::Number(_)) => {
                if shape == ColumnShape::Empty {
                    shape = ColumnShape::Numeric;
                }
            }
            Some(Value::Null) | None => {}
            Some(_) => return ColumnShape::Categorical,
        }
    }
    shape
}

fn is_temporal(column: &str) -> bool {
    let lower = column.to_lowercase();
    TEMPORAL_NAMES.iter().any(|name| lower.contains(name))
}

/// Decide how to chart `rows`, or `None` when the shape is unsuitable:
/// no rows, fewer than two columns, a single scalar row, or no numeric
/// measure to plot.
pub fn choose_chart(rows: &[&Map<String, Value>], query: &str) -> Option<ChartChoice> {
    let first = rows.first()?;
    let columns: Vec<&String> = first.keys().collect();
    if columns.len() < 2 {
        return None;
    }

    let shapes: Vec<(&String, ColumnShape)> = columns
        .iter()
        .map(|c| (*c, column_shape(rows, c)))
        .filter(|(_, shape)| *shape != ColumnShape::Empty)
        .collect();
    let categorical: Vec<&String> = shapes
        .iter()
        .filter(|(_, s)| *s == ColumnShape::Categorical)
        .map(|(c, _)| *c)
        .collect();
    let numeric: Vec<&String> = shapes
        .iter()
        .filter(|(_, s)| *s == ColumnShape::Numeric)
        .map(|(c, _)| *c)
        .collect();

    if rows.len() == 1 && categorical.is_empty() {
        return None;
    }

    let query = query.to_lowercase();
    let words: Vec<&str> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let wants = |word: &str| words.iter().any(|w| *w == word);
    let trend = TREND_PHRASES.iter().any(|p| query.contains(p));
    let choice = |chart_type: ChartType, x: &String, y: &String| ChartChoice {
        chart_type,
        x: x.clone(),
        y: y.clone(),
    };

    if let (Some(x), Some(y)) = (categorical.first(), numeric.first()) {
        let chart_type = if wants("pie") {
            ChartType::Pie
        } else if wants("bar") {
            ChartType::Bar
        } else if wants("line") || trend || is_temporal(x) {
            ChartType::Line
        } else {
            ChartType::Bar
        };
        return Some(choice(chart_type, *x, *y));
    }

    if numeric.len() >= 2 {
        let (x, y) = (numeric[0], numeric[1]);
        let chart_type = if wants("scatter") {
            ChartType::Scatter
        } else if wants("bar") {
            ChartType::Bar
        } else if wants("line") || trend || is_temporal(x) {
            ChartType::Line
        } else {
            ChartType::Scatter
        };
        return Some(choice(chart_type, x, y));
    }

    None
}

/// Render a Plotly figure for the chosen chart.
pub fn build_figure(rows: &[&Map<String, Value>], chart: &ChartChoice) -> Value {
    let column = |name: &str| -> Vec<Value> {
        rows.iter()
            .map(|r| r.get(name).cloned().unwrap_or(Value::Null))
            .collect()
    };
    let xs = column(&chart.x);
    let ys = column(&chart.y);
    let title = format!("{} by {}", chart.y, chart.x);

    match chart.chart_type {
        ChartType::Pie => json!({
            "data": [{ "type": "pie", "labels": xs, "values": ys, "name": chart.y }],
            "layout": { "title": { "text": title } }
        }),
        other => {
            let trace = match other {
                ChartType::Bar => json!({ "type": "bar", "x": xs, "y": ys, "name": chart.y }),
                ChartType::Line => json!({
                    "type": "scatter", "mode": "lines+markers", "x": xs, "y": ys, "name": chart.y
                }),
                _ => json!({
                    "type": "scatter", "mode": "markers", "x": xs, "y": ys, "name": chart.y
                }),
            };
            json!({
                "data": [trace],
                "layout": {
                    "title": { "text": title },
                    "xaxis": { "title": { "text": chart.x } },
                    "yaxis": { "title": { "text": chart.y } }
                }
            })
        }
    }
}

/// Deterministic chart builder. Holds no state.
pub struct CreateVisualizationTool;

#[async_trait]
impl Tool for CreateVisualizationTool {
    fn schema(&self) -> ToolSchema {
        schema()
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
        schema().validate_input(&input)?;

        let rows = input
            .get(fields::ROWS)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let records: Vec<&Map<String, Value>> = rows
            .iter()
            .map(|row| {
                row.as_object().ok_or_else(|| {
                    ToolError::validation(format!(
                        "{}: every row must be a record with named fields",
                        ToolName::CreateVisualization
                    ))
                })
            })
            .collect::<Result<_, _>>()?;

        if let Some(first) = records.first()
            && records.iter().any(|r| r.len() != first.len())
        {
            return Err(ToolError::new(
                ErrorKind::Visualization,
                "rows do not share a uniform set of fields",
            ));
        }

        let query = input
            .get(fields::NATURAL_LANGUAGE_QUERY)
            .and_then(Value::as_str)
            .unwrap_or_default();

        let mut output = ToolOutput::new();
        match choose_chart(&records, query) {
            Some(chart) => {
                tracing::debug!(
                    chart_type = chart.chart_type.as_str(),
                    x = %chart.x,
                    y = %chart.y,
                    "chart chosen"
                );
                output.insert(fields::VISUALIZATION.to_string(), build_figure(&records, &chart));
                output.insert(
                    fields::CHART_TYPE.to_string(),
                    Value::String(chart.chart_type.as_str().to_string()),
                );
            }
            None => {
                tracing::debug!(rows = records.len(), "data shape not chartable");
                output.insert(fields::VISUALIZATION.to_string(), Value::Null);
                output.insert(fields::CHART_TYPE.to_string(), Value::Null);
            }
        }
        Ok(output)
    }
}
