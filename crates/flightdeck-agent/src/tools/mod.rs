// ABOUTME: The Tool capability trait and the ToolRegistry mapping tool names to instances.
// ABOUTME: Also wires the five standard tools (SQL generation/execution, charting, follow-ups, analysis).

pub mod analysis;
pub mod execute_sql;
pub mod follow_ups;
pub mod generate_sql;
pub mod visualization;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use flightdeck_core::{ToolError, ToolInput, ToolName, ToolOutput, ToolSchema};
use flightdeck_store::FlightsDb;
use thiserror::Error;

use crate::llm::LlmClient;

pub use analysis::AnalyzeDataTool;
pub use execute_sql::ExecuteSqlTool;
pub use follow_ups::SuggestFollowUpsTool;
pub use generate_sql::GenerateSqlTool;
pub use visualization::CreateVisualizationTool;

/// A stateless capability. Any context a tool needs arrives in its input, so
/// one instance serves concurrent turns.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Declared contract: name, inputs and outputs.
    fn schema(&self) -> ToolSchema;

    fn name(&self) -> ToolName {
        self.schema().name
    }

    /// Run the tool. Every failure comes back as a ToolError value.
    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError>;
}

/// Errors raised by registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    Duplicate(ToolName),

    #[error("tool not found: {0}")]
    NotFound(ToolName),
}

/// Mapping from tool name to tool instance. Populated at startup, read-only
/// afterwards.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its schema name. Fails if the name is taken.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        tracing::debug!(tool = %name, "tool registered");
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: ToolName) -> Result<Arc<dyn Tool>, RegistryError> {
        self.tools
            .get(&name)
            .cloned()
            .ok_or(RegistryError::NotFound(name))
    }

    pub fn contains(&self, name: ToolName) -> bool {
        self.tools.contains_key(&name)
    }

    /// Schemas of every registered tool, in pipeline order.
    pub fn list(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|tool| tool.schema()).collect()
    }

    pub fn names(&self) -> Vec<ToolName> {
        self.tools.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Declared schema of a standard tool.
pub fn schema_for(name: ToolName) -> ToolSchema {
    match name {
        ToolName::GenerateSql => generate_sql::schema(),
        ToolName::ExecuteSql => execute_sql::schema(),
        ToolName::CreateVisualization => visualization::schema(),
        ToolName::SuggestFollowUps => follow_ups::schema(),
        ToolName::AnalyzeData => analysis::schema(),
    }
}

/// Build a registry with the standard tools. `analyze_data` is only
/// registered when `include_analysis` is set.
pub fn standard_registry(
    llm: Arc<dyn LlmClient>,
    db: FlightsDb,
    include_analysis: bool,
) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(GenerateSqlTool::new(llm.clone())))?;
    registry.register(Arc::new(ExecuteSqlTool::new(db)))?;
    registry.register(Arc::new(CreateVisualizationTool))?;
    registry.register(Arc::new(SuggestFollowUpsTool::new(llm.clone())))?;
    if include_analysis {
        registry.register(Arc::new(AnalyzeDataTool::new(llm)))?;
    }
    Ok(registry)
}
