// ABOUTME: Agent layer for flightdeck: LLM clients, the data tools, and the orchestrator that sequences them.
// ABOUTME: The orchestrator plans each turn, runs tools with timeouts, absorbs optional failures, and records history.

pub mod client;
pub mod llm;
pub mod orchestrator;
pub mod planner;
pub mod providers;
pub mod testing;
pub mod tools;

pub use client::create_llm_client;
pub use llm::{CompletionRequest, LlmClient, LlmError};
pub use orchestrator::{Orchestrator, OrchestratorConfig, TurnOutcome, TurnReport};
pub use planner::PlanningPolicy;
pub use tools::{RegistryError, Tool, ToolRegistry, standard_registry};
