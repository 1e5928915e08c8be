// ABOUTME: Core library for flightdeck, containing the domain types shared by every crate.
// ABOUTME: Defines tools, plans, turns, the conversation state store, and response assembly.

pub mod plan;
pub mod response;
pub mod session;
pub mod tool;
pub mod turn;

pub use plan::{Binding, Plan, PlanError, PlanStep, SkippedTool};
pub use response::{
    ChatRequest, ChatResponse, MAX_FOLLOW_UPS, PlanSummary, ToolResultEntry, assemble_response,
    failure_response,
};
pub use session::{Session, SessionError, SessionStore};
pub use tool::{
    ErrorKind, FieldSpec, ParamSpec, ParamType, ToolError, ToolInput, ToolName, ToolOutput,
    ToolSchema, UnknownToolName, fields,
};
pub use turn::{ContextEntry, ToolInvocationRecord, ToolOutcome, Turn, TurnPhase};
