// ABOUTME: Test utilities for flightdeck-agent: a scripted LLM client and closure-backed tools.
// ABOUTME: Used in tests to drive the orchestrator without real API calls or databases.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use flightdeck_core::{ErrorKind, ToolError, ToolInput, ToolName, ToolOutput, ToolSchema};
use serde_json::Value;

use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::tools::{Tool, schema_for};

/// An LLM client that replies with queued responses, in order, and records
/// every request it receives. An empty queue yields an InvalidResponse error.
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client preloaded with text replies.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::new();
        for reply in replies {
            client.push_text(reply);
        }
        client
    }

    pub fn push_text(&self, reply: impl Into<String>) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(reply.into()));
    }

    pub fn push_error(&self, error: LlmError) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(error));
    }

    /// Requests received so far, oldest first.
    pub fn prompts(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("no scripted reply left".to_string())))
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}

type Handler = dyn Fn(&ToolInput) -> Result<ToolOutput, ToolError> + Send + Sync;

/// A tool whose behaviour is a closure. Validates input against its schema
/// first, like the real tools, and records every input it was called with.
pub struct FnTool {
    schema: ToolSchema,
    handler: Box<Handler>,
    delay: Option<Duration>,
    calls: Mutex<Vec<ToolInput>>,
}

impl FnTool {
    pub fn new<F>(schema: ToolSchema, handler: F) -> Self
    where
        F: Fn(&ToolInput) -> Result<ToolOutput, ToolError> + Send + Sync + 'static,
    {
        Self {
            schema,
            handler: Box::new(handler),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A tool with the standard schema for `name` that always returns
    /// `output` (which must be a JSON object).
    pub fn ok(name: ToolName, output: Value) -> Self {
        let output = output.as_object().cloned().unwrap_or_default();
        Self::new(schema_for(name), move |_| Ok(output.clone()))
    }

    /// A tool with the standard schema for `name` that always fails.
    pub fn failing(name: ToolName, kind: ErrorKind, message: &str) -> Self {
        let message = message.to_string();
        Self::new(schema_for(name), move |_| Err(ToolError::new(kind, message.clone())))
    }

    /// Sleep before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<ToolInput> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Tool for FnTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(input.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.schema.validate_input(&input)?;
        (self.handler)(&input)
    }
}
