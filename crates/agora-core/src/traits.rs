use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::{AgoraError, Result};
use crate::types::*;

/// Reserved key under which pending tool calls are stored.
pub const TOOL_CALLS_KEY: &str = "tool_calls";

/// Reserved key for the externally visible output of the last decision.
pub const OUTPUT_KEY: &str = "output";

/// LLM client: the decision-making backend.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a generation request and receive one or more candidate turns.
    fn invoke(
        &self,
        cancel: CancellationToken,
        request: ModelRequest,
    ) -> BoxFuture<'_, Result<ModelResponse>>;
}

/// Tool: an external action the model may request.
pub trait Tool: Send + Sync + 'static {
    /// Tool name (used in LLM tool calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for tool input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    fn execute(
        &self,
        cancel: CancellationToken,
        args: ToolArgs,
    ) -> BoxFuture<'_, Result<serde_json::Value>>;

    /// Timeout in seconds for this tool. `None` defers to the registry default.
    fn timeout_secs(&self) -> Option<u64> {
        None
    }

    /// Schema sent to the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// The unit of record passed between graph nodes.
///
/// A state is a key-value store that can also present itself as a
/// conversation. Statically shaped implementations map well-known keys onto
/// fields and may override the typed accessors for the reserved keys.
pub trait State: Send + Sync + Sized + 'static {
    /// Read a named value.
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Write a named value. Fails if the value does not fit the key's type.
    fn set(&mut self, key: &str, value: serde_json::Value) -> Result<()>;

    /// The full message list for a decision call. Must not mutate the state.
    fn to_chat_history(&self) -> Result<Vec<ChatMessage>>;

    /// Record one completed turn.
    fn append_turn(&mut self, turn: ChatMessage) -> Result<()>;

    /// An independent copy sharing no mutable storage with `self`.
    fn deep_copy(&self) -> Result<Self>;

    /// Pending tool calls; empty when none are stored.
    fn tool_calls(&self) -> Result<Vec<ToolCall>> {
        match self.get(TOOL_CALLS_KEY) {
            None | Some(serde_json::Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| AgoraError::State(format!("invalid tool calls format: {}", e))),
        }
    }

    /// Replace the pending tool calls. An empty slice clears the key.
    fn set_tool_calls(&mut self, calls: &[ToolCall]) -> Result<()> {
        let value = if calls.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::to_value(calls)?
        };
        self.set(TOOL_CALLS_KEY, value)
    }

    /// Output of the last completed decision, if any.
    fn output(&self) -> Option<String> {
        self.get(OUTPUT_KEY)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    fn set_output(&mut self, output: &str) -> Result<()> {
        self.set(OUTPUT_KEY, serde_json::Value::String(output.to_string()))
    }
}
