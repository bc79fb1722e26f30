use std::collections::HashMap;

use crate::error::{AgoraError, Result};
use crate::traits::{State, OUTPUT_KEY, TOOL_CALLS_KEY};
use crate::types::{ChatMessage, ToolCall};

const HISTORY_KEY: &str = "history";
const INPUT_KEY: &str = "input";

/// Default state for chat-based agents.
///
/// Holds the conversation history and a single pending user input. The
/// well-known keys `history`, `input`, `output` and `tool_calls` map onto
/// typed fields; any other key lands in a free-form value map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    history: Vec<ChatMessage>,
    input: String,
    output: Option<String>,
    tool_calls: Vec<ToolCall>,
    values: HashMap<String, serde_json::Value>,
}

impl ConversationState {
    /// Create a state with an empty history and the given pending input.
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    /// Start from an existing history.
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    /// Stored turns, oldest first.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replace the pending input (e.g. for the next user message).
    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    /// Free-form values stored outside the typed fields.
    pub fn values(&self) -> &HashMap<String, serde_json::Value> {
        &self.values
    }
}

fn expect_string(key: &str, value: serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::String(s) => Ok(s),
        other => Err(AgoraError::State(format!(
            "key '{}' expects a string, got {}",
            key, other
        ))),
    }
}

impl State for ConversationState {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        match key {
            HISTORY_KEY => serde_json::to_value(&self.history).ok(),
            INPUT_KEY => Some(serde_json::Value::String(self.input.clone())),
            OUTPUT_KEY => self.output.clone().map(serde_json::Value::String),
            TOOL_CALLS_KEY if self.tool_calls.is_empty() => None,
            TOOL_CALLS_KEY => serde_json::to_value(&self.tool_calls).ok(),
            _ => self.values.get(key).cloned(),
        }
    }

    fn set(&mut self, key: &str, value: serde_json::Value) -> Result<()> {
        match key {
            HISTORY_KEY => {
                self.history = serde_json::from_value(value)
                    .map_err(|e| AgoraError::State(format!("invalid history: {}", e)))?;
            }
            INPUT_KEY => self.input = expect_string(key, value)?,
            OUTPUT_KEY if value.is_null() => self.output = None,
            OUTPUT_KEY => self.output = Some(expect_string(key, value)?),
            TOOL_CALLS_KEY if value.is_null() => self.tool_calls.clear(),
            TOOL_CALLS_KEY => {
                self.tool_calls = serde_json::from_value(value).map_err(|e| {
                    AgoraError::State(format!("invalid tool calls format: {}", e))
                })?;
            }
            _ if value.is_null() => {
                self.values.remove(key);
            }
            _ => {
                self.values.insert(key.to_string(), value);
            }
        }
        Ok(())
    }

    fn to_chat_history(&self) -> Result<Vec<ChatMessage>> {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(self.input.clone()));
        Ok(messages)
    }

    fn append_turn(&mut self, turn: ChatMessage) -> Result<()> {
        self.history.push(ChatMessage::user(self.input.clone()));
        self.history.push(turn);
        Ok(())
    }

    fn deep_copy(&self) -> Result<Self> {
        Ok(self.clone())
    }

    fn tool_calls(&self) -> Result<Vec<ToolCall>> {
        Ok(self.tool_calls.clone())
    }

    fn set_tool_calls(&mut self, calls: &[ToolCall]) -> Result<()> {
        self.tool_calls = calls.to_vec();
        Ok(())
    }

    fn output(&self) -> Option<String> {
        self.output.clone()
    }

    fn set_output(&mut self, output: &str) -> Result<()> {
        self.output = Some(output.to_string());
        Ok(())
    }
}
