use agora_core::error::{AgoraError, Result};
use agora_core::state::ConversationState;
use agora_core::traits::State;
use agora_core::types::ChatMessage;

/// A conversation state whose `deep_copy` always fails.
#[derive(Debug, Default)]
pub struct UncopyableState {
    pub inner: ConversationState,
}

impl State for UncopyableState {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: serde_json::Value) -> Result<()> {
        self.inner.set(key, value)
    }

    fn to_chat_history(&self) -> Result<Vec<ChatMessage>> {
        self.inner.to_chat_history()
    }

    fn append_turn(&mut self, turn: ChatMessage) -> Result<()> {
        self.inner.append_turn(turn)
    }

    fn deep_copy(&self) -> Result<Self> {
        Err(AgoraError::StateCopy("state holds a non-copyable handle".into()))
    }
}

/// Key under which [`push_trail`] records visited labels.
pub const TRAIL_KEY: &str = "trail";

/// Append `label` to the state's trail of visited nodes.
pub fn push_trail<S: State>(state: &mut S, label: &str) -> Result<()> {
    let mut trail = match state.get(TRAIL_KEY) {
        Some(serde_json::Value::Array(items)) => items,
        _ => Vec::new(),
    };
    trail.push(serde_json::Value::String(label.to_string()));
    state.set(TRAIL_KEY, serde_json::Value::Array(trail))
}

/// Labels recorded by [`push_trail`], in order.
pub fn trail<S: State>(state: &S) -> Vec<String> {
    match state.get(TRAIL_KEY) {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}
