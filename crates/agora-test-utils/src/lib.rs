//! Mocks and fixtures shared by the Agora test suites.

mod llm;
mod state;
mod tools;

pub use llm::MockLlm;
pub use state::{push_trail, trail, UncopyableState, TRAIL_KEY};
pub use tools::{EchoTool, FailingTool, SlowTool};

use agora_core::types::ToolArgs;

/// Build tool arguments from a JSON object literal. Non-objects yield empty args.
pub fn tool_args(value: serde_json::Value) -> ToolArgs {
    match value {
        serde_json::Value::Object(map) => map,
        _ => ToolArgs::new(),
    }
}
