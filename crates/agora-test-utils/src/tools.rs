use std::time::Duration;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use agora_core::error::{AgoraError, Result};
use agora_core::traits::Tool;
use agora_core::types::ToolArgs;

/// Returns its arguments unchanged as a JSON object.
pub struct EchoTool {
    name: String,
    description: String,
}

impl EchoTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: format!("Echo the arguments passed to {}", name),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

impl Tool for EchoTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }

    fn execute(
        &self,
        _cancel: CancellationToken,
        args: ToolArgs,
    ) -> BoxFuture<'_, Result<serde_json::Value>> {
        Box::pin(async move { Ok(serde_json::Value::Object(args)) })
    }
}

/// Always fails with the configured message.
pub struct FailingTool {
    name: String,
    message: String,
}

impl FailingTool {
    pub fn new(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}

impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "A tool that always fails"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }

    fn execute(
        &self,
        _cancel: CancellationToken,
        _args: ToolArgs,
    ) -> BoxFuture<'_, Result<serde_json::Value>> {
        Box::pin(async move {
            Err(AgoraError::ToolExecution {
                tool: self.name.clone(),
                message: self.message.clone(),
            })
        })
    }
}

/// Sleeps for a fixed delay, then returns `"done"`.
pub struct SlowTool {
    name: String,
    delay: Duration,
}

impl SlowTool {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            delay,
        }
    }
}

impl Tool for SlowTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "A tool that takes a while"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }

    fn execute(
        &self,
        _cancel: CancellationToken,
        _args: ToolArgs,
    ) -> BoxFuture<'_, Result<serde_json::Value>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            Ok(serde_json::json!("done"))
        })
    }
}
